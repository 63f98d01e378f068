//! In-memory backend with call counters and failure switches.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::store::{BackendKind, ConfigBackend, GuildSettings, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<u64, GuildSettings>>,
    fetches: AtomicUsize,
    creates: AtomicUsize,
    stores: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_creates: AtomicBool,
    fail_stores: AtomicBool,
}

fn injected() -> StoreError {
    StoreError::io("memory", io::Error::other("injected failure"))
}

impl MemoryBackend {
    pub fn with_records(records: impl IntoIterator<Item = GuildSettings>) -> Self {
        let backend = Self::default();
        backend
            .records
            .lock()
            .extend(records.into_iter().map(|s| (s.tenant_id(), s)));
        backend
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }
}

impl ConfigBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn fetch(&self, tenant_id: u64) -> StoreResult<Option<GuildSettings>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.records.lock().get(&tenant_id).cloned())
    }

    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut records = self.records.lock();
        let settings = records.entry(tenant_id).or_insert_with(|| {
            self.creates.fetch_add(1, Ordering::SeqCst);
            GuildSettings::new(tenant_id)
        });
        Ok(settings.clone())
    }

    fn fetch_all(&self) -> StoreResult<Vec<GuildSettings>> {
        Ok(self.records.lock().values().cloned().collect())
    }

    fn store(&self, settings: &GuildSettings) -> StoreResult<()> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .insert(settings.tenant_id(), settings.clone());
        Ok(())
    }
}
