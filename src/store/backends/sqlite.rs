//! Relational backend on SQLite.
//!
//! One row per guild. SQLite has no array type, so the role id sets are
//! stored as JSON arrays of integers. Ids are stored as the bit-identical
//! signed 64-bit value.

use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::settle_created;
use crate::store::{BackendKind, ConfigBackend, GuildSettings, StoreError, StoreResult};

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "guild_configs.db";

const SELECT_COLUMNS: &str =
    "SELECT tenantId, announcerRoleIds, announcementRoleIds, subscriptionsEnabled FROM guildConfigs";

/// A row as read, before the array columns are decoded.
struct RawRow {
    tenant_id: i64,
    announcer_role_ids: String,
    announcement_role_ids: String,
    subscriptions_enabled: bool,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            announcer_role_ids: row.get(1)?,
            announcement_role_ids: row.get(2)?,
            subscriptions_enabled: row.get(3)?,
        })
    }

    fn decode(self) -> StoreResult<GuildSettings> {
        let tenant_id = self.tenant_id as u64;
        let announcer: Vec<i64> = serde_json::from_str(&self.announcer_role_ids)
            .map_err(|e| StoreError::malformed(tenant_id, format!("announcerRoleIds: {e}")))?;
        let announcement: Vec<i64> = serde_json::from_str(&self.announcement_role_ids)
            .map_err(|e| StoreError::malformed(tenant_id, format!("announcementRoleIds: {e}")))?;

        Ok(GuildSettings::from_parts(
            tenant_id,
            announcer.into_iter().map(|id| id as u64),
            announcement.into_iter().map(|id| id as u64),
            self.subscriptions_enabled,
        ))
    }
}

fn encode_ids<'a>(ids: impl IntoIterator<Item = &'a u64>) -> StoreResult<String> {
    let ids: Vec<i64> = ids.into_iter().map(|id| *id as i64).collect();
    Ok(serde_json::to_string(&ids)?)
}

/// Guild settings stored one row per guild in table `guildConfigs`.
pub struct SqliteBackend {
    location: String,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open the database at `path` (`:memory:` is accepted) and create the
    /// table if it does not exist yet.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_secs(10))?;
        Self::initialize_schema(&conn)?;

        info!("SQLite guild config store ready at {}", path);
        Ok(Self {
            location: path.to_string(),
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS guildConfigs (
                tenantId INTEGER NOT NULL PRIMARY KEY,
                announcerRoleIds TEXT NOT NULL DEFAULT '[]',
                announcementRoleIds TEXT NOT NULL DEFAULT '[]',
                subscriptionsEnabled INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(())
    }

    fn fetch_locked(conn: &Connection, tenant_id: u64) -> StoreResult<Option<GuildSettings>> {
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE tenantId = ?1"),
                params![tenant_id as i64],
                RawRow::from_row,
            )
            .optional()
            .map_err(|e| match e {
                rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
                    StoreError::malformed(tenant_id, e)
                }
                e => StoreError::from(e),
            })?;
        raw.map(RawRow::decode).transpose()
    }

    fn store_locked(conn: &Connection, settings: &GuildSettings) -> StoreResult<()> {
        let announcer = encode_ids(settings.announcer_role_ids())?;
        let announcement = encode_ids(settings.announcement_role_ids())?;

        conn.execute(
            "INSERT INTO guildConfigs (tenantId, announcerRoleIds, announcementRoleIds, subscriptionsEnabled)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tenantId) DO UPDATE SET
                announcerRoleIds = excluded.announcerRoleIds,
                announcementRoleIds = excluded.announcementRoleIds,
                subscriptionsEnabled = excluded.subscriptionsEnabled",
            params![
                settings.tenant_id() as i64,
                announcer,
                announcement,
                settings.subscriptions_enabled()
            ],
        )?;
        Ok(())
    }
}

impl ConfigBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }

    fn fetch(&self, tenant_id: u64) -> StoreResult<Option<GuildSettings>> {
        let conn = self.conn.lock();
        Self::fetch_locked(&conn, tenant_id)
    }

    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO guildConfigs (tenantId) VALUES (?1)",
            params![tenant_id as i64],
        )?;
        debug!("Insert default row for guild {}: {} row(s)", tenant_id, inserted);

        let fetched = Self::fetch_locked(&conn, tenant_id);
        settle_created(tenant_id, &self.location, fetched, |defaults| {
            Self::store_locked(&conn, defaults)
        })
    }

    fn fetch_all(&self) -> StoreResult<Vec<GuildSettings>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let rows = stmt.query_map([], RawRow::from_row)?;

        let mut all = Vec::new();
        for row in rows {
            match row.map_err(StoreError::from).and_then(RawRow::decode) {
                Ok(settings) => all.push(settings),
                Err(e) => warn!("Skipping row in {}: {}", self.location, e),
            }
        }
        Ok(all)
    }

    fn store(&self, settings: &GuildSettings) -> StoreResult<()> {
        let conn = self.conn.lock();
        Self::store_locked(&conn, settings)
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .finish()
    }
}
