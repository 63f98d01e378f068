//! MongoDB backend.
//!
//! One document per guild in the `guild_configs` collection, accessed via
//! the driver's blocking API. Ids are stored as the bit-identical signed
//! 64-bit value since BSON has no unsigned integer.

use mongodb::bson::{self, doc, Document};
use mongodb::options::{IndexOptions, ReplaceOptions, UpdateOptions};
use mongodb::sync::{Client, Collection};
use mongodb::IndexModel;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::settle_created;
use crate::store::{BackendKind, ConfigBackend, GuildSettings, StoreError, StoreResult};

/// Default connection string and database name.
pub const DEFAULT_MONGO_ARGS: &str = "mongodb://localhost:27017 herald";

const COLLECTION: &str = "guild_configs";

/// Stored document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MongoRecord {
    tenant_id: i64,
    #[serde(default)]
    announcer_role_ids: Vec<i64>,
    #[serde(default)]
    announcement_role_ids: Vec<i64>,
    #[serde(default)]
    subscriptions_enabled: bool,
}

impl MongoRecord {
    fn from_settings(settings: &GuildSettings) -> Self {
        Self {
            tenant_id: settings.tenant_id() as i64,
            announcer_role_ids: settings.announcer_role_ids().iter().map(|id| *id as i64).collect(),
            announcement_role_ids: settings
                .announcement_role_ids()
                .iter()
                .map(|id| *id as i64)
                .collect(),
            subscriptions_enabled: settings.subscriptions_enabled(),
        }
    }

    fn into_settings(self) -> GuildSettings {
        GuildSettings::from_parts(
            self.tenant_id as u64,
            self.announcer_role_ids.into_iter().map(|id| id as u64),
            self.announcement_role_ids.into_iter().map(|id| id as u64),
            self.subscriptions_enabled,
        )
    }
}

/// Parse `"<uri> [database]"`.
fn parse_args(args: &str) -> StoreResult<(&str, &str)> {
    let mut parts = args.split_whitespace();
    let uri = parts.next().ok_or_else(|| StoreError::Construction {
        kind: BackendKind::Mongo,
        reason: "missing connection string".to_string(),
    })?;
    let database = parts.next().unwrap_or("herald");
    if parts.next().is_some() {
        return Err(StoreError::Construction {
            kind: BackendKind::Mongo,
            reason: format!("expected '<uri> [database]', got '{args}'"),
        });
    }
    Ok((uri, database))
}

/// Decode a raw document. Shape errors are reported per record.
fn decode_document(tenant_id: u64, document: Document) -> StoreResult<GuildSettings> {
    bson::from_document::<MongoRecord>(document)
        .map(MongoRecord::into_settings)
        .map_err(|e| StoreError::malformed(tenant_id, e))
}

fn filter_for(tenant_id: u64) -> Document {
    doc! { "tenant_id": tenant_id as i64 }
}

/// Guild settings stored one document per guild.
pub struct MongoBackend {
    location: String,
    collection: Collection<MongoRecord>,
    raw: Collection<Document>,
}

impl MongoBackend {
    /// Connect using `"<uri> [database]"`, verify the server answers, and
    /// make sure guild ids are unique.
    pub fn connect(args: &str) -> StoreResult<Self> {
        let (uri, database) = parse_args(args)?;
        let client = Client::with_uri_str(uri)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .run()?;

        let collection: Collection<MongoRecord> = client.database(database).collection(COLLECTION);
        let index = IndexModel::builder()
            .keys(doc! { "tenant_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index).run()?;

        info!("Connected to MongoDB guild config store {}/{}", database, COLLECTION);
        Ok(Self {
            location: format!("{database}/{COLLECTION}"),
            raw: collection.clone_with_type(),
            collection,
        })
    }
}

impl ConfigBackend for MongoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    fn describe(&self) -> String {
        format!("mongo:{}", self.location)
    }

    fn fetch(&self, tenant_id: u64) -> StoreResult<Option<GuildSettings>> {
        self.raw
            .find_one(filter_for(tenant_id))
            .run()?
            .map(|document| decode_document(tenant_id, document))
            .transpose()
    }

    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        let defaults = MongoRecord::from_settings(&GuildSettings::new(tenant_id));
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection
            .update_one(
                filter_for(tenant_id),
                doc! {
                    "$setOnInsert": {
                        "announcer_role_ids": defaults.announcer_role_ids,
                        "announcement_role_ids": defaults.announcement_role_ids,
                        "subscriptions_enabled": defaults.subscriptions_enabled,
                    }
                },
            )
            .with_options(options)
            .run()?;

        settle_created(tenant_id, &self.location, self.fetch(tenant_id), |defaults| {
            self.store(defaults)
        })
    }

    fn fetch_all(&self) -> StoreResult<Vec<GuildSettings>> {
        let mut all = Vec::new();
        for document in self.raw.find(doc! {}).run()? {
            match bson::from_document::<MongoRecord>(document?) {
                Ok(record) => all.push(record.into_settings()),
                Err(e) => warn!("Skipping document in {}: {}", self.location, e),
            }
        }
        Ok(all)
    }

    fn store(&self, settings: &GuildSettings) -> StoreResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(
                filter_for(settings.tenant_id()),
                MongoRecord::from_settings(settings),
            )
            .with_options(options)
            .run()?;
        Ok(())
    }
}

impl std::fmt::Debug for MongoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoBackend")
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args("mongodb://db:27017 bots").unwrap(),
            ("mongodb://db:27017", "bots")
        );
        assert_eq!(parse_args("mongodb://db").unwrap(), ("mongodb://db", "herald"));
        assert!(parse_args("").is_err());
        assert!(parse_args("a b c").is_err());
    }

    #[test]
    fn test_record_keeps_full_id_range() {
        let settings = GuildSettings::from_parts(u64::MAX, [1, u64::MAX - 3], [7], true);
        let record = MongoRecord::from_settings(&settings);

        assert_eq!(record.tenant_id, -1);
        assert_eq!(record.into_settings(), settings);
    }

    #[test]
    fn test_unreadable_document_is_replaced_on_create() {
        let document = doc! { "tenant_id": 2_i64, "announcer_role_ids": "not an array" };
        let fetched = decode_document(2, document).map(Some);
        assert!(matches!(fetched, Err(StoreError::Malformed { .. })));

        let mut written = Vec::new();
        let settled = settle_created(2, "test/guild_configs", fetched, |defaults| {
            written.push(MongoRecord::from_settings(defaults));
            Ok(())
        });

        assert_eq!(settled.unwrap(), GuildSettings::new(2));
        assert_eq!(written, vec![MongoRecord::from_settings(&GuildSettings::new(2))]);
    }

    #[test]
    fn test_document_missing_sets_defaults_to_empty() {
        let record: MongoRecord = bson::from_document(doc! { "tenant_id": 9_i64 }).unwrap();

        assert_eq!(record.into_settings(), GuildSettings::new(9));
    }
}
