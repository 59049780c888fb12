//! SQLite-backed capability store.
//!
//! Opens the proxy's own database file. Tables are expected to exist
//! already; the test-only `SCHEMA` mirrors the columns we touch.

use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{Ability, CapabilityStore, Channel, DEFAULT_GROUP};
use crate::error::{Error, Result};

/// Minimal DDL for the columns this daemon reads and writes.
#[cfg(test)]
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type INTEGER NOT NULL DEFAULT 0,
    "key" TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 1,
    name TEXT NOT NULL DEFAULT '',
    base_url TEXT DEFAULT '',
    models TEXT DEFAULT '',
    deleted_at DATETIME
);

CREATE TABLE IF NOT EXISTS abilities (
    "group" TEXT NOT NULL,
    model TEXT NOT NULL,
    channel_id INTEGER NOT NULL,
    enabled BOOLEAN NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 0,
    weight INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY ("group", model, channel_id)
);

CREATE INDEX IF NOT EXISTS idx_abilities_channel ON abilities(channel_id);
"#;

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the proxy database at `dsn`. A leading `file:` is accepted.
    /// The file must already exist; it is never created here.
    pub fn open(dsn: &str) -> Result<Self> {
        let path = dsn.strip_prefix("file:").unwrap_or(dsn);
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let db = Connection::open_with_flags(Path::new(path), flags)
            .map_err(|e| Error::StoreRead(format!("cannot open {}: {}", path, e)))?;
        db.busy_timeout(std::time::Duration::from_secs(5)).map_err(Error::read)?;
        tracing::debug!(path = path, "SQLite store opened");
        Ok(Self { db: Mutex::new(db) })
    }

    /// A private in-memory database with [`SCHEMA`] applied.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().map_err(Error::read)?;
        db.execute_batch(SCHEMA).map_err(Error::write)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Direct connection access for test fixtures.
    #[cfg(test)]
    pub fn db(&self) -> &Mutex<Connection> {
        &self.db
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| Error::StoreRead("connection mutex poisoned".into()))
    }
}

fn weight_to_sql(weight: u64) -> Result<i64> {
    i64::try_from(weight).map_err(|_| Error::StoreWrite(format!("weight {} out of range", weight)))
}

fn insert_row(db: &Connection, ability: &Ability) -> Result<()> {
    db.execute(
        r#"INSERT INTO abilities ("group", model, channel_id, enabled, priority, weight)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![
            ability.group,
            ability.model,
            ability.channel_id,
            ability.enabled,
            ability.priority,
            weight_to_sql(ability.weight)?,
        ],
    )
    .map_err(Error::write)?;
    Ok(())
}

impl CapabilityStore for SqliteStore {
    fn list_channels(&self, types: &[i64]) -> Result<Vec<Channel>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; types.len()].join(", ");
        let sql = format!(
            r#"SELECT id, type, name, base_url, "key", status, models
               FROM channels
               WHERE deleted_at IS NULL AND type IN ({})
               ORDER BY id"#,
            placeholders
        );

        let db = self.conn()?;
        let mut stmt = db.prepare(&sql).map_err(Error::read)?;
        let channels = stmt
            .query_map(params_from_iter(types.iter()), |row| {
                Ok(Channel {
                    id: row.get(0)?,
                    channel_type: row.get(1)?,
                    name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    base_url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    key: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    status: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
                    models: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                })
            })
            .map_err(Error::read)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::read)?;

        Ok(channels)
    }

    fn find_one_ability(&self, channel_id: i64) -> Result<Option<Ability>> {
        let db = self.conn()?;
        db.query_row(
            r#"SELECT "group", model, channel_id, enabled, priority, weight
               FROM abilities WHERE channel_id = ?1 LIMIT 1"#,
            params![channel_id],
            // Only priority/weight feed the caller; the rest may be NULL in
            // rows the proxy wrote.
            |row| {
                Ok(Ability {
                    group: row.get::<_, Option<String>>(0)?.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
                    model: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    channel_id: row.get(2)?,
                    enabled: row.get::<_, Option<bool>>(3)?.unwrap_or(true),
                    priority: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                    weight: row.get::<_, Option<i64>>(5)?.unwrap_or_default().max(0) as u64,
                })
            },
        )
        .optional()
        .map_err(Error::read)
    }

    fn delete_abilities(&self, channel_id: i64) -> Result<usize> {
        let db = self.conn()?;
        db.execute("DELETE FROM abilities WHERE channel_id = ?1", params![channel_id])
            .map_err(Error::write)
    }

    fn insert_ability(&self, ability: &Ability) -> Result<()> {
        let db = self.conn()?;
        insert_row(&db, ability)
    }

    fn update_channel_models(&self, channel_id: i64, models: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute(
            "UPDATE channels SET models = ?1 WHERE id = ?2",
            params![models, channel_id],
        )
        .map_err(Error::write)?;
        Ok(())
    }

    fn replace_abilities(&self, channel_id: i64, abilities: &[Ability]) -> Result<usize> {
        let mut db = self.conn()?;
        let tx = db.transaction().map_err(Error::write)?;
        let removed = tx
            .execute("DELETE FROM abilities WHERE channel_id = ?1", params![channel_id])
            .map_err(Error::write)?;
        for ability in abilities {
            insert_row(&tx, ability)?;
        }
        tx.commit().map_err(Error::write)?;
        Ok(removed)
    }
}
