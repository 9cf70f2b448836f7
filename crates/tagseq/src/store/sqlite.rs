use std::path::Path;

use rusqlite::{Connection, OptionalExtension, ffi, params};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Asset, CategoryId, SequenceConfig, SequenceKey, StoreError, TenantId,
    mutex::{Mutex, MutexGuard},
    store::{AssetRegistry, SequenceStore},
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS category_tag_formats (
    tenant_id      INTEGER NOT NULL,
    category_id    TEXT    NOT NULL,
    prefix         TEXT    NOT NULL,
    current_number INTEGER NOT NULL CHECK (current_number >= 0),
    zero_padding   INTEGER NOT NULL CHECK (zero_padding >= 1),
    PRIMARY KEY (tenant_id, category_id)
);

CREATE TABLE IF NOT EXISTS assets (
    tenant_id   INTEGER NOT NULL,
    category_id TEXT    NOT NULL,
    asset_tag   TEXT    NOT NULL,
    name        TEXT    NOT NULL,
    UNIQUE (tenant_id, asset_tag)
);
";

/// A durable sequence store and asset registry backed by SQLite.
///
/// Uniqueness of tag formats and asset tags is enforced by table constraints.
/// Counter reservation is a single `UPDATE ... RETURNING` statement, so
/// concurrent committers never lose an increment.
///
/// ## Features
/// - ✅ Thread-safe (one connection behind a mutex)
/// - ✅ Atomic increments
/// - ✅ Durable (unless opened in memory)
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] if the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] if SQLite fails to initialize.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.conn.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.conn.lock()?)
        }
    }
}

fn to_sql_number(key: &SequenceKey, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Overflow(key.clone()))
}

/// `PRIMARY KEY` or `UNIQUE` clash. Other constraint failures (`CHECK`,
/// `NOT NULL`) are real errors, not duplicates.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn row_to_config(tenant_id: TenantId, row: &rusqlite::Row<'_>) -> rusqlite::Result<SequenceConfig> {
    let category_id: String = row.get(0)?;
    let current_number: i64 = row.get(2)?;
    let zero_padding: i64 = row.get(3)?;
    Ok(SequenceConfig {
        tenant_id,
        category_id: CategoryId::new(category_id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        prefix: row.get(1)?,
        current_number: u64::try_from(current_number).unwrap_or_default(),
        zero_padding: u32::try_from(zero_padding).unwrap_or(1),
    })
}

impl SequenceStore for SqliteStore {
    fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT category_id, prefix, current_number, zero_padding
             FROM category_tag_formats
             WHERE tenant_id = ?1 AND category_id = ?2",
            params![key.tenant_id.0, key.category_id.as_str()],
            |row| row_to_config(key.tenant_id, row),
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn create(&self, config: SequenceConfig) -> Result<(), StoreError> {
        super::validate(&config)?;
        let key = config.key();
        let current_number = to_sql_number(&key, config.current_number)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO category_tag_formats
                 (tenant_id, category_id, prefix, current_number, zero_padding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                config.tenant_id.0,
                config.category_id.as_str(),
                config.prefix,
                current_number,
                config.zero_padding,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn set_current_number(&self, key: &SequenceKey, value: u64) -> Result<(), StoreError> {
        let value = to_sql_number(key, value)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE category_tag_formats SET current_number = ?3
             WHERE tenant_id = ?1 AND category_id = ?2",
            params![key.tenant_id.0, key.category_id.as_str(), value],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.clone()));
        }
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn fetch_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let previous: Option<i64> = conn
            .query_row(
                "UPDATE category_tag_formats
                 SET current_number = current_number + 1
                 WHERE tenant_id = ?1 AND category_id = ?2
                   AND current_number < 9223372036854775807
                 RETURNING current_number - 1",
                params![key.tenant_id.0, key.category_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match previous {
            Some(previous) => Ok(u64::try_from(previous).unwrap_or_default()),
            None => {
                // Either the key is missing or the counter is at i64::MAX.
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM category_tag_formats
                                   WHERE tenant_id = ?1 AND category_id = ?2)",
                    params![key.tenant_id.0, key.category_id.as_str()],
                    |row| row.get(0),
                )?;
                if exists {
                    Err(StoreError::Overflow(key.clone()))
                } else {
                    Err(StoreError::NotFound(key.clone()))
                }
            }
        }
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT category_id, prefix, current_number, zero_padding
             FROM category_tag_formats
             WHERE tenant_id = ?1
             ORDER BY category_id",
        )?;
        let configs = stmt
            .query_map(params![tenant_id.0], |row| row_to_config(tenant_id, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(configs)
    }
}

impl AssetRegistry for SqliteStore {
    fn tag_in_use(&self, tenant_id: TenantId, tag: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let in_use = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM assets WHERE tenant_id = ?1 AND asset_tag = ?2)",
            params![tenant_id.0, tag],
            |row| row.get(0),
        )?;
        Ok(in_use)
    }

    fn insert(&self, asset: Asset) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO assets (tenant_id, category_id, asset_tag, name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                asset.tenant_id.0,
                asset.category_id.as_str(),
                asset.asset_tag,
                asset.name,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateTag {
                tag: asset.asset_tag,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
