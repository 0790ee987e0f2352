use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use super::{schema, StoreError};
use crate::config::StorageOptions;

pub trait KeyValueSlot {
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, payload: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct SqliteSlot {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteSlot {
    /// Prepares the data directory. The database itself is opened lazily so a
    /// corrupt file surfaces as a read/write error rather than a startup failure.
    pub fn open(options: &StorageOptions) -> Result<Self, StoreError> {
        let db_path = options.database_path.clone();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            db_path: Arc::new(db_path),
            options: Arc::new(options.clone()),
        })
    }

    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        schema::apply(&conn)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn key(&self) -> &str {
        &self.options.key
    }
}

impl KeyValueSlot for SqliteSlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        self.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_slots WHERE key = ?1",
                    params![self.key()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn write(&self, payload: &str) -> Result<(), StoreError> {
        check_quota(payload, self.options.quota())?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![self.key(), payload, now],
            )?;
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct MemorySlot {
    value: RefCell<Option<String>>,
    capacity: Option<usize>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: RefCell::new(Some(value.into())),
            ..Self::default()
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        Self {
            capacity: Some(limit),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn value(&self) -> Option<String> {
        self.value.borrow().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl KeyValueSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.value.borrow().clone())
    }

    fn write(&self, payload: &str) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Unavailable("memory slot rejects writes".into()));
        }
        check_quota(payload, self.capacity)?;
        *self.value.borrow_mut() = Some(payload.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

fn check_quota(payload: &str, limit: Option<usize>) -> Result<(), StoreError> {
    match limit {
        Some(limit) if payload.len() > limit => Err(StoreError::QuotaExceeded {
            size: payload.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn options(root: &TempDir) -> StorageOptions {
        StorageOptions {
            database_path: root.path().join("data").join("notes.db"),
            ..StorageOptions::default()
        }
    }

    #[test]
    fn sqlite_slot_starts_empty_and_overwrites() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let slot = SqliteSlot::open(&options(&temp))?;
        assert_eq!(slot.read()?, None);

        slot.write("first")?;
        slot.write("second")?;
        assert_eq!(slot.read()?.as_deref(), Some("second"));

        let rows: i64 = slot.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM kv_slots", [], |row| row.get(0))?)
        })?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[test]
    fn sqlite_slot_persists_across_handles() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let opts = options(&temp);
        SqliteSlot::open(&opts)?.write("{\"notes\":[]}")?;
        let reopened = SqliteSlot::open(&opts)?;
        assert_eq!(reopened.read()?.as_deref(), Some("{\"notes\":[]}"));
        Ok(())
    }

    #[test]
    fn sqlite_slot_keys_are_isolated() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let first = SqliteSlot::open(&options(&temp))?;
        let other = SqliteSlot::open(&StorageOptions {
            key: "other_slot".into(),
            ..options(&temp)
        })?;
        first.write("mine")?;
        assert_eq!(other.read()?, None);
        Ok(())
    }

    #[test]
    fn sqlite_slot_enforces_quota() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let slot = SqliteSlot::open(&StorageOptions {
            max_payload_bytes: 4,
            ..options(&temp)
        })?;
        assert_matches!(
            slot.write("too large"),
            Err(StoreError::QuotaExceeded { size: 9, limit: 4 })
        );
        assert_eq!(slot.read()?, None);
        Ok(())
    }

    #[test]
    fn corrupt_database_reports_errors() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let opts = options(&temp);
        let slot = SqliteSlot::open(&opts)?;
        fs::write(slot.database_path(), vec![b'x'; 8192])?;
        assert_matches!(slot.read(), Err(StoreError::Sqlite(_)));
        assert_matches!(slot.write("x"), Err(StoreError::Sqlite(_)));
        Ok(())
    }

    #[test]
    fn memory_slot_can_fail_and_limit_writes() {
        let slot = MemorySlot::with_capacity(3);
        assert_matches!(slot.write("abcd"), Err(StoreError::QuotaExceeded { .. }));
        slot.write("abc").expect("fits");
        slot.set_fail_writes(true);
        assert_matches!(slot.write("a"), Err(StoreError::Unavailable(_)));
        assert_eq!(slot.value().as_deref(), Some("abc"));
        assert_eq!(slot.write_count(), 1);
    }
}
