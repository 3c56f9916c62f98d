//! SQLite-backed watch repository
//!
//! Each collection is a two-column key-value table whose values are the
//! JSON-encoded records. A [`WriteBatch`] is applied inside a single
//! transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreError, StoreResult, WatchRepository, WriteBatch};
use crate::models::{SubscriberId, SubscriberRecord, TargetId, TargetRecord};

/// SQLite implementation of [`WatchRepository`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteWatchRepository {
    conn: Mutex<Connection>,
}

impl SqliteWatchRepository {
    /// Open (or create) a repository at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite watch repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS targets (
                    id TEXT PRIMARY KEY,
                    record TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS subscribers (
                    id TEXT PRIMARY KEY,
                    record TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("SQLite connection lock poisoned".to_string()))
    }

    fn load_record<T: serde::de::DeserializeOwned>(
        conn: &Connection,
        sql: &str,
        key: &str,
    ) -> StoreResult<Option<T>> {
        let raw: Option<String> = conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn load_keys(conn: &Connection, sql: &str) -> StoreResult<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl WatchRepository for SqliteWatchRepository {
    fn get_target(&self, id: &TargetId) -> StoreResult<Option<TargetRecord>> {
        let conn = self.lock()?;
        Self::load_record(&conn, "SELECT record FROM targets WHERE id = ?1", id.as_str())
    }

    fn get_subscriber(&self, id: &SubscriberId) -> StoreResult<Option<SubscriberRecord>> {
        let conn = self.lock()?;
        Self::load_record(
            &conn,
            "SELECT record FROM subscribers WHERE id = ?1",
            id.as_str(),
        )
    }

    fn target_ids(&self) -> StoreResult<Vec<TargetId>> {
        let conn = self.lock()?;
        let keys = Self::load_keys(&conn, "SELECT id FROM targets ORDER BY id")?;

        // Keys were written from normalized identifiers and are taken as-is
        Ok(keys.into_iter().map(TargetId::from_stored).collect())
    }

    fn subscriber_ids(&self) -> StoreResult<Vec<SubscriberId>> {
        let conn = self.lock()?;
        let keys = Self::load_keys(&conn, "SELECT id FROM subscribers ORDER BY id")?;

        Ok(keys.into_iter().map(SubscriberId::from_stored).collect())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for record in batch.target_puts() {
            tx.execute(
                r#"
                    INSERT INTO targets (id, record, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
                    "#,
                params![record.id.as_str(), serde_json::to_string(record)?, now],
            )?;
        }

        for id in batch.target_deletes() {
            tx.execute("DELETE FROM targets WHERE id = ?1", params![id.as_str()])?;
        }

        for record in batch.subscriber_puts() {
            tx.execute(
                r#"
                    INSERT INTO subscribers (id, record, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
                    "#,
                params![record.id.as_str(), serde_json::to_string(record)?, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_records() {
        let repo = SqliteWatchRepository::in_memory().unwrap();
        let target = TargetId::parse("example.com/hook").unwrap();
        let subscriber = SubscriberId::new("-100200").unwrap();

        let mut target_record = TargetRecord::new(target.clone());
        target_record.subscribers.insert(subscriber.clone());
        let mut subscriber_record = SubscriberRecord::new(subscriber.clone());
        subscriber_record
            .watches
            .insert(target.clone(), "Hook".to_string());

        let mut batch = WriteBatch::new();
        batch
            .put_target(target_record.clone())
            .put_subscriber(subscriber_record.clone());
        repo.commit(batch).unwrap();

        assert_eq!(repo.get_target(&target).unwrap(), Some(target_record));
        assert_eq!(
            repo.get_subscriber(&subscriber).unwrap(),
            Some(subscriber_record)
        );
        assert_eq!(repo.target_ids().unwrap(), vec![target]);
        assert_eq!(repo.subscriber_ids().unwrap(), vec![subscriber]);
    }

    #[test]
    fn test_upsert_replaces_record() {
        let repo = SqliteWatchRepository::in_memory().unwrap();
        let target = TargetId::parse("example.com").unwrap();

        let mut record = TargetRecord::new(target.clone());
        let mut batch = WriteBatch::new();
        batch.put_target(record.clone());
        repo.commit(batch).unwrap();

        record.is_online = false;
        let mut batch = WriteBatch::new();
        batch.put_target(record);
        repo.commit(batch).unwrap();

        assert!(!repo.get_target(&target).unwrap().unwrap().is_online);
        assert_eq!(repo.target_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_target_keys_are_returned_verbatim() {
        let repo = SqliteWatchRepository::in_memory().unwrap();
        let target =
            TargetId::parse("https://hooks.example.com/cb?next=https://x.example.com").unwrap();

        let mut batch = WriteBatch::new();
        batch.put_target(TargetRecord::new(target.clone()));
        repo.commit(batch).unwrap();

        assert_eq!(repo.target_ids().unwrap(), vec![target]);
    }

    #[test]
    fn test_delete_missing_target_is_noop() {
        let repo = SqliteWatchRepository::in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch.delete_target(TargetId::parse("nowhere.example").unwrap());

        assert!(repo.commit(batch).is_ok());
        assert!(repo.target_ids().unwrap().is_empty());
    }
}
