//! SQLite storage of subscribed chats.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A schema migration.
#[derive(Debug)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_users",
    sql: "CREATE TABLE IF NOT EXISTS users (
              chat_id INTEGER PRIMARY KEY
          );",
}];

/// Subscriber database errors.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("Subscriber database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Chats that receive the daily broadcast.
#[derive(Debug)]
pub struct SubscriberStore {
    conn: Mutex<Connection>,
}

impl SubscriberStore {
    /// Opens (or creates) the database at `path` and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SubscriberError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        info!("Subscriber database ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, SubscriberError> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Subscribes a chat. Returns `true` if it was not subscribed before.
    pub async fn add(&self, chat_id: i64) -> Result<bool, SubscriberError> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (chat_id) VALUES (?1)",
            params![chat_id],
        )?;
        debug!("Subscribe chat {}: inserted={}", chat_id, inserted);
        Ok(inserted > 0)
    }

    /// Unsubscribes a chat. Returns `true` if it was subscribed.
    pub async fn remove(&self, chat_id: i64) -> Result<bool, SubscriberError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM users WHERE chat_id = ?1", params![chat_id])?;
        debug!("Unsubscribe chat {}: deleted={}", chat_id, deleted);
        Ok(deleted > 0)
    }

    /// All subscribed chat ids in ascending order.
    pub async fn all(&self) -> Result<Vec<i64>, SubscriberError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT chat_id FROM users ORDER BY chat_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Number of subscribed chats.
    pub async fn count(&self) -> Result<usize, SubscriberError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Runs raw SQL against the database.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<(), SubscriberError> {
        self.conn.lock().await.execute_batch(sql)?;
        Ok(())
    }
}

fn apply_migrations(conn: &Connection) -> Result<(), SubscriberError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let applied: Vec<u32> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for migration in MIGRATIONS {
        if !applied.contains(&migration.version) {
            info!("Applying migration {} ({})", migration.version, migration.name);
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                params![migration.version, migration.name],
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let store = SubscriberStore::open_in_memory().unwrap();
        assert!(store.add(42).await.unwrap());
        assert!(!store.add(42).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_all_is_sorted() {
        let store = SubscriberStore::open_in_memory().unwrap();
        for id in [300, -100_123, 5] {
            store.add(id).await.unwrap();
        }
        assert_eq!(store.all().await.unwrap(), vec![-100_123, 5, 300]);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SubscriberStore::open_in_memory().unwrap();
        store.add(7).await.unwrap();
        store.add(8).await.unwrap();
        assert!(store.remove(7).await.unwrap());
        assert!(!store.remove(7).await.unwrap());
        assert_eq!(store.all().await.unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");

        {
            let store = SubscriberStore::open(&path).unwrap();
            store.add(1).await.unwrap();
            store.add(2).await.unwrap();
        }

        let store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.all().await.unwrap(), vec![1, 2]);
    }
}
