use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use tokio_rusqlite::Connection;

use crate::error::AppError;

/// Ordered, idempotent schema migrations. `PRAGMA user_version` records how
/// many entries have been applied; each entry runs at most once.
const MIGRATIONS: &[&str] = &[
    // v1: base tables
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'student',
        created_at TEXT NOT NULL
    );
    CREATE TABLE canteens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT,
        description TEXT
    );
    CREATE TABLE dishes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        canteen_id INTEGER NOT NULL REFERENCES canteens(id),
        name TEXT NOT NULL,
        category TEXT,
        price REAL,
        is_available INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE TABLE ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        dish_id INTEGER NOT NULL REFERENCES dishes(id),
        score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
        comment TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, dish_id)
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        total_price REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL
    );
    CREATE TABLE order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        dish_id INTEGER NOT NULL REFERENCES dishes(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        price REAL NOT NULL
    );",
    // v2: account contact fields, dish nutrition fields, per-item options
    "ALTER TABLE users ADD COLUMN email TEXT;
    ALTER TABLE users ADD COLUMN last_login TEXT;
    CREATE UNIQUE INDEX idx_users_email ON users(email) WHERE email IS NOT NULL;
    ALTER TABLE dishes ADD COLUMN ingredients TEXT;
    ALTER TABLE dishes ADD COLUMN ingredients_zh TEXT;
    ALTER TABLE dishes ADD COLUMN calories INTEGER;
    ALTER TABLE order_items ADD COLUMN options TEXT;",
    // v3: configurable dish options
    "CREATE TABLE dish_option_configs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE CASCADE,
        option_type TEXT NOT NULL,
        option_name_zh TEXT NOT NULL,
        option_name_en TEXT NOT NULL,
        option_values TEXT NOT NULL,
        is_required INTEGER NOT NULL DEFAULT 0
    );",
];

#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Connection>,
}

impl Database {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let conn = Connection::open(path).await?;
        let db = Self {
            conn: Arc::new(conn),
        };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().await?;
        let db = Self {
            conn: Arc::new(conn),
        };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), AppError> {
        let applied = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let mut version: i64 =
                    tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
                let start = version;
                for (idx, sql) in MIGRATIONS.iter().enumerate() {
                    let target = (idx + 1) as i64;
                    if version < target {
                        tx.execute_batch(sql)?;
                        tx.pragma_update(None, "user_version", target)?;
                        version = target;
                    }
                }
                tx.commit()?;
                Ok(version - start)
            })
            .await?;

        if applied > 0 {
            info!("applied {} schema migration(s)", applied);
        }
        Ok(())
    }
}

/// Timestamps are stored as RFC 3339 TEXT in UTC.
pub(crate) fn now_utc() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        // A second pass must be a no-op, not a re-application.
        db.migrate().await.unwrap();

        let version: i64 = db
            .conn
            .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn schema_has_all_tables() {
        let db = Database::open_in_memory().await.unwrap();
        let count: i64 = db
            .conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                     ('users', 'canteens', 'dishes', 'ratings', 'orders', 'order_items',
                      'dish_option_configs')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(count, 7);
    }
}
