pub mod bans;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod settings;
pub mod visits;

use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::ToSql;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Handle to the SQLite store. Opened once at start-up and shared by every
/// handler; all SQL in the workspace goes through it.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Reactions cascade with their message
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like `with_conn`, but hands out `&mut` so the closure can open a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }

    /// Cheap liveness check.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Flush and close the underlying connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        conn.close().map_err(|(_, e)| e)?;
        info!("Database closed");
        Ok(())
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Numbered placeholders `?start, ?start+1, ...` for an `IN (...)` list.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run a two-column `label, count` query.
pub(crate) fn grouped_counts(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most common `country` across the geo blobs of `table`, which must have
/// `id` and `geo` columns. Malformed blobs and blank countries are skipped;
/// ties go to the country stored first.
pub(crate) fn top_countries(conn: &Connection, table: &'static str, limit: u32) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT country, COUNT(*) AS n FROM (
             SELECT id, CASE WHEN json_valid(geo) THEN json_extract(geo, '$.country') END AS country
             FROM {table} WHERE geo IS NOT NULL
         )
         WHERE typeof(country) = 'text' AND trim(country) != ''
         GROUP BY country ORDER BY n DESC, MIN(id) ASC
         LIMIT ?1"
    );
    grouped_counts(conn, &sql, rusqlite::params![limit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(4, 1), "?4");
    }

    #[test]
    fn in_memory_store_pings_and_closes() {
        let db = Database::open_in_memory().unwrap();
        db.ping().unwrap();
        db.close().unwrap();
    }
}
