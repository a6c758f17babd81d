use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::settings::{DEFAULT_REACTION_EMOJIS, REACTION_EMOJIS_KEY};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                text        TEXT NOT NULL,
                author      TEXT NOT NULL DEFAULT 'anon',
                answer      TEXT,
                banned      INTEGER NOT NULL DEFAULT 0,
                pinned      INTEGER NOT NULL DEFAULT 0,
                admin_liked INTEGER NOT NULL DEFAULT 0,
                ip          TEXT,
                user_agent  TEXT,
                geo         TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_banned_created
                ON messages(banned, created_at DESC);

            CREATE TABLE reactions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                emoji       TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                UNIQUE(message_id, emoji, session_id)
            );

            CREATE INDEX idx_reactions_message
                ON reactions(message_id);

            CREATE TABLE settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE visits (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                ip          TEXT,
                user_agent  TEXT,
                geo         TEXT,
                referrer    TEXT NOT NULL DEFAULT '',
                path        TEXT NOT NULL DEFAULT '/',
                duration    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_visits_session_id ON visits(session_id);
            CREATE INDEX idx_visits_created_at ON visits(created_at);

            CREATE TABLE banned_ips (
                ip          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    // Seeded once; later replaced wholesale by the admin
    let defaults = serde_json::to_string(&DEFAULT_REACTION_EMOJIS)?;
    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
        (REACTION_EMOJIS_KEY, defaults),
    )?;

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn seed_does_not_overwrite_admin_choice() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute(
            "UPDATE settings SET value = '[\"🦀\"]' WHERE key = ?1",
            [REACTION_EMOJIS_KEY],
        )
        .unwrap();

        run(&conn).unwrap();

        let value: String = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [REACTION_EMOJIS_KEY], |r| r.get(0))
            .unwrap();
        assert_eq!(value, "[\"🦀\"]");
    }
}
