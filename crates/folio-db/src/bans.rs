use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{Database, OptionalExt};

impl Database {
    /// Record an IP ban. Returns false when the IP was already banned.
    pub fn ban_ip(&self, ip: &str, created_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO banned_ips (ip, created_at) VALUES (?1, ?2)",
                rusqlite::params![ip, created_at],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn is_ip_banned(&self, ip: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM banned_ips WHERE ip = ?1)",
                [ip],
                |r| r.get(0),
            )?)
        })
    }

    /// The IP captured when a message was posted.
    /// Outer `None` means no such message; inner `None` means no IP was recorded.
    pub fn message_ip(&self, message_id: i64) -> Result<Option<Option<String>>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT ip FROM messages WHERE id = ?1", [message_id], |r| r.get(0))
                .optional()
        })
    }
}
