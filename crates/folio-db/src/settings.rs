use anyhow::Result;
use tracing::warn;

use crate::{Database, OptionalExt};

pub const REACTION_EMOJIS_KEY: &str = "reaction_emojis";

pub const DEFAULT_REACTION_EMOJIS: [&str; 6] = ["👍", "❤️", "😂", "😮", "😢", "🔥"];

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |r| r.get(0))
                .optional()
        })
    }

    pub fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;
            Ok(())
        })
    }

    /// Every stored setting as raw `(key, value)` text, ordered by key.
    pub fn all_settings(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The current reaction allow-list, falling back to the defaults when
    /// the setting is missing or unreadable.
    pub fn reaction_emojis(&self) -> Result<Vec<String>> {
        let Some(raw) = self.get_setting(REACTION_EMOJIS_KEY)? else {
            return Ok(default_emojis());
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(emojis) => Ok(emojis),
            Err(e) => {
                warn!("Unreadable {} setting ({}), using defaults", REACTION_EMOJIS_KEY, e);
                Ok(default_emojis())
            }
        }
    }

    pub fn set_reaction_emojis(&self, emojis: &[String]) -> Result<()> {
        let value = serde_json::to_string(emojis)?;
        self.put_setting(REACTION_EMOJIS_KEY, &value)
    }
}

fn default_emojis() -> Vec<String> {
    DEFAULT_REACTION_EMOJIS.iter().map(|e| e.to_string()).collect()
}
