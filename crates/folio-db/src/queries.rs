use crate::models::{
    MessageCounts, MessagePatch, MessageRow, NewMessage, ReactionCountRow, SessionReactionRow,
};
use crate::{Database, OptionalExt, placeholders, top_countries};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

const MESSAGE_COLUMNS: &str =
    "id, text, author, answer, banned, pinned, admin_liked, ip, user_agent, geo, created_at";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>, created_at: DateTime<Utc>) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (text, ip, user_agent, geo, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![msg.text, msg.ip, msg.user_agent, msg.geo, created_at],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?.ok_or_else(|| anyhow!("Inserted message {} not found", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Public listing: non-banned only, pinned first, then newest first.
    pub fn list_visible_messages(&self, limit: u32, offset: u64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE banned = 0
                 ORDER BY pinned DESC, created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2"
            );
            collect_messages(conn, &sql, rusqlite::params![limit, offset as i64])
        })
    }

    pub fn count_visible_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM messages WHERE banned = 0", [], |r| r.get(0))?)
        })
    }

    /// Moderation listing: every message, newest first.
    pub fn list_messages(&self, limit: u32, offset: u64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2"
            );
            collect_messages(conn, &sql, rusqlite::params![limit, offset as i64])
        })
    }

    pub fn count_messages(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?))
    }

    /// Substring search over message text, newest first.
    /// Matching is case-insensitive for ASCII letters (SQLite `LIKE`).
    pub fn search_messages(&self, needle: &str, limit: u32) -> Result<Vec<MessageRow>> {
        let pattern = format!("%{}%", escape_like(needle));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE text LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            );
            collect_messages(conn, &sql, rusqlite::params![pattern, limit])
        })
    }

    /// True when the message exists and is not banned.
    pub fn is_message_visible(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1 AND banned = 0)",
                [id],
                |r| r.get(0),
            )?)
        })
    }

    /// Apply the present fields of `patch`. Returns false when the message does not exist.
    pub fn update_message(&self, id: i64, patch: &MessagePatch) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool =
                tx.query_row("SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)", [id], |r| r.get(0))?;
            if !exists {
                return Ok(false);
            }

            if let Some(banned) = patch.banned {
                tx.execute("UPDATE messages SET banned = ?1 WHERE id = ?2", rusqlite::params![banned, id])?;
            }
            if let Some(answer) = &patch.answer {
                tx.execute("UPDATE messages SET answer = ?1 WHERE id = ?2", rusqlite::params![answer, id])?;
            }
            if let Some(pinned) = patch.pinned {
                tx.execute("UPDATE messages SET pinned = ?1 WHERE id = ?2", rusqlite::params![pinned, id])?;
            }
            if let Some(liked) = patch.admin_liked {
                tx.execute(
                    "UPDATE messages SET admin_liked = ?1 WHERE id = ?2",
                    rusqlite::params![liked, id],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Delete a message; its reactions go with it. Returns false when absent.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }

    pub fn message_counts(&self, day_ago: DateTime<Utc>) -> Result<MessageCounts> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(banned), 0),
                        COUNT(answer),
                        COALESCE(SUM(created_at >= ?1), 0)
                 FROM messages",
                [day_ago],
                |r| {
                    Ok(MessageCounts {
                        total: r.get(0)?,
                        banned: r.get(1)?,
                        replied: r.get(2)?,
                        today: r.get(3)?,
                    })
                },
            )?)
        })
    }

    pub fn top_message_countries(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| top_countries(conn, "messages", limit))
    }

    // -- Reactions --

    /// Toggle a reaction: removes if it exists, inserts if not.
    /// Returns true when the reaction is now present.
    ///
    /// An insert that loses a race against an identical concurrent insert is
    /// ignored by the unique constraint and still reported as present.
    pub fn toggle_reaction(&self, message_id: i64, emoji: &str, session_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND emoji = ?2 AND session_id = ?3",
                rusqlite::params![message_id, emoji, session_id],
            )?;

            if removed == 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO reactions (message_id, emoji, session_id) VALUES (?1, ?2, ?3)",
                    rusqlite::params![message_id, emoji, session_id],
                )?;
            }

            tx.commit()?;
            Ok(removed == 0)
        })
    }

    /// Per-emoji reaction counts for a batch of messages, across all sessions.
    pub fn reaction_counts(&self, message_ids: &[i64]) -> Result<Vec<ReactionCountRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, emoji, COUNT(*) FROM reactions
                 WHERE message_id IN ({})
                 GROUP BY message_id, emoji",
                placeholders(1, message_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionCountRow {
                        message_id: row.get(0)?,
                        emoji: row.get(1)?,
                        count: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The emojis one session has applied to each of a batch of messages.
    pub fn session_reactions(&self, message_ids: &[i64], session_id: &str) -> Result<Vec<SessionReactionRow>> {
        if message_ids.is_empty() || session_id.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, emoji FROM reactions
                 WHERE message_id IN ({}) AND session_id = ?{}
                 ORDER BY id",
                placeholders(1, message_ids.len()),
                message_ids.len() + 1
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();
            params.push(&session_id);

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(SessionReactionRow {
                        message_id: row.get(0)?,
                        emoji: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        author: row.get(2)?,
        answer: row.get(3)?,
        banned: row.get(4)?,
        pinned: row.get(5)?,
        admin_liked: row.get(6)?,
        ip: row.get(7)?,
        user_agent: row.get(8)?,
        geo: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    conn.query_row(&sql, [id], message_from_row).optional()
}

fn collect_messages(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_message(text: &str) -> NewMessage<'_> {
        NewMessage {
            text,
            ip: "203.0.113.7",
            user_agent: "test-agent",
            geo: None,
        }
    }

    fn seed(db: &Database, texts: &[&str]) -> Vec<i64> {
        let base = Utc::now() - Duration::hours(1);
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                db.insert_message(&new_message(t), base + Duration::seconds(i as i64))
                    .unwrap()
                    .id
            })
            .collect()
    }

    #[test]
    fn insert_applies_defaults() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_message(&new_message("hello"), Utc::now()).unwrap();

        assert_eq!(row.text, "hello");
        assert_eq!(row.author, "anon");
        assert!(row.answer.is_none());
        assert!(!row.banned && !row.pinned && !row.admin_liked);
        assert_eq!(row.ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn visible_listing_orders_pinned_then_newest() {
        let db = Database::open_in_memory().unwrap();
        let ids = seed(&db, &["a", "b", "c", "d"]);

        db.update_message(ids[0], &MessagePatch { pinned: Some(true), ..Default::default() })
            .unwrap();
        db.update_message(ids[2], &MessagePatch { banned: Some(true), ..Default::default() })
            .unwrap();

        let texts: Vec<String> = db
            .list_visible_messages(10, 0)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["a", "d", "b"]);
        assert_eq!(db.count_visible_messages().unwrap(), 3);
        assert_eq!(db.count_messages().unwrap(), 4);
    }

    #[test]
    fn same_timestamp_falls_back_to_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_message(&new_message("first"), now).unwrap();
        db.insert_message(&new_message("second"), now).unwrap();

        let listed = db.list_messages(10, 0).unwrap();
        assert_eq!(listed[0].text, "second");
        assert_eq!(listed[1].text, "first");
    }

    #[test]
    fn toggle_alternates_and_never_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db, &["x"])[0];

        assert!(db.toggle_reaction(id, "👍", "s1").unwrap());
        assert!(!db.toggle_reaction(id, "👍", "s1").unwrap());
        assert!(db.toggle_reaction(id, "👍", "s1").unwrap());
        db.toggle_reaction(id, "👍", "s2").unwrap();
        db.toggle_reaction(id, "🔥", "s1").unwrap();

        let counts = db.reaction_counts(&[id]).unwrap();
        let thumbs = counts.iter().find(|c| c.emoji == "👍").unwrap();
        assert_eq!(thumbs.count, 2);

        let mine: Vec<String> = db
            .session_reactions(&[id], "s1")
            .unwrap()
            .into_iter()
            .map(|r| r.emoji)
            .collect();
        assert_eq!(mine, vec!["👍", "🔥"]);
        assert!(db.session_reactions(&[id], "").unwrap().is_empty());
    }

    #[test]
    fn delete_cascades_to_reactions() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db, &["x"])[0];
        db.toggle_reaction(id, "👍", "s1").unwrap();

        assert!(db.delete_message(id).unwrap());
        assert!(!db.delete_message(id).unwrap());

        let remaining: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reactions", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db, &["x"])[0];

        let patch = MessagePatch {
            answer: Some(Some("thanks!".into())),
            ..Default::default()
        };
        assert!(db.update_message(id, &patch).unwrap());

        let row = db.get_message(id).unwrap().unwrap();
        assert_eq!(row.answer.as_deref(), Some("thanks!"));
        assert!(!row.banned && !row.pinned && !row.admin_liked);

        let clear = MessagePatch {
            answer: Some(None),
            ..Default::default()
        };
        db.update_message(id, &clear).unwrap();
        assert!(db.get_message(id).unwrap().unwrap().answer.is_none());

        assert!(!db.update_message(id + 100, &patch).unwrap());
    }

    #[test]
    fn search_is_substring_and_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, &["Hello world", "100% rust", "nothing here"]);

        let hits = db.search_messages("HELLO", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Hello world");

        let hits = db.search_messages("%", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "100% rust");
    }

    #[test]
    fn counts_cover_banned_replied_and_recent() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let old = db.insert_message(&new_message("old"), now - Duration::days(3)).unwrap();
        let fresh = db.insert_message(&new_message("fresh"), now).unwrap();

        db.update_message(old.id, &MessagePatch { banned: Some(true), ..Default::default() })
            .unwrap();
        db.update_message(
            fresh.id,
            &MessagePatch { answer: Some(Some("hi".into())), ..Default::default() },
        )
        .unwrap();

        let counts = db.message_counts(now - Duration::days(1)).unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.banned, 1);
        assert_eq!(counts.replied, 1);
        assert_eq!(counts.today, 1);
    }

    #[test]
    fn message_countries_include_banned_rows() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for geo in [r#"{"country":"Chile"}"#, "not json", r#"{"country":"Peru"}"#, r#"{"country":"Peru"}"#] {
            let msg = NewMessage {
                geo: Some(geo),
                ..new_message("hi")
            };
            db.insert_message(&msg, now).unwrap();
        }
        db.insert_message(&new_message("no geo"), now).unwrap();
        db.update_message(1, &MessagePatch { banned: Some(true), ..Default::default() })
            .unwrap();

        assert_eq!(
            db.top_message_countries(5).unwrap(),
            vec![("Peru".to_string(), 2), ("Chile".to_string(), 1)]
        );
        assert_eq!(db.top_message_countries(1).unwrap().len(), 1);
    }
}
