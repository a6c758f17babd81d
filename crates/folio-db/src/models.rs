//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the folio-types wire models so the store stays independent.

use chrono::{DateTime, Utc};

pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub answer: Option<String>,
    pub banned: bool,
    pub pinned: bool,
    pub admin_liked: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub geo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Capture data for a freshly posted message.
pub struct NewMessage<'a> {
    pub text: &'a str,
    pub ip: &'a str,
    pub user_agent: &'a str,
    pub geo: Option<&'a str>,
}

/// Partial moderation update. Only the fields that are `Some` are written.
///
/// `answer: Some(None)` clears an existing reply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessagePatch {
    pub banned: Option<bool>,
    pub answer: Option<Option<String>>,
    pub pinned: Option<bool>,
    pub admin_liked: Option<bool>,
}

impl MessagePatch {
    pub fn is_empty(&self) -> bool {
        self.banned.is_none()
            && self.answer.is_none()
            && self.pinned.is_none()
            && self.admin_liked.is_none()
    }
}

pub struct MessageCounts {
    pub total: i64,
    pub banned: i64,
    pub replied: i64,
    pub today: i64,
}

pub struct ReactionCountRow {
    pub message_id: i64,
    pub emoji: String,
    pub count: i64,
}

pub struct SessionReactionRow {
    pub message_id: i64,
    pub emoji: String,
}

pub struct NewVisit<'a> {
    pub session_id: &'a str,
    pub ip: &'a str,
    pub user_agent: &'a str,
    pub geo: Option<&'a str>,
    pub referrer: &'a str,
    pub path: &'a str,
}

pub struct VisitSummary {
    pub total: i64,
    pub unique_ips: i64,
    pub since_day_ago: i64,
    pub avg_duration: f64,
    pub bounces: i64,
}

/// Visits split by whether the user agent looks like a phone or tablet.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeviceSplit {
    pub mobile: i64,
    pub desktop: i64,
}
