use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event pushed to the bot integration when a new shoutbox message lands.
///
/// `geo` carries the raw geo JSON (or `"{}"`) so the receiver can render
/// whatever fields the lookup produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub geo: String,
    pub spam_score: f32,
    pub is_spam: bool,
}
