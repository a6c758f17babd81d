use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Common --

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: Self = Self { ok: true };
}

/// One page of messages plus the totals the client needs to render a pager.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage<T> {
    pub messages: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

// -- Shoutbox --

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShoutboxQuery {
    pub page: Option<String>,
    pub sid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublicMessage {
    pub id: i64,
    pub text: String,
    pub answer: Option<String>,
    pub pinned: bool,
    pub admin_liked: bool,
    pub created_at: DateTime<Utc>,
    pub reactions: HashMap<String, i64>,
    #[serde(rename = "myReactions")]
    pub my_reactions: Vec<String>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReactionRequest {
    pub emoji: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
}

#[derive(Debug, Serialize)]
pub struct ToggleReactionResponse {
    pub action: ReactionAction,
}

#[derive(Debug, Serialize)]
pub struct EmojisResponse {
    pub emojis: Vec<String>,
}

// -- Analytics --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVisitRequest {
    pub session_id: Option<String>,
    pub referrer: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDurationRequest {
    pub session_id: Option<String>,
    /// Seconds. Clients send whole numbers but floats are tolerated.
    pub duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VisitCounter {
    pub total: i64,
    pub live: i64,
}

#[derive(Debug, Serialize)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HourCount {
    pub hour: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ReferrerCount {
    pub referrer: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct PathCount {
    pub path: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserCount {
    pub browser: String,
    pub count: i64,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceCounts {
    pub mobile: i64,
    pub desktop: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total: i64,
    pub unique: i64,
    pub today: i64,
    pub live: i64,
    pub avg_duration: i64,
    pub bounce_rate: i64,
    pub daily_visits: Vec<DayCount>,
    pub hourly_visits: Vec<HourCount>,
    pub top_referrers: Vec<ReferrerCount>,
    pub top_pages: Vec<PathCount>,
    pub devices: DeviceCounts,
    pub countries: Vec<CountryCount>,
    pub top_browsers: Vec<BrowserCount>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Full moderation view of a message, including capture metadata.
#[derive(Debug, Serialize)]
pub struct AdminMessage {
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

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMessageRequest {
    pub banned: Option<bool>,
    pub answer: Option<String>,
    pub pinned: Option<bool>,
    pub admin_liked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MessageStats {
    pub total: i64,
    pub banned: i64,
    pub replied: i64,
    pub today: i64,
    pub countries: Vec<CountryCount>,
}

/// Only `reaction_emojis` is recognized. It is kept as a raw value so the
/// handler can report a precise validation error instead of a generic
/// deserialization failure.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub reaction_emojis: Option<serde_json::Value>,
}

// -- Bot --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub ok: bool,
    pub uptime_sec: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotOverview {
    pub total_messages: i64,
    pub today_messages: i64,
    pub total_visits: i64,
    pub live_visitors: i64,
}

#[derive(Debug, Serialize)]
pub struct BotMessage {
    pub id: i64,
    pub text: String,
    pub answer: Option<String>,
    pub banned: bool,
    pub pinned: bool,
    pub admin_liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BotMessages {
    pub messages: Vec<BotMessage>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BotActionRequest {
    pub action: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BotActionResponse {
    pub ok: bool,
    pub action: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanIpRequest {
    pub ip: Option<String>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BanIpResponse {
    pub ok: bool,
    pub ip: String,
    pub created: bool,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamAssessment {
    pub score: f32,
    pub is_spam: bool,
    pub reasons: Vec<&'static str>,
}
