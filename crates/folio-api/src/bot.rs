use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use folio_db::models::{MessagePatch, MessageRow};
use folio_types::api::{
    BanIpRequest, BanIpResponse, BotActionRequest, BotActionResponse, BotMessage, BotMessages,
    BotOverview, BotStatus, MessageStats, RecentQuery, SearchQuery,
};

use crate::admin::{message_stats, normalize_answer};
use crate::error::{ApiError, AppJson, parse_id};
use crate::state::{AppState, run_db};

const MAX_LIMIT: u32 = 20;
const RECENT_DEFAULT: u32 = 5;
const SEARCH_DEFAULT: u32 = 10;
const LIVE_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Ban,
    Unban,
    Pin,
    Unpin,
    Like,
    Unlike,
    Answer,
    Delete,
}

impl ModerationAction {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "ban" => Self::Ban,
            "unban" => Self::Unban,
            "pin" => Self::Pin,
            "unpin" => Self::Unpin,
            "like" => Self::Like,
            "unlike" => Self::Unlike,
            "answer" => Self::Answer,
            "delete" => Self::Delete,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Pin => "pin",
            Self::Unpin => "unpin",
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Answer => "answer",
            Self::Delete => "delete",
        }
    }

    /// The field update this action amounts to. `Delete` has none.
    pub fn patch(self, answer: Option<&str>) -> Option<MessagePatch> {
        let mut patch = MessagePatch::default();
        match self {
            Self::Ban | Self::Unban => patch.banned = Some(self == Self::Ban),
            Self::Pin | Self::Unpin => patch.pinned = Some(self == Self::Pin),
            Self::Like | Self::Unlike => patch.admin_liked = Some(self == Self::Like),
            Self::Answer => patch.answer = Some(normalize_answer(answer.unwrap_or_default())),
            Self::Delete => return None,
        }
        Some(patch)
    }
}

/// Parsed `limit`, clamped to `1..=20`. Missing, garbage and zero fall back
/// to the default.
pub fn clamp_limit(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|l| *l != 0)
        .map(|l| l.clamp(1, i64::from(MAX_LIMIT)) as u32)
        .unwrap_or(default)
}

fn bot_view(row: MessageRow) -> BotMessage {
    BotMessage {
        id: row.id,
        text: row.text,
        answer: row.answer,
        banned: row.banned,
        pinned: row.pinned,
        admin_liked: row.admin_liked,
        created_at: row.created_at,
    }
}

/// GET /bot/status
pub async fn status(State(state): State<AppState>) -> Result<Json<BotStatus>, ApiError> {
    run_db(&state, |db| db.ping()).await?;
    Ok(Json(BotStatus {
        ok: true,
        uptime_sec: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    }))
}

/// GET /bot/overview
pub async fn overview(State(state): State<AppState>) -> Result<Json<BotOverview>, ApiError> {
    let now = Utc::now();
    let overview = run_db(&state, move |db| {
        let counts = db.message_counts(now - Duration::days(1))?;
        Ok(BotOverview {
            total_messages: counts.total,
            today_messages: counts.today,
            total_visits: db.count_visits()?,
            live_visitors: db.live_sessions(now - Duration::minutes(LIVE_WINDOW_MINUTES))?,
        })
    })
    .await?;
    Ok(Json(overview))
}

/// GET /bot/messages/recent?limit
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<BotMessages>, ApiError> {
    let limit = clamp_limit(query.limit.as_deref(), RECENT_DEFAULT);
    let rows = run_db(&state, move |db| db.list_messages(limit, 0)).await?;
    Ok(Json(BotMessages {
        messages: rows.into_iter().map(bot_view).collect(),
    }))
}

/// GET /bot/messages/search?q&limit
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<BotMessages>, ApiError> {
    let needle = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::validation("Query is required"))?;
    let limit = clamp_limit(query.limit.as_deref(), SEARCH_DEFAULT);

    let rows = run_db(&state, move |db| db.search_messages(&needle, limit)).await?;
    Ok(Json(BotMessages {
        messages: rows.into_iter().map(bot_view).collect(),
    }))
}

/// GET /bot/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<MessageStats>, ApiError> {
    Ok(Json(message_stats(&state).await?))
}

/// POST /bot/messages/{id}/action
pub async fn action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<BotActionRequest>,
) -> Result<Json<BotActionResponse>, ApiError> {
    let raw = req
        .action
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::validation("Action is required"))?;
    let action = ModerationAction::parse(&raw).ok_or_else(|| ApiError::validation("Unsupported action"))?;
    let id = parse_id(&id)?;

    let applied = match action.patch(req.answer.as_deref()) {
        Some(patch) => run_db(&state, move |db| db.update_message(id, &patch)).await?,
        None => run_db(&state, move |db| db.delete_message(id)).await?,
    };
    if !applied {
        return Err(ApiError::not_found("Message not found"));
    }

    info!(id, action = action.as_str(), "Bot moderation action");
    Ok(Json(BotActionResponse {
        ok: true,
        action: action.as_str().to_string(),
    }))
}

/// POST /bot/ban-ip
///
/// Bans an explicit `ip`, or the address a message was posted from.
pub async fn ban_ip(
    State(state): State<AppState>,
    AppJson(req): AppJson<BanIpRequest>,
) -> Result<Json<BanIpResponse>, ApiError> {
    let ip = match (req.ip.filter(|ip| !ip.trim().is_empty()), req.message_id) {
        (Some(ip), _) => {
            let ip = ip.trim();
            ip.parse::<IpAddr>()
                .map_err(|_| ApiError::validation("Invalid IP address"))?;
            ip.to_string()
        }
        (None, Some(message_id)) => run_db(&state, move |db| db.message_ip(message_id))
            .await?
            .ok_or_else(|| ApiError::not_found("Message not found"))?
            .filter(|ip| !ip.is_empty() && ip != "unknown")
            .ok_or_else(|| ApiError::not_found("Message has no recorded IP"))?,
        (None, None) => return Err(ApiError::validation("ip or messageId is required")),
    };

    let created = run_db(&state, {
        let ip = ip.clone();
        move |db| db.ban_ip(&ip, Utc::now())
    })
    .await?;

    if created {
        warn!(%ip, "IP banned");
    } else {
        info!(%ip, "IP already banned");
    }
    Ok(Json(BanIpResponse { ok: true, ip, created }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_and_roundtrip() {
        for name in ["ban", "unban", "pin", "unpin", "like", "unlike", "answer", "delete"] {
            assert_eq!(ModerationAction::parse(name).unwrap().as_str(), name);
        }
        assert!(ModerationAction::parse("nuke").is_none());
        assert!(ModerationAction::parse("BAN").is_none());
    }

    #[test]
    fn actions_map_to_single_field_patches() {
        let ban = ModerationAction::Unban.patch(None).unwrap();
        assert_eq!(ban, MessagePatch { banned: Some(false), ..Default::default() });

        let answer = ModerationAction::Answer.patch(Some(" hi ")).unwrap();
        assert_eq!(answer.answer, Some(Some("hi".into())));

        let cleared = ModerationAction::Answer.patch(None).unwrap();
        assert_eq!(cleared.answer, Some(None));

        assert!(ModerationAction::Delete.patch(None).is_none());
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 5), 5);
        assert_eq!(clamp_limit(Some("x"), 5), 5);
        assert_eq!(clamp_limit(Some("0"), 5), 5);
        assert_eq!(clamp_limit(Some("-3"), 5), 1);
        assert_eq!(clamp_limit(Some("7"), 5), 7);
        assert_eq!(clamp_limit(Some("500"), 10), 20);
    }
}
