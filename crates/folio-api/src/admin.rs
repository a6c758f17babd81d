use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::info;

use folio_db::models::{MessagePatch, MessageRow};
use folio_types::api::{
    AdminMessage, CountryCount, MessagePage, MessageStats, OkResponse, PageQuery, UpdateMessageRequest,
    UpdateSettingsRequest,
};

use crate::error::{ApiError, AppJson, parse_id};
use crate::messages::{page_offset, parse_page, total_pages};
use crate::state::{AppState, run_db};

pub const ADMIN_PAGE_SIZE: u32 = 20;
const TOP_COUNTRIES: u32 = 5;

fn admin_view(row: MessageRow) -> AdminMessage {
    AdminMessage {
        id: row.id,
        text: row.text,
        author: row.author,
        answer: row.answer,
        banned: row.banned,
        pinned: row.pinned,
        admin_liked: row.admin_liked,
        ip: row.ip,
        user_agent: row.user_agent,
        geo: row.geo,
        created_at: row.created_at,
    }
}

/// A reply that is blank after trimming clears the stored answer.
pub(crate) fn normalize_answer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn to_patch(req: UpdateMessageRequest) -> MessagePatch {
    MessagePatch {
        banned: req.banned,
        answer: req.answer.as_deref().map(normalize_answer),
        pinned: req.pinned,
        admin_liked: req.admin_liked,
    }
}

/// GET /admin/messages?page
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagePage<AdminMessage>>, ApiError> {
    let page = parse_page(query.page.as_deref());

    let (total, rows) = run_db(&state, move |db| {
        Ok((
            db.count_messages()?,
            db.list_messages(ADMIN_PAGE_SIZE, page_offset(page, ADMIN_PAGE_SIZE))?,
        ))
    })
    .await?;

    Ok(Json(MessagePage {
        messages: rows.into_iter().map(admin_view).collect(),
        total,
        page,
        total_pages: total_pages(total, ADMIN_PAGE_SIZE),
    }))
}

/// PATCH /admin/messages/{id}
pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateMessageRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = parse_id(&id)?;
    let patch = to_patch(req);
    if patch.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }

    let summary = format!("{patch:?}");
    if !run_db(&state, move |db| db.update_message(id, &patch)).await? {
        return Err(ApiError::not_found("Message not found"));
    }

    info!(id, patch = %summary, "Message updated by admin");
    Ok(Json(OkResponse::OK))
}

/// DELETE /admin/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !run_db(&state, move |db| db.delete_message(id)).await? {
        return Err(ApiError::not_found("Message not found"));
    }

    info!(id, "Message deleted by admin");
    Ok(Json(OkResponse::OK))
}

/// Shared by `/admin/stats` and `/bot/stats`.
pub(crate) async fn message_stats(state: &AppState) -> Result<MessageStats, ApiError> {
    let day_ago = Utc::now() - Duration::days(1);
    let (counts, countries) = run_db(state, move |db| {
        Ok((db.message_counts(day_ago)?, db.top_message_countries(TOP_COUNTRIES)?))
    })
    .await?;

    Ok(MessageStats {
        total: counts.total,
        banned: counts.banned,
        replied: counts.replied,
        today: counts.today,
        countries: countries
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
    })
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<MessageStats>, ApiError> {
    Ok(Json(message_stats(&state).await?))
}

/// GET /admin/settings
///
/// Values are stored as JSON text; anything that fails to parse is returned
/// as the raw string.
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Map<String, Value>>, ApiError> {
    let rows = run_db(&state, |db| db.all_settings()).await?;

    let settings = rows
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect();

    Ok(Json(settings))
}

/// PUT /admin/settings
pub async fn put_settings(
    State(state): State<AppState>,
    AppJson(req): AppJson<UpdateSettingsRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let emojis = parse_emoji_list(req.reaction_emojis)?;
    let count = emojis.len();
    run_db(&state, move |db| db.set_reaction_emojis(&emojis)).await?;

    info!(count, "Reaction emojis updated");
    Ok(Json(OkResponse::OK))
}

fn parse_emoji_list(value: Option<Value>) -> Result<Vec<String>, ApiError> {
    let value = value.ok_or_else(|| ApiError::validation("reaction_emojis is required"))?;
    let Value::Array(items) = value else {
        return Err(ApiError::validation("reaction_emojis must be an array of strings"));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(ApiError::validation("reaction_emojis must be an array of strings")),
        })
        .collect()
}
