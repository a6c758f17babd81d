use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use folio_db::models::{MessageRow, NewMessage};
use folio_types::api::{MessagePage, OkResponse, PostMessageRequest, PublicMessage, ShoutboxQuery};
use folio_types::events::NewMessageEvent;

use crate::error::{ApiError, AppJson};
use crate::middleware::ClientMeta;
use crate::moderation;
use crate::state::{AppState, run_db};

pub const PUBLIC_PAGE_SIZE: u32 = 10;
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Missing, unparseable and non-positive pages all mean page 1.
pub fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

pub fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page - 1) * u64::from(page_size)
}

pub fn total_pages(total: i64, page_size: u32) -> i64 {
    let size = i64::from(page_size);
    (total + size - 1) / size
}

/// Trimmed message text, or the reason it is unacceptable.
pub fn validate_text(raw: Option<&str>) -> Result<String, ApiError> {
    let raw = raw.unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::validation("Text is required"));
    }
    if raw.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation("Text must be 500 characters or less"));
    }
    Ok(raw.trim().to_string())
}

/// Refuse writes from banned addresses.
pub async fn ensure_not_banned(state: &AppState, ip: &str) -> Result<(), ApiError> {
    let ip = ip.to_string();
    if run_db(state, move |db| db.is_ip_banned(&ip)).await? {
        return Err(ApiError::Forbidden("You are banned".into()));
    }
    Ok(())
}

/// GET /shoutbox?page&sid
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ShoutboxQuery>,
) -> Result<Json<MessagePage<PublicMessage>>, ApiError> {
    let page = parse_page(query.page.as_deref());
    let session = query.sid.unwrap_or_default();

    let (total, rows, counts, mine) = run_db(&state, move |db| {
        let total = db.count_visible_messages()?;
        let rows = db.list_visible_messages(PUBLIC_PAGE_SIZE, page_offset(page, PUBLIC_PAGE_SIZE))?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let counts = db.reaction_counts(&ids)?;
        let mine = db.session_reactions(&ids, &session)?;
        Ok((total, rows, counts, mine))
    })
    .await?;

    let mut reactions: HashMap<i64, HashMap<String, i64>> = HashMap::new();
    for row in counts {
        reactions.entry(row.message_id).or_default().insert(row.emoji, row.count);
    }
    let mut my_reactions: HashMap<i64, Vec<String>> = HashMap::new();
    for row in mine {
        my_reactions.entry(row.message_id).or_default().push(row.emoji);
    }

    let messages = rows
        .into_iter()
        .map(|row| PublicMessage {
            reactions: reactions.remove(&row.id).unwrap_or_default(),
            my_reactions: my_reactions.remove(&row.id).unwrap_or_default(),
            id: row.id,
            text: row.text,
            answer: row.answer,
            pinned: row.pinned,
            admin_liked: row.admin_liked,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(MessagePage {
        messages,
        total,
        page,
        total_pages: total_pages(total, PUBLIC_PAGE_SIZE),
    }))
}

/// POST /shoutbox
pub async fn post_message(
    State(state): State<AppState>,
    client: ClientMeta,
    AppJson(req): AppJson<PostMessageRequest>,
) -> Result<(StatusCode, Json<OkResponse>), ApiError> {
    let text = validate_text(req.text.as_deref())?;
    ensure_not_banned(&state, &client.ip).await?;

    let geo = state.geo.lookup(&client.ip).await.map(|g| g.to_json());

    let row: MessageRow = run_db(&state, {
        let text = text.clone();
        let geo = geo.clone();
        move |db| {
            db.insert_message(
                &NewMessage {
                    text: &text,
                    ip: &client.ip,
                    user_agent: &client.user_agent,
                    geo: geo.as_deref(),
                },
                Utc::now(),
            )
        }
    })
    .await?;

    info!(id = row.id, chars = text.chars().count(), "Shoutbox message posted");

    let verdict = moderation::assess(&row.text);
    state.notifier.notify_new_message(NewMessageEvent {
        id: row.id,
        text: row.text,
        created_at: row.created_at,
        geo: geo.unwrap_or_else(|| "{}".into()),
        spam_score: verdict.score,
        is_spam: verdict.is_spam,
    });

    Ok((StatusCode::CREATED, Json(OkResponse::OK)))
}
