use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;

use folio_types::api::{EmojisResponse, ReactionAction, ToggleReactionRequest, ToggleReactionResponse};

use crate::error::{ApiError, AppJson, parse_id};
use crate::messages::ensure_not_banned;
use crate::middleware::ClientMeta;
use crate::state::{AppState, run_db};

/// POST /shoutbox/{id}/react
///
/// Only emojis in the current allow-list can be toggled. Reactions made
/// with an emoji that was later removed stay counted but are frozen.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    client: ClientMeta,
    AppJson(req): AppJson<ToggleReactionRequest>,
) -> Result<Json<ToggleReactionResponse>, ApiError> {
    let allowed = run_db(&state, |db| db.reaction_emojis()).await?;
    let emoji = req
        .emoji
        .filter(|e| allowed.contains(e))
        .ok_or_else(|| ApiError::validation("Invalid emoji"))?;
    let session_id = req
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::validation("sessionId required"))?;

    ensure_not_banned(&state, &client.ip).await?;
    let message_id = parse_id(&id)?;

    let added = run_db(&state, move |db| {
        if !db.is_message_visible(message_id)? {
            return Ok(None);
        }
        db.toggle_reaction(message_id, &emoji, &session_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Message not found"))?;

    let action = if added { ReactionAction::Added } else { ReactionAction::Removed };
    debug!(message_id, ?action, "Reaction toggled");
    Ok(Json(ToggleReactionResponse { action }))
}

/// GET /settings/emojis
pub async fn list_emojis(State(state): State<AppState>) -> Result<Json<EmojisResponse>, ApiError> {
    let emojis = run_db(&state, |db| db.reaction_emojis()).await?;
    Ok(Json(EmojisResponse { emojis }))
}
