pub mod admin;
pub mod analytics;
pub mod auth;
pub mod bot;
pub mod error;
pub mod geo;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod notify;
pub mod reactions;
pub mod state;

use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};

use folio_types::api::OkResponse;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<OkResponse>, ApiError> {
    run_db(&state, |db| db.ping()).await?;
    Ok(Json(OkResponse::OK))
}

/// Every API route, unprefixed. The binary nests this under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/shoutbox", get(messages::list_messages).post(messages::post_message))
        .route("/shoutbox/{id}/react", post(reactions::toggle_reaction))
        .route("/settings/emojis", get(reactions::list_emojis))
        .route("/analytics/visit", post(analytics::record_visit).patch(analytics::update_duration))
        .route("/analytics/beacon", post(analytics::beacon))
        .route("/analytics/counter", get(analytics::counter))
        .route("/moderate", post(moderation::moderate))
        .route("/admin/login", post(auth::login));

    let admin_routes = Router::new()
        .route("/admin/messages", get(admin::list_messages))
        .route(
            "/admin/messages/{id}",
            patch(admin::update_message).delete(admin::delete_message),
        )
        .route("/admin/stats", get(admin::stats))
        .route("/admin/settings", get(admin::get_settings).put(admin::put_settings))
        .route("/admin/analytics", get(analytics::admin_report))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin));

    let bot_routes = Router::new()
        .route("/bot/status", get(bot::status))
        .route("/bot/overview", get(bot::overview))
        .route("/bot/messages/recent", get(bot::recent))
        .route("/bot/messages/search", get(bot::search))
        .route("/bot/stats", get(bot::stats))
        .route("/bot/messages/{id}/action", post(bot::action))
        .route("/bot/ban-ip", post(bot::ban_ip))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_bot));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(bot_routes)
        .with_state(state)
}
