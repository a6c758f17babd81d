mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use folio_api::auth::hash_password;
use folio_api::geo::GeoLocator;
use folio_api::notify::BotNotifier;
use folio_api::state::{AppStateInner, AuthConfig};
use folio_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,tower_http=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    if let Some(cmd) = args.next() {
        return match (cmd.as_str(), args.next()) {
            ("hash-password", Some(password)) => {
                println!("{}", hash_password(&password)?);
                Ok(())
            }
            _ => anyhow::bail!("usage: folio [hash-password <password>]"),
        };
    }

    let config = Config::from_env()?;
    if config.admin_password_hash.is_none() {
        warn!("FOLIO_ADMIN_PASSWORD_HASH is not set; admin login is disabled");
    }
    if config.bot_secret.is_none() {
        warn!("FOLIO_BOT_SECRET is not set; the bot API is disabled");
    }
    if config.trust_proxy {
        info!("Trusting X-Forwarded-For from the reverse proxy");
    }

    // Init database
    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .context("failed to build HTTP client")?;

    let notifier = BotNotifier::new(http.clone(), config.bot_events_url.clone(), config.bot_secret.clone());
    if !notifier.is_enabled() {
        warn!("FOLIO_BOT_EVENTS_URL or FOLIO_BOT_SECRET is not set; new-message webhook is disabled");
    }

    let state = AppStateInner::builder(
        db,
        AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
            admin_password_hash: config.admin_password_hash.clone(),
            bot_secret: config.bot_secret.clone(),
        },
        GeoLocator::new(http, config.geo_url.clone()),
        notifier,
    )
    .trust_proxy(config.trust_proxy)
    .build();

    let app = Router::new()
        .nest("/api", folio_api::router(state.clone()))
        .layer(cors_layer(config.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr()?;
    info!("Folio API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(state) {
        Ok(inner) => inner.db.close()?,
        Err(_) => warn!("App state still shared at shutdown; database left to drop"),
    }

    Ok(())
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Ok(match origin {
        Some(origin) => layer.allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid FOLIO_CORS_ORIGIN: {origin}"))?,
        ),
        None => layer.allow_origin(Any),
    })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
