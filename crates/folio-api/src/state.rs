use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tracing::error;

use folio_db::Database;

use crate::error::ApiError;
use crate::geo::GeoLocator;
use crate::notify::BotNotifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
    pub geo: GeoLocator,
    pub notifier: BotNotifier,
    /// Honor `X-Forwarded-For`/`X-Real-IP` from a reverse proxy.
    pub trust_proxy: bool,
    pub started_at: Instant,
}

/// Secrets the guards check against.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// PHC-format hash; `None` disables admin login.
    pub admin_password_hash: Option<String>,
    /// Shared secret for the bot surface; `None` disables it.
    pub bot_secret: Option<String>,
}

impl AppStateInner {
    pub fn new(db: Database, auth: AuthConfig, geo: GeoLocator, notifier: BotNotifier) -> AppState {
        Self::builder(db, auth, geo, notifier).build()
    }

    /// Like `new`, but lets the caller opt into proxy headers first.
    pub fn builder(db: Database, auth: AuthConfig, geo: GeoLocator, notifier: BotNotifier) -> AppStateBuilder {
        AppStateBuilder {
            inner: Self {
                db,
                auth,
                geo,
                notifier,
                trust_proxy: false,
                started_at: Instant::now(),
            },
        }
    }
}

pub struct AppStateBuilder {
    inner: AppStateInner,
}

impl AppStateBuilder {
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.inner.trust_proxy = trust;
        self
    }

    pub fn build(self) -> AppState {
        Arc::new(self.inner)
    }
}

/// Run a blocking store call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::from)
}
