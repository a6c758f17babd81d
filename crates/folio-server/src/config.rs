use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// JWT secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const DEFAULT_GEO_URL: &str = "http://ip-api.com/json";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub jwt_secret: String,
    pub admin_password_hash: Option<String>,
    pub bot_secret: Option<String>,
    pub bot_events_url: Option<String>,
    /// `None` disables geo lookups.
    pub geo_url: Option<String>,
    /// Take the client IP from proxy headers instead of the socket peer.
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and blank are treated alike for optional values.
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = optional("FOLIO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FOLIO_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = match optional("FOLIO_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid FOLIO_PORT: {raw}"))?,
            None => 3001,
        };

        let cors_origin = optional("FOLIO_CORS_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".into());

        let geo_url = match lookup("FOLIO_GEO_URL") {
            Some(raw) => Some(raw.trim().trim_end_matches('/').to_string()).filter(|v| !v.is_empty()),
            None => Some(DEFAULT_GEO_URL.to_string()),
        };

        let trust_proxy = match optional("FOLIO_TRUST_PROXY").map(|v| v.to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => bail!("invalid FOLIO_TRUST_PROXY: {v}"),
            },
        };

        Ok(Self {
            host: optional("FOLIO_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: optional("FOLIO_DB_PATH").unwrap_or_else(|| "folio.db".into()).into(),
            cors_origin: (cors_origin != "*").then_some(cors_origin),
            jwt_secret,
            admin_password_hash: optional("FOLIO_ADMIN_PASSWORD_HASH"),
            bot_secret: optional("FOLIO_BOT_SECRET"),
            bot_events_url: optional("FOLIO_BOT_EVENTS_URL").map(|u| u.trim_end_matches('/').to_string()),
            geo_url,
            trust_proxy,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
