use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use folio_types::api::{LoginRequest, LoginResponse};

use crate::error::{ApiError, AppJson};
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "admin";
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// POST /admin/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let password = req.password.unwrap_or_default();
    let Some(hash) = state.auth.admin_password_hash.clone() else {
        warn!("Admin login attempted but no password hash is configured");
        return Err(ApiError::unauthorized("Wrong password"));
    };
    if password.is_empty() {
        return Err(ApiError::unauthorized("Wrong password"));
    }

    // Argon2 verification blocks for tens of milliseconds.
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password check failed: {e}")))?;

    if !matches {
        warn!("Admin login failed");
        return Err(ApiError::unauthorized("Wrong password"));
    }

    let token = issue_token(&state.auth.jwt_secret, Utc::now())?;
    info!("Admin logged in");
    Ok(Json(LoginResponse { token }))
}

pub fn issue_token(secret: &str, now: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = AdminClaims {
        role: ADMIN_ROLE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Checks signature, role and expiry against `now`. Returns `None` for any
/// token that should not be accepted.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Option<AdminClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = decode::<AdminClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).ok()?;
    let claims = data.claims;

    if claims.role != ADMIN_ROLE || claims.exp <= now.timestamp() {
        return None;
    }
    Some(claims)
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Constant-time check of `password` against a PHC hash. A malformed hash
/// never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("Configured admin password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_is_valid_until_ttl() {
        let issued = Utc::now();
        let token = issue_token(SECRET, issued).unwrap();

        let claims = verify_token(SECRET, &token, issued).unwrap();
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);

        let almost = issued + Duration::hours(23) + Duration::minutes(59);
        assert!(verify_token(SECRET, &token, almost).is_some());
        assert!(verify_token(SECRET, &token, issued + Duration::hours(24)).is_none());
    }

    #[test]
    fn wrong_secret_or_garbage_is_rejected() {
        let token = issue_token(SECRET, Utc::now()).unwrap();
        assert!(verify_token("other", &token, Utc::now()).is_none());
        assert!(verify_token(SECRET, "not.a.jwt", Utc::now()).is_none());
    }

    #[test]
    fn non_admin_role_is_rejected() {
        let now = Utc::now();
        let claims = AdminClaims {
            role: "visitor".into(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(verify_token(SECRET, &token, now).is_none());
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
