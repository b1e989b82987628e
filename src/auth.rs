use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in place of a token when running in `Env::Local`.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the session token issued by `POST /api/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: i32,
    /// Role at issue time. Informational only; authorization re-reads the store.
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// Signs a session token for the given user valid for `config.token_ttl_secs`.
pub fn issue_token(
    user_id: i32,
    role: Role,
    config: &AppConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let claims = Claims {
        sub: user_id,
        role,
        iat: now as usize,
        exp: now.saturating_add(config.token_ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validates signature and expiry, returning the embedded claims.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    // Tokens are short-lived; no clock skew tolerance.
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// AuthUser
///
/// The resolved identity of an authenticated request. `role` comes from the
/// store at request time, so a demoted admin loses access immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    /// Rejects the request with 403 unless the actor holds the admin role.
    pub fn require_admin(&self, message: &str) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Client => Err(ApiError::Forbidden(message.to_string())),
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, a numeric `x-user-id` header naming an existing user.
/// 2. Otherwise a `Bearer` token, validated and resolved against the store.
///
/// Any failure rejects with 401 before the handler runs.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by `auth_middleware` for this request.
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.dev_bypass_enabled() {
            let bypass_id = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.parse::<i32>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = lookup(&repo, user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }
        // Production, or a bad bypass header: fall through to token validation.

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = decode_token(token, &config).map_err(|e| {
            tracing::debug!("rejected session token: {}", e);
            ApiError::Unauthenticated
        })?;

        // The user may have been deleted after the token was issued.
        let user = lookup(&repo, claims.sub)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

async fn lookup(repo: &RepositoryState, user_id: i32) -> Result<Option<User>, ApiError> {
    repo.get_user(user_id).await.map_err(|e| {
        tracing::error!("user lookup during authentication failed: {}", e);
        ApiError::server()
    })
}
