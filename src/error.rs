use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Postgres SQLSTATE for a violated unique constraint.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for a row still referenced by (or referencing a missing) foreign key.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// Postgres SQLSTATE raised by `ALTER TABLE ... ADD COLUMN` on an existing column.
pub const DUPLICATE_COLUMN: &str = "42701";

/// ApiError
///
/// The request-level failure taxonomy. Every variant renders as a JSON object with
/// a single `error` string; internal detail never reaches the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Server(String),
}

impl ApiError {
    pub fn missing_fields() -> Self {
        Self::Validation("Missing fields".to_string())
    }

    /// Generic 500 used whenever the store fails for a reason we do not classify.
    pub fn server() -> Self {
        Self::Server("Server error".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// RepositoryError
///
/// Persistence failures, classified just enough for handlers to pick a status.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Classifies a raw driver error by its SQLSTATE.
    pub fn classify(err: sqlx::Error) -> Self {
        let constraint = || match &err {
            sqlx::Error::Database(db) => db.constraint().unwrap_or_default().to_string(),
            _ => String::new(),
        };
        match sql_state(&err).as_deref() {
            Some(UNIQUE_VIOLATION) => Self::UniqueViolation(constraint()),
            Some(FOREIGN_KEY_VIOLATION) => Self::ForeignKeyViolation(constraint()),
            _ => Self::Database(err),
        }
    }
}

/// Returns the Postgres SQLSTATE code carried by a driver error, if any.
pub fn sql_state(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// ApiJson
///
/// `Json` extractor whose rejection is an `ApiError::Validation`, so malformed
/// bodies get the same `{error}` shape as every other failure. A literal `null`
/// body carries no fields and is rejected as `Missing fields`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Option<T>>::from_request(req, state).await {
            Ok(Json(Some(value))) => Ok(Self(value)),
            Ok(Json(None)) => Err(ApiError::missing_fields()),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection.body_text(), "rejected request body");
    match rejection {
        // An absent or non-JSON body means none of the required fields arrived.
        JsonRejection::MissingJsonContentType(_) => ApiError::missing_fields(),
        _ => ApiError::Validation("Malformed request body".to_string()),
    }
}

/// ApiPath
///
/// `Path` extractor mapping unparsable identifiers to a 400 JSON error.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Path::<T>::from_request_parts(parts, state)
            .await
            .map(|axum::extract::Path(value)| Self(value))
            .map_err(|rejection: PathRejection| {
                tracing::debug!(error = %rejection.body_text(), "rejected path parameter");
                ApiError::Validation("Invalid identifier".to_string())
            })
    }
}
