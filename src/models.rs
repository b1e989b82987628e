use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field stored in `users.role`. Persisted as lowercase text and
/// constrained by a CHECK on the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User
///
/// Public projection of a `users` row. The password hash is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal row used only by the login flow; not serializable on purpose.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// NewUser
///
/// Insert payload for the `users` table, already carrying the hashed password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Course
///
/// A `courses` row. `price` is stored as NUMERIC(10, 2) and read back as a float.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    // FK to users.id (the owning instructor).
    pub instructor_id: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CourseDraft
///
/// Validated field set shared by course creation and update.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
}

/// Purchase
///
/// A `purchases` row. Unique per (user_id, course_id).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Purchase {
    pub id: i32,
    pub user_id: i32,
    pub course_id: i32,
    #[ts(type = "string")]
    pub purchased_at: DateTime<Utc>,
}

/// PurchaseRecord
///
/// Admin-facing purchase listing, the result of joining purchases with users and courses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct PurchaseRecord {
    pub id: i32,
    #[ts(type = "string")]
    pub purchased_at: DateTime<Utc>,
    pub username: String,
    pub course_title: String,
    pub price: f64,
}

// --- Request Payloads (Input Schemas) ---
//
// Every field is optional at the serde level so that a missing field surfaces as
// a 400 `Missing fields` from the handler rather than a deserializer rejection.

/// RegisterRequest
///
/// Input payload for POST /api/register.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// LoginRequest
///
/// Input payload for POST /api/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// CourseRequest
///
/// Input payload for POST /api/courses and PUT /api/courses/{id}.
/// `instructor_id` is optional: the instructor is the authenticated actor, and
/// a supplied value must agree with it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<i32>,
}

/// UpdateRoleRequest
///
/// Input payload for PUT /api/users/{id}. The role arrives as free text and is
/// validated against the enumeration by the handler.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

/// PurchaseRequest
///
/// Input payload for POST /api/purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PurchaseRequest {
    pub user_id: Option<i32>,
    pub course_id: Option<i32>,
}

// --- Response Payloads (Output Schemas) ---

/// RegisteredUser
///
/// Registration summary: identity and timestamp, never the hash or role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct RegisteredUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for RegisteredUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// LoginResponse
///
/// Identity, role and the signed session token to send as `Authorization: Bearer`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// PurchaseResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PurchaseResponse {
    pub message: String,
    pub purchase: Purchase,
}
