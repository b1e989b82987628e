//! Typed client for the course-market HTTP API.
//!
//! Mirrors the contracts the static pages consume: one method per endpoint,
//! `{error}` bodies surfaced as `ClientError::Api`, and a `Session` that carries
//! the bearer token returned by login for the admin-only calls.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    error::ErrorBody,
    models::{
        Course, CourseRequest, LoginRequest, LoginResponse, MessageResponse, PurchaseRecord,
        PurchaseRequest, PurchaseResponse, RegisterRequest, RegisteredUser, Role,
        UpdateRoleRequest, User,
    },
};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    /// Network failure or an undecodable body.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Page a logged-in user is routed to, by role.
pub fn landing_page(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin-dashboard.html",
        Role::Client => "dashboard.html",
    }
}

/// Session
///
/// The identity returned by a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: LoginResponse,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    pub fn landing_page(&self) -> &'static str {
        landing_page(self.user.role)
    }
}

/// MarketplaceClient
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketplaceClient {
    /// `base_url` is the server origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authorized(&self, session: &Session, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(&session.user.token)
    }

    // --- Accounts ---

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<RegisteredUser> {
        let body = RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        send_json(self.request(Method::POST, "/api/register"), &body).await
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let body = LoginRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        };
        let user: LoginResponse = send_json(self.request(Method::POST, "/api/login"), &body).await?;
        Ok(Session { user })
    }

    pub async fn list_users(&self) -> ClientResult<Vec<User>> {
        send(self.request(Method::GET, "/api/users")).await
    }

    pub async fn update_user_role(
        &self,
        session: &Session,
        user_id: i32,
        role: Role,
    ) -> ClientResult<User> {
        let body = UpdateRoleRequest {
            role: Some(role.to_string()),
        };
        let path = format!("/api/users/{user_id}");
        send_json(self.authorized(session, Method::PUT, &path), &body).await
    }

    pub async fn delete_user(&self, session: &Session, user_id: i32) -> ClientResult<MessageResponse> {
        let path = format!("/api/users/{user_id}");
        send(self.authorized(session, Method::DELETE, &path)).await
    }

    // --- Courses ---

    pub async fn list_courses(&self) -> ClientResult<Vec<Course>> {
        send(self.request(Method::GET, "/api/courses")).await
    }

    pub async fn create_course(
        &self,
        session: &Session,
        title: &str,
        description: Option<&str>,
        price: f64,
    ) -> ClientResult<Course> {
        let body = course_body(session, title, description, price);
        send_json(self.authorized(session, Method::POST, "/api/courses"), &body).await
    }

    pub async fn update_course(
        &self,
        session: &Session,
        course_id: i32,
        title: &str,
        description: Option<&str>,
        price: f64,
    ) -> ClientResult<Course> {
        let body = course_body(session, title, description, price);
        let path = format!("/api/courses/{course_id}");
        send_json(self.authorized(session, Method::PUT, &path), &body).await
    }

    pub async fn delete_course(
        &self,
        session: &Session,
        course_id: i32,
    ) -> ClientResult<MessageResponse> {
        let path = format!("/api/courses/{course_id}");
        send(self.authorized(session, Method::DELETE, &path)).await
    }

    // --- Purchases ---

    pub async fn purchase(&self, user_id: i32, course_id: i32) -> ClientResult<PurchaseResponse> {
        let body = PurchaseRequest {
            user_id: Some(user_id),
            course_id: Some(course_id),
        };
        send_json(self.request(Method::POST, "/api/purchase"), &body).await
    }

    pub async fn list_purchases(&self) -> ClientResult<Vec<PurchaseRecord>> {
        send(self.request(Method::GET, "/api/all-purchases")).await
    }

    pub async fn list_user_courses(&self, user_id: i32) -> ClientResult<Vec<Course>> {
        send(self.request(Method::GET, &format!("/api/user-courses/{user_id}"))).await
    }
}

fn course_body(
    session: &Session,
    title: &str,
    description: Option<&str>,
    price: f64,
) -> CourseRequest {
    CourseRequest {
        title: Some(title.to_string()),
        description: description.map(str::to_string),
        price: Some(price),
        instructor_id: Some(session.user.id),
    }
}

async fn send_json<B, T>(request: RequestBuilder, body: &B) -> ClientResult<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    send(request.json(body)).await
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
    let response = request.send().await?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    // Non-JSON error bodies (e.g. from a proxy) still produce a readable message.
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(ClientError::Api { status, message })
}
