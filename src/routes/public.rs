use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: account creation, login, catalogue and
/// purchase reads, and the purchase action itself.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe; answers without touching the database.
        .route("/health", get(|| async { "ok" }))
        // POST /api/register
        // New accounts always start with the `client` role.
        .route("/api/register", post(handlers::register_user))
        // POST /api/login
        // Returns identity, role and the bearer token for admin calls.
        .route("/api/login", post(handlers::login))
        // GET /api/courses
        // Full catalogue, newest first.
        .route("/api/courses", get(handlers::list_courses))
        // GET /api/users
        // User directory without password hashes.
        .route("/api/users", get(handlers::list_users))
        // GET /api/all-purchases
        // Purchases joined with buyer and course.
        .route("/api/all-purchases", get(handlers::list_purchases))
        // GET /api/user-courses/{user_id}
        // Courses bought by one user.
        .route("/api/user-courses/{user_id}", get(handlers::list_user_courses))
        // POST /api/purchase
        // One purchase per (user, course); repeats fail.
        .route("/api/purchase", post(handlers::purchase_course))
}
