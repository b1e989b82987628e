use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Mutating endpoints for courses and users. `create_router` wraps this router
/// in the authentication layer; each handler then checks the stored role of the
/// caller and, for courses, ownership.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/courses
        // Creates a course owned by the caller.
        .route("/api/courses", post(handlers::create_course))
        // PUT/DELETE /api/courses/{id}
        // Owner-only edits; delete also removes the course's purchases.
        .route(
            "/api/courses/{id}",
            put(handlers::update_course).delete(handlers::delete_course),
        )
        // PUT/DELETE /api/users/{id}
        // Role changes and account removal (with the user's purchases).
        .route(
            "/api/users/{id}",
            put(handlers::update_user_role).delete(handlers::delete_user),
        )
}
