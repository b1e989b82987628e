use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, ApiJson, ApiPath, ErrorBody, RepositoryError},
    models::{
        Course, CourseDraft, CourseRequest, LoginRequest, LoginResponse, MessageResponse,
        NewUser, PurchaseRecord, PurchaseRequest, PurchaseResponse, RegisterRequest,
        RegisteredUser, Role, UpdateRoleRequest, User,
    },
    password,
};
use axum::{Json, extract::State, http::StatusCode};

/// Upper bound (exclusive) of what NUMERIC(10, 2) can hold.
const MAX_PRICE: f64 = 100_000_000.0;

// --- Input helpers ---

/// A required text field: absent and empty are the same thing.
fn required(field: Option<String>) -> Result<String, ApiError> {
    field
        .filter(|value| !value.is_empty())
        .ok_or_else(ApiError::missing_fields)
}

/// Builds the validated field set shared by course creation and update.
fn course_draft(payload: CourseRequest) -> Result<CourseDraft, ApiError> {
    let title = required(payload.title)?;
    if title.trim().is_empty() {
        return Err(ApiError::missing_fields());
    }
    let price = payload.price.ok_or_else(ApiError::missing_fields)?;
    // Checked after rounding to cents, the way the column stores it.
    let stored = (price * 100.0).round() / 100.0;
    if !price.is_finite() || price < 0.0 || stored >= MAX_PRICE {
        return Err(ApiError::Validation("Invalid price".to_string()));
    }

    Ok(CourseDraft {
        title,
        // An empty description is stored as NULL.
        description: payload.description.filter(|d| !d.is_empty()),
        price,
    })
}

/// The instructor is always the acting admin; a conflicting body value is refused.
fn check_instructor(actor: &AuthUser, claimed: Option<i32>) -> Result<(), ApiError> {
    match claimed {
        Some(id) if id != actor.id => Err(ApiError::Forbidden(
            "Courses can only be managed by their instructor".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Logs the internal detail of a store failure and collapses it to a generic 500.
fn server_error(context: &'static str) -> impl FnOnce(RepositoryError) -> ApiError {
    move |e| {
        tracing::error!("{} error: {}", context, e);
        ApiError::server()
    }
}

// --- Handlers ---

/// register_user
///
/// [Public Route] Creates a `client` account. The password is hashed before it
/// touches the store and never echoed back.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisteredUser),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), ApiError> {
    let username = required(payload.username)?;
    let email = required(payload.email)?;
    let password = required(payload.password)?;

    let conflict = || ApiError::Conflict("Username or email already in use".to_string());

    if state
        .repo
        .username_or_email_taken(&username, &email)
        .await
        .map_err(server_error("Registration"))?
    {
        return Err(conflict());
    }

    let password_hash = password::hash_blocking(password, state.config.salt_rounds)
        .await
        .map_err(|e| {
            tracing::error!("Registration error: {}", e);
            ApiError::server()
        })?;

    let new_user = NewUser {
        username,
        email,
        password_hash,
        role: Role::Client,
    };

    match state.repo.create_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "user registered");
            Ok((StatusCode::CREATED, Json(RegisteredUser::from(user))))
        }
        // Lost a race with a concurrent registration of the same name or email.
        Err(RepositoryError::UniqueViolation(_)) => Err(conflict()),
        Err(e) => Err(server_error("Registration")(e)),
    }
}

/// login
///
/// [Public Route] Verifies credentials and issues a session token.
/// Unknown user and wrong password produce the same 401 body.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = required(payload.username)?;
    let password = required(payload.password)?;

    let credentials = state
        .repo
        .find_credentials(&username)
        .await
        .map_err(server_error("Login"))?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password::verify_blocking(password, credentials.password_hash.clone()).await {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(credentials.id, credentials.role, &state.config).map_err(|e| {
        tracing::error!("Login error: could not sign token: {}", e);
        ApiError::server()
    })?;

    tracing::info!(user_id = credentials.id, "user logged in");
    Ok(Json(LoginResponse {
        id: credentials.id,
        username: credentials.username,
        email: credentials.email,
        role: credentials.role,
        token,
    }))
}

/// create_course
///
/// [Admin Route] Creates a course owned by the acting admin.
#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CourseRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn create_course(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CourseRequest>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    actor.require_admin("Only admins can create courses")?;
    check_instructor(&actor, payload.instructor_id)?;
    let draft = course_draft(payload)?;

    let course = state
        .repo
        .create_course(draft, actor.id)
        .await
        .map_err(server_error("Course creation"))?;

    tracing::info!(course_id = course.id, instructor_id = actor.id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

/// list_courses
///
/// [Public Route] Every course, newest first.
#[utoipa::path(
    get,
    path = "/api/courses",
    responses((status = 200, description = "Courses", body = [Course]))
)]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = state
        .repo
        .list_courses()
        .await
        .map_err(server_error("Fetch courses"))?;
    Ok(Json(courses))
}

/// update_course
///
/// [Admin Route] Replaces title, description and price.
///
/// *Authorization*: the ownership check is part of the repository query, so a
/// non-owning admin receives the same 404 as for a missing course.
#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(("id" = i32, Path, description = "Course ID")),
    request_body = CourseRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not found or not owned", body = ErrorBody)
    )
)]
pub async fn update_course(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CourseRequest>,
) -> Result<Json<Course>, ApiError> {
    actor.require_admin("Only admins can edit courses")?;
    check_instructor(&actor, payload.instructor_id)?;
    let draft = course_draft(payload)?;

    state
        .repo
        .update_course(id, actor.id, draft)
        .await
        .map_err(server_error("Update course"))?
        .map(Json)
        .ok_or_else(course_not_found)
}

/// delete_course
///
/// [Admin Route] Removes a course and, in the same transaction, its purchases.
#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(("id" = i32, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not found or not owned", body = ErrorBody)
    )
)]
pub async fn delete_course(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    actor.require_admin("Only admins can delete courses")?;

    if state
        .repo
        .delete_course(id, actor.id)
        .await
        .map_err(server_error("Delete course"))?
    {
        tracing::info!(course_id = id, "course deleted");
        Ok(Json(MessageResponse::new("Course deleted")))
    } else {
        Err(course_not_found())
    }
}

fn course_not_found() -> ApiError {
    ApiError::NotFound("Course not found or not owned by this instructor".to_string())
}

/// list_users
///
/// [Public Route] Every user, newest first. The password hash is not part of `User`.
#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .repo
        .list_users()
        .await
        .map_err(server_error("Fetch users"))?;
    Ok(Json(users))
}

/// update_user_role
///
/// [Admin Route] Promotes or demotes a user.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid role", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn update_user_role(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> Result<Json<User>, ApiError> {
    actor.require_admin("Only admins can change roles")?;

    let role: Role = payload
        .role
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::Validation("Invalid role".to_string()))?;

    let user = state
        .repo
        .update_user_role(id, role)
        .await
        .map_err(server_error("Update user role"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = id, role = %role, actor_id = actor.id, "user role changed");
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Removes a user together with their purchases. Instructors must
/// delete their courses first.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "User still instructs courses", body = ErrorBody)
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    actor.require_admin("Only admins can delete users")?;

    match state.repo.delete_user(id).await {
        Ok(true) => {
            tracing::info!(user_id = id, actor_id = actor.id, "user deleted");
            Ok(Json(MessageResponse::new("User deleted")))
        }
        Ok(false) => Err(ApiError::NotFound("User not found".to_string())),
        Err(RepositoryError::ForeignKeyViolation(_)) => {
            Err(ApiError::Conflict("User still owns courses".to_string()))
        }
        Err(e) => Err(server_error("Delete user")(e)),
    }
}

/// list_purchases
///
/// [Public Route] All purchases joined with buyer name and course title/price.
#[utoipa::path(
    get,
    path = "/api/all-purchases",
    responses((status = 200, description = "Purchases", body = [PurchaseRecord]))
)]
pub async fn list_purchases(
    State(state): State<AppState>,
) -> Result<Json<Vec<PurchaseRecord>>, ApiError> {
    let purchases = state
        .repo
        .list_purchases()
        .await
        .map_err(server_error("Fetch purchases"))?;
    Ok(Json(purchases))
}

/// list_user_courses
///
/// [Public Route] Courses bought by one user, most recent purchase first.
#[utoipa::path(
    get,
    path = "/api/user-courses/{user_id}",
    params(("user_id" = i32, Path, description = "User ID")),
    responses((status = 200, description = "Purchased courses", body = [Course]))
)]
pub async fn list_user_courses(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = state
        .repo
        .list_user_courses(user_id)
        .await
        .map_err(server_error("Fetch user courses"))?;
    Ok(Json(courses))
}

/// purchase_course
///
/// [Public Route] Records that a user bought a course.
///
/// A repeated purchase trips the (user, course) unique constraint. It is
/// reported with the same generic 500 as any other store failure.
#[utoipa::path(
    post,
    path = "/api/purchase",
    request_body = PurchaseRequest,
    responses(
        (status = 201, description = "Purchased", body = PurchaseResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 500, description = "Store failure or duplicate purchase", body = ErrorBody)
    )
)]
pub async fn purchase_course(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let (Some(user_id), Some(course_id)) = (payload.user_id, payload.course_id) else {
        return Err(ApiError::missing_fields());
    };

    match state.repo.create_purchase(user_id, course_id).await {
        Ok(purchase) => Ok((
            StatusCode::CREATED,
            Json(PurchaseResponse {
                message: "Course purchased successfully".to_string(),
                purchase,
            }),
        )),
        Err(e) => {
            tracing::error!(user_id, course_id, "Purchase error: {}", e);
            Err(ApiError::Server(
                "Server error or course already purchased".to_string(),
            ))
        }
    }
}
