use crate::{
    error::RepositoryError,
    models::{Course, CourseDraft, NewUser, Purchase, PurchaseRecord, Role, User, UserCredentials},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract used by every handler. Implementations surface
/// failures as `RepositoryError` and leave status mapping to the handler layer.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn username_or_email_taken(&self, username: &str, email: &str) -> RepoResult<bool>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: i32) -> RepoResult<Option<User>>;
    // Login lookup: the only query that reads the password hash.
    async fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn update_user_role(&self, id: i32, role: Role) -> RepoResult<Option<User>>;
    /// Deletes the user's purchases and the user atomically; false if absent,
    /// `ForeignKeyViolation` if the user still instructs a course.
    async fn delete_user(&self, id: i32) -> RepoResult<bool>;

    // --- Courses ---
    async fn create_course(&self, draft: CourseDraft, instructor_id: i32) -> RepoResult<Course>;
    async fn list_courses(&self) -> RepoResult<Vec<Course>>;
    /// Owner-only: matches on both course id and instructor id.
    async fn update_course(
        &self,
        id: i32,
        instructor_id: i32,
        draft: CourseDraft,
    ) -> RepoResult<Option<Course>>;
    /// Owner-only, atomic with the purchase cleanup; false if the pair does not exist.
    async fn delete_course(&self, id: i32, instructor_id: i32) -> RepoResult<bool>;

    // --- Purchases ---
    async fn create_purchase(&self, user_id: i32, course_id: i32) -> RepoResult<Purchase>;
    async fn list_purchases(&self) -> RepoResult<Vec<PurchaseRecord>>;
    async fn list_user_courses(&self, user_id: i32) -> RepoResult<Vec<Course>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, email, role, created_at";

// NUMERIC is read back through FLOAT8 so it decodes into `f64`.
const COURSE_COLUMNS: &str =
    "id, title, description, price::FLOAT8 AS price, instructor_id, created_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by a pooled PostgreSQL connection.
/// Each call checks a connection out of the pool and returns it on every exit path.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// username_or_email_taken
    ///
    /// Case-sensitive exact match on either unique column.
    async fn username_or_email_taken(&self, username: &str, email: &str) -> RepoResult<bool> {
        let existing: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = $1 OR email = $2 LIMIT 1")
                .bind(username)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(existing.is_some())
    }

    /// create_user
    ///
    /// A concurrent registration can still lose the race on the unique indexes;
    /// that surfaces as `RepositoryError::UniqueViolation`.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::classify)
    }

    async fn get_user(&self, id: i32) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        Ok(sqlx::query_as::<_, UserCredentials>(
            "SELECT id, username, email, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_user_role(&self, id: i32, role: Role) -> RepoResult<Option<User>> {
        let query = format!("UPDATE users SET role = $1 WHERE id = $2 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(role.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_user
    ///
    /// Purchases first, then the user row, inside one transaction. A missing user
    /// rolls the purchase cleanup back as well. An instructor who still owns
    /// courses trips `courses.instructor_id` and the whole delete is undone.
    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM purchases WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        // Dropping `tx` on the error path rolls the purchase cleanup back.
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::classify)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn create_course(&self, draft: CourseDraft, instructor_id: i32) -> RepoResult<Course> {
        let query = format!(
            "INSERT INTO courses (title, description, price, instructor_id) \
             VALUES ($1, $2, CAST($3 AS NUMERIC(10, 2)), $4) RETURNING {COURSE_COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.price)
            .bind(instructor_id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::classify)
    }

    /// list_courses
    ///
    /// Newest first; id breaks ties between rows created in the same instant.
    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        let query =
            format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, Course>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    /// update_course
    ///
    /// The ownership check lives in the WHERE clause: a non-owning admin matches
    /// zero rows and gets `None`, indistinguishable from a missing course.
    async fn update_course(
        &self,
        id: i32,
        instructor_id: i32,
        draft: CourseDraft,
    ) -> RepoResult<Option<Course>> {
        let query = format!(
            "UPDATE courses SET title = $1, description = $2, price = CAST($3 AS NUMERIC(10, 2)) \
             WHERE id = $4 AND instructor_id = $5 RETURNING {COURSE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Course>(&query)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.price)
            .bind(id)
            .bind(instructor_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_course
    ///
    /// Purchases of the course are removed before the course itself, both in one
    /// transaction. If the (course, owner) pair does not exist nothing is changed.
    async fn delete_course(&self, id: i32, instructor_id: i32) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM purchases WHERE course_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM courses WHERE id = $1 AND instructor_id = $2")
            .bind(id)
            .bind(instructor_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn create_purchase(&self, user_id: i32, course_id: i32) -> RepoResult<Purchase> {
        sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases (user_id, course_id) VALUES ($1, $2) \
             RETURNING id, user_id, course_id, purchased_at",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::classify)
    }

    /// list_purchases
    ///
    /// Joins purchases with their buyer and course for the admin overview.
    async fn list_purchases(&self) -> RepoResult<Vec<PurchaseRecord>> {
        Ok(sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT p.id, p.purchased_at, u.username, c.title AS course_title, c.price::FLOAT8 AS price
            FROM purchases p
            INNER JOIN users u ON p.user_id = u.id
            INNER JOIN courses c ON p.course_id = c.id
            ORDER BY p.purchased_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// list_user_courses
    ///
    /// Courses the user has bought, most recent purchase first.
    async fn list_user_courses(&self, user_id: i32) -> RepoResult<Vec<Course>> {
        Ok(sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.title, c.description, c.price::FLOAT8 AS price, c.instructor_id, c.created_at
            FROM courses c
            INNER JOIN purchases p ON c.id = p.course_id
            WHERE p.user_id = $1
            ORDER BY p.purchased_at DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
