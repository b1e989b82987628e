//! Startup bootstrap: idempotent schema creation and admin seeding.

use sqlx::PgPool;

use crate::{
    config::{AdminSeed, AppConfig},
    error::{DUPLICATE_COLUMN, UNIQUE_VIOLATION, sql_state},
    models::Role,
    password,
};

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username TEXT UNIQUE NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT DEFAULT 'client' CHECK (role IN ('admin', 'client')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

// Databases created before roles existed lack the column; 42701 means it is already there.
const ADD_ROLE_COLUMN: &str = r#"
    ALTER TABLE users ADD COLUMN role TEXT DEFAULT 'client' CHECK (role IN ('admin', 'client'))
"#;

const CREATE_COURSES: &str = r#"
    CREATE TABLE IF NOT EXISTS courses (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        price NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
        instructor_id INTEGER NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_PURCHASES: &str = r#"
    CREATE TABLE IF NOT EXISTS purchases (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        course_id INTEGER NOT NULL REFERENCES courses(id),
        purchased_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (user_id, course_id)
    )
"#;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("schema statement failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not hash admin password: {0}")]
    Credential(#[from] password::CredentialError),
}

/// Outcome of `seed_admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyExists,
}

/// ensure_schema
///
/// Creates the three tables if missing. Safe to run on every start: existing
/// tables and rows are left untouched.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), BootstrapError> {
    sqlx::query(CREATE_USERS).execute(pool).await?;

    match sqlx::query(ADD_ROLE_COLUMN).execute(pool).await {
        Ok(_) => tracing::info!("added role column to users"),
        Err(e) if sql_state(&e).as_deref() == Some(DUPLICATE_COLUMN) => {
            tracing::debug!("users.role already present");
        }
        Err(e) => return Err(e.into()),
    }

    sqlx::query(CREATE_COURSES).execute(pool).await?;
    sqlx::query(CREATE_PURCHASES).execute(pool).await?;

    tracing::info!("database schema ready");
    Ok(())
}

/// seed_admin
///
/// Inserts the configured admin account with role `admin`. An existing row with
/// the same username or email counts as success.
pub async fn seed_admin(
    pool: &PgPool,
    seed: &AdminSeed,
    password: &str,
    cost: u32,
) -> Result<SeedOutcome, BootstrapError> {
    let hash = password::hash_blocking(password.to_string(), cost).await?;

    let result = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4)",
    )
    .bind(&seed.username)
    .bind(&seed.email)
    .bind(&hash)
    .bind(Role::Admin.as_str())
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(username = %seed.username, "admin account created");
            Ok(SeedOutcome::Created)
        }
        Err(e) if sql_state(&e).as_deref() == Some(UNIQUE_VIOLATION) => {
            tracing::info!(username = %seed.username, "admin account already exists");
            Ok(SeedOutcome::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// bootstrap
///
/// Schema first, then the admin seed when a password is configured.
pub async fn bootstrap(pool: &PgPool, config: &AppConfig) -> Result<(), BootstrapError> {
    ensure_schema(pool).await?;

    match &config.admin.password {
        Some(password) => {
            seed_admin(pool, &config.admin, password, config.salt_rounds).await?;
        }
        None => tracing::debug!("ADMIN_PASSWORD not set; skipping admin seed"),
    }
    Ok(())
}
