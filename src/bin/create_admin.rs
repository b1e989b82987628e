//! One-shot tool: ensure the schema exists and seed the admin account.
//!
//! Reads the same environment as the server. When `ADMIN_PASSWORD` is unset
//! the development default `admin123` is used and a warning is logged.

use course_market::{
    config::AppConfig,
    schema::{self, SeedOutcome},
};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_market=info,create_admin=info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await?;

    schema::ensure_schema(&pool).await?;

    let password = match &config.admin.password {
        Some(password) => password.clone(),
        None => {
            tracing::warn!("ADMIN_PASSWORD not set; using the development default. Change it in production.");
            DEFAULT_ADMIN_PASSWORD.to_string()
        }
    };

    match schema::seed_admin(&pool, &config.admin, &password, config.salt_rounds).await? {
        SeedOutcome::Created => tracing::info!(
            username = %config.admin.username,
            email = %config.admin.email,
            "admin created"
        ),
        SeedOutcome::AlreadyExists => tracing::info!("admin user already exists"),
    }

    pool.close().await;
    Ok(())
}
