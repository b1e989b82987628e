use course_market::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    schema,
};
use sqlx::postgres::PgPoolOptions;
use std::{process::ExitCode, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, prepares the database and serves HTTP.
/// Any startup failure is logged and turned into a non-zero exit code; request-level
/// failures never stop the process.
#[tokio::main]
async fn main() -> ExitCode {
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the config, so report this one directly.
            eprintln!("FATAL: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.env);
    tracing::info!("Application starting in {:?} mode", config.env);
    if config.dev_bypass_enabled() {
        tracing::warn!(
            "x-user-id header authentication is enabled; set APP_ENV=production to disable it"
        );
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("FATAL: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Pretty output locally, JSON for log aggregation in production.
fn init_tracing(env: &Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "course_market=debug,tower_http=info".into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.db_url)
        .await
        .map_err(|e| format!("failed to connect to Postgres, check DATABASE_URL: {e}"))?;

    // The schema must exist before the first request is accepted.
    schema::bootstrap(&pool, &config).await?;

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;
    let addr = format!("0.0.0.0:{}", config.port);

    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
