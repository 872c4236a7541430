//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use shopfront_server::db::{self, PgStore};

/// Errors shared by every command that needs the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read `SHOPFRONT_DATABASE_URL`, falling back to `DATABASE_URL` (after
/// loading `.env`), the same lookup the server does.
///
/// # Errors
///
/// Returns `ConnectError::MissingEnvVar` if neither is set.
pub fn database_url() -> Result<SecretString, ConnectError> {
    dotenvy::dotenv().ok();
    std::env::var("SHOPFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar("SHOPFRONT_DATABASE_URL"))
}

/// Connect to the configured database.
///
/// # Errors
///
/// Returns `ConnectError` if the URL is missing or unreachable.
pub async fn connect() -> Result<PgStore, ConnectError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
