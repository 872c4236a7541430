//! Admin user management commands.
//!
//! Public registration only ever creates customers, so the first admin has to
//! be created here.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user
//! SHOPFRONT_ADMIN_PASSWORD='...' shop-cli admin create -e admin@example.com -f Ada -l Lovelace
//!
//! # Promote an existing customer
//! shop-cli admin promote -e ada@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SHOPFRONT_ADMIN_PASSWORD` - initial password for `admin create`

use shopfront_core::{Email, Role, UserId};
use shopfront_server::db::{RepositoryError, UserRepository};
use shopfront_server::models::NewUser;
use shopfront_server::services::auth::{
    AuthError,
    password::{hash_password, validate_password},
};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Empty first or last name.
    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    /// Password rejected or could not be hashed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// No principal with that email.
    #[error("No user with email: {0}")]
    UserNotFound(String),

    /// Repository error.
    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AdminError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(what) => Self::UserExists(what),
            other => Self::Repository(other),
        }
    }
}

fn parse_email(email: &str) -> Result<Email, AdminError> {
    Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))
}

fn required(value: &str, field: &'static str) -> Result<String, AdminError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AdminError::EmptyName(field));
    }
    Ok(value.to_owned())
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created admin user.
///
/// # Errors
///
/// Returns `AdminError` for invalid input, a missing password, an email that is
/// already registered, or database failures.
pub async fn create_user(
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<UserId, AdminError> {
    let email = parse_email(email)?;
    let first_name = required(first_name, "first name")?;
    let last_name = required(last_name, "last name")?;

    dotenvy::dotenv().ok();
    let password = std::env::var("SHOPFRONT_ADMIN_PASSWORD")
        .map_err(|_| AdminError::MissingEnvVar("SHOPFRONT_ADMIN_PASSWORD"))?;
    validate_password(&password)?;
    let password_hash = hash_password(&password)?;

    let store = connect().await?;

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AdminError::UserExists(email.into_inner()));
    }

    tracing::info!("Creating admin user: {}", email);
    let user = store
        .create_user(NewUser {
            first_name,
            last_name,
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Promote an existing principal to admin.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no principal has that email.
pub async fn promote(email: &str) -> Result<UserId, AdminError> {
    let email = parse_email(email)?;
    let store = connect().await?;

    let Some(user) = store.find_user_by_email(&email).await? else {
        return Err(AdminError::UserNotFound(email.into_inner()));
    };
    if user.role == Role::Admin {
        tracing::warn!("{} is already an admin", user.email);
        return Ok(user.id);
    }

    let user = store.set_user_role(user.id, Role::Admin).await?;
    tracing::info!("Promoted {} (ID: {}) to admin", user.email, user.id);
    Ok(user.id)
}
