//! Authentication service.
//!
//! Provides password registration and login, and issues the session tokens
//! the access guard later verifies.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use token::{IssuedToken, SessionMode, TokenService, VerifiedToken};

use shopfront_core::{Email, Role};

use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, User};
use crate::services::guard::Principal;
use password::{hash_password, reject_unknown_account, validate_password, verify_password};

const MAX_NAME_LENGTH: usize = 100;

/// Input for public registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// A principal together with a token authenticating it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: IssuedToken,
    pub user: User,
}

/// Authentication service.
///
/// Handles registration, login and password changes.
pub struct AuthService<'a, U> {
    users: &'a U,
    tokens: &'a TokenService,
}

impl<'a, U: UserRepository> AuthService<'a, U> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a U, tokens: &'a TokenService) -> Self {
        Self { users, tokens }
    }

    /// Register a new customer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidField` or
    /// `AuthError::WeakPassword` for bad input, and
    /// `AuthError::UserAlreadyExists` if the email is taken (in any case).
    pub async fn register(&self, input: Registration) -> Result<Session, AuthError> {
        let email = Email::parse(&input.email)?;
        let first_name = validate_name("first name", &input.first_name)?;
        let last_name = validate_name("last name", &input.last_name)?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let user = self
            .users
            .create_user(NewUser {
                first_name,
                last_name,
                email,
                password_hash,
                role: Role::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "customer registered");
        self.session_for(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::InactivePrincipal` if the account is deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = self.users.find_credentials(&email).await? else {
            return Err(reject_unknown_account(password));
        };

        verify_password(password, &password_hash)?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "login refused for inactive principal");
            return Err(AuthError::InactivePrincipal);
        }

        tracing::debug!(user_id = %user.id, role = %user.role, "login succeeded");
        self.session_for(user)
    }

    /// Change the caller's own password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ImpersonationRestricted` for impersonation
    /// sessions, `AuthError::InvalidCredentials` if `current` is wrong and
    /// `AuthError::WeakPassword` if `new` is unacceptable.
    pub async fn change_password(
        &self,
        principal: &Principal,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        if principal.is_impersonating() {
            return Err(AuthError::ImpersonationRestricted);
        }

        let stored = self
            .users
            .get_password_hash(principal.id())
            .await?
            .ok_or(AuthError::UnknownPrincipal)?;
        verify_password(current, &stored)?;
        validate_password(new)?;

        self.users
            .update_password_hash(principal.id(), hash_password(new)?)
            .await?;

        tracing::info!(user_id = %principal.id(), "password changed");
        Ok(())
    }

    /// Issue an ordinary token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn session_for(&self, user: User) -> Result<Session, AuthError> {
        let token = self.tokens.issue(user.id, user.role, SessionMode::Normal)?;
        Ok(Session { token, user })
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<String, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidField {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidField {
            field,
            reason: format!("must be at most {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::TokenConfig;
    use crate::db::MemoryStore;

    fn tokens() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: SecretString::from("kR7#vQ2!pZ9@mW4$tY6^bN1&cX8*hJ3%"),
            issuer: "shopfront-test".to_string(),
            ttl_secs: 3600,
        })
    }

    fn registration(email: &str) -> Registration {
        Registration {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: email.to_string(),
            password: "cobol-forever".to_string(),
        }
    }

    #[tokio::test]
    async fn register_creates_active_customer() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);

        let session = auth.register(registration("grace@navy.mil")).await.unwrap();

        assert_eq!(session.user.role, Role::Customer);
        assert!(session.user.is_active);
        let verified = tokens.verify(&session.token.token).unwrap();
        assert_eq!(verified.principal_id, session.user.id);
    }

    #[tokio::test]
    async fn duplicate_email_differing_in_case_is_rejected() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);

        auth.register(registration("grace@navy.mil")).await.unwrap();
        let err = auth
            .register(registration("Grace@Navy.mil"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn login_is_case_insensitive_and_checks_password() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);
        auth.register(registration("grace@navy.mil")).await.unwrap();

        assert!(auth.login("GRACE@navy.mil", "cobol-forever").await.is_ok());
        assert!(matches!(
            auth.login("grace@navy.mil", "fortran-forever").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@navy.mil", "cobol-forever").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_principal_cannot_login() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);
        let session = auth.register(registration("grace@navy.mil")).await.unwrap();
        store.set_user_active(session.user.id, false).await.unwrap();

        let err = auth
            .login("grace@navy.mil", "cobol-forever")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InactivePrincipal));
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn change_password_requires_current_secret() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);
        let session = auth.register(registration("grace@navy.mil")).await.unwrap();
        let principal = Principal::new(session.user, SessionMode::Normal);

        assert!(matches!(
            auth.change_password(&principal, "wrong-password", "new-password-1")
                .await,
            Err(AuthError::InvalidCredentials)
        ));
        auth.change_password(&principal, "cobol-forever", "new-password-1")
            .await
            .unwrap();
        assert!(auth.login("grace@navy.mil", "new-password-1").await.is_ok());
    }

    #[tokio::test]
    async fn impersonation_session_cannot_change_password() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let auth = AuthService::new(&store, &tokens);
        let session = auth.register(registration("grace@navy.mil")).await.unwrap();
        let principal = Principal::new(
            session.user,
            SessionMode::Impersonating {
                original_principal_id: shopfront_core::UserId::generate(),
            },
        );

        assert!(matches!(
            auth.change_password(&principal, "cobol-forever", "new-password-1")
                .await,
            Err(AuthError::ImpersonationRestricted)
        ));
    }
}
