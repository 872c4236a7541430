//! Admin-impersonates-customer sessions.
//!
//! A session is either `Normal` or `Impersonating`; there is exactly one
//! level. Beginning issues a customer token carrying the admin's id in its
//! `act` claim and leaves the admin's own token untouched. Exiting rebuilds
//! the admin's session from that id, or fails: it never hands back a
//! customer-scoped or otherwise degraded session.

use thiserror::Error;

use shopfront_core::{Role, UserId};

use super::auth::{AuthError, Session, SessionMode, TokenService};
use super::guard::{Principal, RoleRequired, authorize};
use crate::db::{RepositoryError, UserRepository};

/// Errors from beginning or ending an impersonation session.
#[derive(Debug, Error)]
pub enum ImpersonationError {
    /// Only admins may impersonate.
    #[error(transparent)]
    Forbidden(#[from] RoleRequired),

    /// An impersonation session cannot start another one.
    #[error("already impersonating a customer; exit first")]
    AlreadyImpersonating,

    #[error("customer not found")]
    TargetNotFound,

    /// Admins can only impersonate customers.
    #[error("only customers can be impersonated (target is {0})")]
    TargetNotCustomer(Role),

    #[error("customer account is inactive")]
    TargetInactive,

    #[error("not currently impersonating")]
    NotImpersonating,

    /// The admin who started the session has since been deleted.
    #[error("original admin account no longer exists")]
    OriginalNotFound,

    /// The admin who started the session was demoted or deactivated.
    #[error("original account is no longer an active admin")]
    OriginalNotAdmin,

    #[error(transparent)]
    Token(#[from] AuthError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Starts and ends impersonation sessions.
pub struct ImpersonationManager<'a, U> {
    tokens: &'a TokenService,
    users: &'a U,
}

impl<'a, U: UserRepository> ImpersonationManager<'a, U> {
    #[must_use]
    pub const fn new(tokens: &'a TokenService, users: &'a U) -> Self {
        Self { tokens, users }
    }

    /// Issue a session acting as customer `target_id` on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `caller` is an admin
    /// - `TargetNotFound` if no principal has that id
    /// - `TargetNotCustomer` / `TargetInactive` if the target is an admin or deactivated
    pub async fn begin(
        &self,
        caller: &Principal,
        target_id: UserId,
    ) -> Result<Session, ImpersonationError> {
        authorize(caller, &[Role::Admin])?;
        // Unreachable for a live admin record, but the marker must never nest.
        if caller.is_impersonating() {
            return Err(ImpersonationError::AlreadyImpersonating);
        }

        let target = self
            .users
            .get_user(target_id)
            .await?
            .ok_or(ImpersonationError::TargetNotFound)?;

        if target.role != Role::Customer {
            return Err(ImpersonationError::TargetNotCustomer(target.role));
        }
        if !target.is_active {
            return Err(ImpersonationError::TargetInactive);
        }

        let token = self.tokens.issue(
            target.id,
            Role::Customer,
            SessionMode::Impersonating {
                original_principal_id: caller.id(),
            },
        )?;

        tracing::info!(
            admin_id = %caller.id(),
            customer_id = %target.id,
            "impersonation started"
        );

        Ok(Session {
            token,
            user: target,
        })
    }

    /// Return to the admin session that `caller`'s impersonation came from.
    ///
    /// # Errors
    ///
    /// - `NotImpersonating` for an ordinary session
    /// - `OriginalNotFound` if the admin has been deleted meanwhile
    /// - `OriginalNotAdmin` if the admin was demoted or deactivated meanwhile
    pub async fn exit(&self, caller: &Principal) -> Result<Session, ImpersonationError> {
        let original_id = caller
            .original_principal_id()
            .ok_or(ImpersonationError::NotImpersonating)?;

        let original = self
            .users
            .get_user(original_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    admin_id = %original_id,
                    customer_id = %caller.id(),
                    "impersonation exit refused: original admin no longer exists"
                );
                ImpersonationError::OriginalNotFound
            })?;

        if original.role != Role::Admin || !original.is_active {
            tracing::warn!(
                admin_id = %original.id,
                customer_id = %caller.id(),
                role = %original.role,
                is_active = original.is_active,
                "impersonation exit refused: original is no longer an active admin"
            );
            return Err(ImpersonationError::OriginalNotAdmin);
        }

        let token = self
            .tokens
            .issue(original.id, Role::Admin, SessionMode::Normal)?;

        tracing::info!(
            admin_id = %original.id,
            customer_id = %caller.id(),
            "impersonation ended"
        );

        Ok(Session {
            token,
            user: original,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::TokenConfig;
    use crate::db::MemoryStore;
    use crate::models::{NewUser, User};
    use crate::services::guard::AccessGuard;

    fn tokens() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: SecretString::from("kR7#vQ2!pZ9@mW4$tY6^bN1&cX8*hJ3%"),
            issuer: "shopfront-test".to_string(),
            ttl_secs: 3600,
        })
    }

    async fn user(store: &MemoryStore, email: &str, role: Role) -> User {
        store
            .create_user(NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: shopfront_core::Email::parse(email).unwrap(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .unwrap()
    }

    async fn resolve(tokens: &TokenService, store: &MemoryStore, session: &Session) -> Principal {
        AccessGuard::new(tokens, store)
            .authenticate(Some(&session.token.token))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn round_trip_restores_the_admin() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let admin = user(&store, "admin@shop.test", Role::Admin).await;
        let customer = user(&store, "cust@shop.test", Role::Customer).await;
        let manager = ImpersonationManager::new(&tokens, &store);

        let admin_principal = Principal::new(admin.clone(), SessionMode::Normal);
        let derived = manager.begin(&admin_principal, customer.id).await.unwrap();

        let as_customer = resolve(&tokens, &store, &derived).await;
        assert_eq!(as_customer.id(), customer.id);
        assert_eq!(as_customer.role(), Role::Customer);
        assert_eq!(as_customer.original_principal_id(), Some(admin.id));

        let restored = manager.exit(&as_customer).await.unwrap();
        let back = resolve(&tokens, &store, &restored).await;
        assert_eq!(back.id(), admin.id);
        assert_eq!(back.role(), Role::Admin);
        assert!(!back.is_impersonating());
    }

    #[tokio::test]
    async fn customers_cannot_impersonate() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let c1 = user(&store, "c1@shop.test", Role::Customer).await;
        let c2 = user(&store, "c2@shop.test", Role::Customer).await;
        let manager = ImpersonationManager::new(&tokens, &store);

        let err = manager
            .begin(&Principal::new(c1, SessionMode::Normal), c2.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ImpersonationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admins_cannot_be_impersonated() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let a1 = user(&store, "a1@shop.test", Role::Admin).await;
        let a2 = user(&store, "a2@shop.test", Role::Admin).await;
        let manager = ImpersonationManager::new(&tokens, &store);
        let caller = Principal::new(a1.clone(), SessionMode::Normal);

        assert!(matches!(
            manager.begin(&caller, a2.id).await,
            Err(ImpersonationError::TargetNotCustomer(Role::Admin))
        ));
        assert!(matches!(
            manager.begin(&caller, a1.id).await,
            Err(ImpersonationError::TargetNotCustomer(Role::Admin))
        ));
        assert!(matches!(
            manager.begin(&caller, UserId::generate()).await,
            Err(ImpersonationError::TargetNotFound)
        ));
    }

    #[tokio::test]
    async fn exit_requires_an_impersonation_session() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let admin = user(&store, "admin@shop.test", Role::Admin).await;
        let manager = ImpersonationManager::new(&tokens, &store);

        assert!(matches!(
            manager
                .exit(&Principal::new(admin, SessionMode::Normal))
                .await,
            Err(ImpersonationError::NotImpersonating)
        ));
    }

    #[tokio::test]
    async fn exit_fails_closed_when_admin_is_demoted() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let admin = user(&store, "admin@shop.test", Role::Admin).await;
        let customer = user(&store, "cust@shop.test", Role::Customer).await;
        let manager = ImpersonationManager::new(&tokens, &store);

        let derived = manager
            .begin(&Principal::new(admin.clone(), SessionMode::Normal), customer.id)
            .await
            .unwrap();
        let as_customer = resolve(&tokens, &store, &derived).await;

        store.set_user_role(admin.id, Role::Customer).await.unwrap();
        assert!(matches!(
            manager.exit(&as_customer).await,
            Err(ImpersonationError::OriginalNotAdmin)
        ));
    }

    #[tokio::test]
    async fn exit_fails_closed_when_admin_is_deactivated_or_deleted() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let admin = user(&store, "admin@shop.test", Role::Admin).await;
        let customer = user(&store, "cust@shop.test", Role::Customer).await;
        let manager = ImpersonationManager::new(&tokens, &store);

        let derived = manager
            .begin(&Principal::new(admin.clone(), SessionMode::Normal), customer.id)
            .await
            .unwrap();
        let as_customer = resolve(&tokens, &store, &derived).await;

        store.set_user_active(admin.id, false).await.unwrap();
        assert!(matches!(
            manager.exit(&as_customer).await,
            Err(ImpersonationError::OriginalNotAdmin)
        ));

        store.delete_user(admin.id).await.unwrap();
        assert!(matches!(
            manager.exit(&as_customer).await,
            Err(ImpersonationError::OriginalNotFound)
        ));
    }
}
