//! Access guard: who is calling, and may they do this?
//!
//! Authentication runs in two separate steps. The token is verified
//! statelessly first, then the principal it names is re-loaded and its active
//! flag re-checked, so a deactivation takes effect on the very next request.

use thiserror::Error;

use shopfront_core::{Role, UserId};

use super::auth::{AuthError, SessionMode, TokenService};
use crate::db::UserRepository;
use crate::models::User;

/// An authenticated caller, as loaded from the store on this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user: User,
    mode: SessionMode,
}

impl Principal {
    #[must_use]
    pub const fn new(user: User, mode: SessionMode) -> Self {
        Self { user, mode }
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub const fn id(&self) -> UserId {
        self.user.id
    }

    /// The role on the live record, not the one the token was issued with.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.user.role
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }

    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub const fn is_impersonating(&self) -> bool {
        self.mode.is_impersonating()
    }

    /// The admin behind an impersonation session.
    #[must_use]
    pub const fn original_principal_id(&self) -> Option<UserId> {
        self.mode.original_principal_id()
    }
}

/// The caller's role is not among those an operation allows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.allowed))]
pub struct RoleRequired {
    pub allowed: Vec<Role>,
    pub actual: Role,
}

fn describe(allowed: &[Role]) -> String {
    match allowed {
        [] => "this operation is not available to any role".to_owned(),
        [role] => format!("requires the {role} role"),
        roles => {
            let names: Vec<String> = roles.iter().map(ToString::to_string).collect();
            format!("requires one of the roles: {}", names.join(", "))
        }
    }
}

/// Check that `principal` holds one of `allowed`.
///
/// # Errors
///
/// Returns [`RoleRequired`] naming the roles that would have been accepted.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), RoleRequired> {
    if allowed.contains(&principal.role()) {
        Ok(())
    } else {
        Err(RoleRequired {
            allowed: allowed.to_vec(),
            actual: principal.role(),
        })
    }
}

/// Resolves bearer tokens to live principals.
pub struct AccessGuard<'a, U> {
    tokens: &'a TokenService,
    users: &'a U,
}

impl<'a, U: UserRepository> AccessGuard<'a, U> {
    #[must_use]
    pub const fn new(tokens: &'a TokenService, users: &'a U) -> Self {
        Self { tokens, users }
    }

    /// Turn a bearer token into the principal it authenticates.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] for which `is_unauthenticated()` holds when
    /// the token is missing, invalid or expired, or when its principal is
    /// gone or inactive. `AuthError::Repository` if the lookup itself fails.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<Principal, AuthError> {
        let token = bearer.ok_or(AuthError::MissingToken)?;
        let verified = self.tokens.verify(token)?;

        let user = self
            .users
            .get_user(verified.principal_id)
            .await?
            .ok_or(AuthError::UnknownPrincipal)?;

        if !user.is_active {
            return Err(AuthError::InactivePrincipal);
        }

        if user.role != verified.role {
            tracing::debug!(
                user_id = %user.id,
                token_role = %verified.role,
                current_role = %user.role,
                "role changed since token was issued, using current role"
            );
        }

        Ok(Principal::new(user, verified.mode))
    }
}
