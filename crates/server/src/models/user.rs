//! Principal (user) domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{Email, Role, UserId};

/// A registered principal: customer or admin.
///
/// The password hash is deliberately absent; it only ever leaves the
/// repository through [`crate::db::UserRepository::find_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a principal. The hash is already computed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
}

/// Back-office filter for the principal listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of the email address.
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    /// Whether `user` passes this filter.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        let email_ok = self.email.as_deref().is_none_or(|needle| {
            user.email
                .normalized()
                .contains(&needle.to_lowercase())
        });
        let role_ok = self.role.is_none_or(|role| user.role == role);
        email_ok && role_ok
    }
}
