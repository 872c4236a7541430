//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs and are never stored server-side. An impersonation
//! session is marked with the RFC 8693 `act` (actor) claim, whose `sub` is the
//! admin who started it.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopfront_core::{Role, UserId};

use super::AuthError;
use crate::config::TokenConfig;

/// The `act` claim: who is really behind an impersonation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorClaim {
    pub sub: UserId,
}

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal the token authenticates.
    pub sub: UserId,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
    /// Present only on impersonation sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<ActorClaim>,
}

/// Whether a session acts for someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Normal,
    /// An admin acting as the token's subject.
    Impersonating { original_principal_id: UserId },
}

impl SessionMode {
    #[must_use]
    pub const fn is_impersonating(self) -> bool {
        matches!(self, Self::Impersonating { .. })
    }

    #[must_use]
    pub const fn original_principal_id(self) -> Option<UserId> {
        match self {
            Self::Normal => None,
            Self::Impersonating {
                original_principal_id,
            } => Some(original_principal_id),
        }
    }
}

/// A token whose signature, issuer and expiry have been checked.
///
/// The principal it names has not been loaded yet; that is the access guard's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub principal_id: UserId,
    pub role: Role,
    pub mode: SessionMode,
    pub expires_at: DateTime<Utc>,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        // Expiry is exact: a token is dead the second after `exp`.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            ttl: i64::try_from(config.ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `principal_id` valid from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(
        &self,
        principal_id: UserId,
        role: Role,
        mode: SessionMode,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(principal_id, role, mode, Utc::now())
    }

    /// Issue a token as if it had been signed at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue_at(
        &self,
        principal_id: UserId,
        role: Role,
        mode: SessionMode,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::TokenEncoding("token lifetime out of range".to_owned()))?;
        let claims = SessionClaims {
            sub: principal_id,
            role,
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            act: mode
                .original_principal_id()
                .map(|sub| ActorClaim { sub }),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenEncoding(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, issuer and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExpiredToken` once `exp` has passed and
    /// `AuthError::InvalidToken` for anything else that fails to verify.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let claims = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("exp out of range".to_owned()))?;

        let mode = match claims.act {
            None => SessionMode::Normal,
            Some(actor) if actor.sub == claims.sub => {
                return Err(AuthError::InvalidToken(
                    "actor and subject are the same principal".to_owned(),
                ));
            }
            Some(actor) => SessionMode::Impersonating {
                original_principal_id: actor.sub,
            },
        };

        Ok(VerifiedToken {
            principal_id: claims.sub,
            role: claims.role,
            mode,
            expires_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(secret: &str) -> TokenConfig {
        TokenConfig {
            secret: SecretString::from(secret),
            issuer: "shopfront-test".to_string(),
            ttl_secs: 3600,
        }
    }

    fn service() -> TokenService {
        TokenService::new(&config("kR7#vQ2!pZ9@mW4$tY6^bN1&cX8*hJ3%"))
    }

    #[test]
    fn normal_token_roundtrip() {
        let tokens = service();
        let id = UserId::generate();

        let issued = tokens.issue(id, Role::Admin, SessionMode::Normal).unwrap();
        let verified = tokens.verify(&issued.token).unwrap();

        assert_eq!(verified.principal_id, id);
        assert_eq!(verified.role, Role::Admin);
        assert_eq!(verified.mode, SessionMode::Normal);
        assert_eq!(verified.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn impersonation_marker_roundtrip() {
        let tokens = service();
        let admin = UserId::generate();
        let customer = UserId::generate();

        let issued = tokens
            .issue(
                customer,
                Role::Customer,
                SessionMode::Impersonating {
                    original_principal_id: admin,
                },
            )
            .unwrap();
        let verified = tokens.verify(&issued.token).unwrap();

        assert_eq!(verified.principal_id, customer);
        assert_eq!(verified.mode.original_principal_id(), Some(admin));
    }

    #[test]
    fn expiry_is_one_ttl_after_issue() {
        let tokens = service();
        let issued_at = Utc::now();
        let issued = tokens
            .issue_at(UserId::generate(), Role::Customer, SessionMode::Normal, issued_at)
            .unwrap();
        assert_eq!(
            issued.expires_at.timestamp() - issued_at.timestamp(),
            3600
        );
    }

    #[test]
    fn expired_token_is_rejected_despite_valid_signature() {
        let tokens = service();
        let issued = tokens
            .issue_at(
                UserId::generate(),
                Role::Customer,
                SessionMode::Normal,
                Utc::now() - Duration::seconds(3601),
            )
            .unwrap();

        assert!(matches!(
            tokens.verify(&issued.token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = service();
        let theirs = TokenService::new(&config("Lm8&uE5!sD2#gF7$aQ1@wR9^zT4*yU6%"));
        let issued = theirs
            .issue(UserId::generate(), Role::Admin, SessionMode::Normal)
            .unwrap();

        assert!(matches!(
            ours.verify(&issued.token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let ours = service();
        let mut other = config("kR7#vQ2!pZ9@mW4$tY6^bN1&cX8*hJ3%");
        other.issuer = "someone-else".to_string();
        let issued = TokenService::new(&other)
            .issue(UserId::generate(), Role::Admin, SessionMode::Normal)
            .unwrap();

        assert!(matches!(
            ours.verify(&issued.token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            service().verify("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn jti_is_unique() {
        let tokens = service();
        let id = UserId::generate();
        let t1 = tokens.issue(id, Role::Customer, SessionMode::Normal).unwrap();
        let t2 = tokens.issue(id, Role::Customer, SessionMode::Normal).unwrap();
        assert_ne!(t1.token, t2.token);
    }
}
