//! Token decoding and role checks.
//!
//! Callers authenticate with an HS256 JWT issued by the library backend. The
//! token carries the caller's email and numeric role. [`require_role`] is the one
//! place a token is turned into an [`Identity`]; every protected endpoint goes
//! through it with the roles it admits.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Library roles as numbered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Admin = 1,
    Librarian = 2,
    Reader = 3,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Librarian, Role::Reader];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Role {
    type Error = AuthError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Admin),
            2 => Ok(Role::Librarian),
            3 => Ok(Role::Reader),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role.as_u8()
    }
}

impl FromStr for Role {
    type Err = AuthError;

    /// Accepts the role number (`"2"`) or its name (`"librarian"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Role::try_from(n);
        }
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "reader" => Ok(Role::Reader),
            _ => Err(AuthError::UnknownRole(s.to_owned())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Librarian => "librarian",
            Role::Reader => "reader",
        };
        f.write_str(name)
    }
}

/// JWT payload.
///
/// `role` stays a raw number until the signature and expiry have been checked, so a
/// well-signed token with a role this service does not know is refused as forbidden.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub email: String,
    pub role: u8,
    /// Expiry as seconds since the Unix epoch
    pub exp: u64,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("Role {0} is not permitted to perform this action")]
    Forbidden(u8),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("token secret cannot be empty")]
    EmptySecret,
    #[error("token lifetime is out of range")]
    LifetimeOutOfRange,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// True for failures that mean "who are you?" rather than "not allowed".
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::MissingToken | AuthError::InvalidToken(_))
    }
}

/// HS256 keys derived from the shared secret, resolved once at startup.
#[derive(Clone)]
pub struct TokenKeys {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Builds keys from the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptySecret`] if `secret` is empty or whitespace.
    pub fn from_secret(secret: &str) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    /// Verifies the signature and expiry of `token` and returns its claims.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }

    /// Signs a token for `identity` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::LifetimeOutOfRange`] if `now + ttl` cannot be represented.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(AuthError::LifetimeOutOfRange)?;
        self.sign(&Claims {
            email: identity.email.clone(),
            role: identity.role.as_u8(),
            exp: expires_at.timestamp().max(0) as u64,
        })
    }

    /// Signs `claims` as they are.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(AuthError::Signing)
    }
}

/// Authenticates `token` and checks that its role is in `allowed`.
///
/// # Errors
///
/// - [`AuthError::MissingToken`] when no (or an empty) token was supplied
/// - [`AuthError::InvalidToken`] when the signature or expiry does not verify
/// - [`AuthError::Forbidden`] when the role is unknown or not in `allowed`
pub fn require_role(
    token: Option<&str>,
    allowed: &[Role],
    keys: &TokenKeys,
) -> Result<Identity, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let claims = keys.decode(token).inspect_err(|e| {
        tracing::debug!(error = %e, "rejected token");
    })?;

    let role = Role::try_from(claims.role)
        .ok()
        .filter(|role| allowed.contains(role))
        .ok_or(AuthError::Forbidden(claims.role))?;

    Ok(Identity::new(claims.email, role))
}
