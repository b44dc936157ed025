//! Identity passed explicitly to the API client
//!
//! The access token is read once at startup; the current user comes from the
//! token's claims. Signatures are checked by the backend, not here.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access token is empty")]
    MissingToken,
    #[error("access token has expired")]
    Expired,
    #[error("access token is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    name: String,
    email: String,
    role: String,
    exp: u64,
    #[serde(default)]
    iat: Option<u64>,
}

#[derive(Clone)]
pub struct AuthContext {
    access_token: String,
    user: AuthUser,
}

impl AuthContext {
    pub fn from_token(token: &str) -> Result<Self, AuthError> {
        let token = token.trim().trim_matches('"');
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed(e.to_string()),
            },
        )?;

        let claims = data.claims;
        Ok(Self {
            access_token: token.to_string(),
            user: AuthUser {
                id: claims.id,
                name: claims.name,
                email: claims.email,
                role: claims.role,
            },
        })
    }

    pub fn bearer_token(&self) -> &str {
        &self.access_token
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}
