//! Token verification and claims extraction.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use wiremesh_core::ClientId;

use crate::error::{AuthError, Result};

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    /// Subject: the client id.
    sub: String,
    /// Expiration timestamp (seconds since epoch).
    exp: u64,
}

/// Verifies HS256 bearer tokens against the fleet-shared secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let validation = Validation::new(Algorithm::HS256);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a token and extract the authenticated client id from its
    /// `sub` claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is expired, carries a bad signature,
    /// names no subject, or is otherwise malformed.
    pub fn verify(&self, token: &str) -> Result<ClientId> {
        let data =
            decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::InvalidToken(err.to_string()),
                }
            })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::MissingClaim("sub".to_string()));
        }

        Ok(ClientId::from(data.claims.sub))
    }
}

/// Issue a token for `client_id`, valid for `ttl_seconds`. Test helper.
///
/// # Errors
///
/// Returns an error if signing fails.
#[cfg(any(test, feature = "test-utils"))]
pub fn issue_token(secret: &[u8], client_id: &str, ttl_seconds: u64) -> Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let claims = AccessClaims {
        sub: client_id.to_string(),
        exp: now + ttl_seconds,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|err| AuthError::InvalidToken(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn verify_valid_token() {
        let token = issue_token(SECRET, "client-7", 3600).unwrap();
        let verifier = TokenVerifier::new(SECRET);

        let client_id = verifier.verify(&token).unwrap();
        assert_eq!(client_id.as_str(), "client-7");
    }

    #[test]
    fn reject_wrong_secret() {
        let token = issue_token(b"other-secret", "client-7", 3600).unwrap();
        let verifier = TokenVerifier::new(SECRET);

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn reject_garbage() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn reject_empty_subject() {
        let token = issue_token(SECRET, "", 3600).unwrap();
        let verifier = TokenVerifier::new(SECRET);

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(AuthError::MissingClaim(_))));
    }
}
