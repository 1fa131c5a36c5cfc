//! Signed bearer tokens.
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`
//! with claims `{ user: { id, isAdmin }, iat, exp }`. Only this one header is
//! ever issued or accepted.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use cartwheel_core::{UserId, UserRole};

use crate::models::CurrentUser;

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Why a token was rejected.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// The `user` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaim {
    pub id: UserId,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: UserClaim,
    /// Issued at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user.id,
            role: if self.user.is_admin {
                UserRole::Admin
            } else {
                UserRole::Customer
            },
        }
    }
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Issue a token for `user` valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn issue(&self, user: UserId, role: UserRole) -> Result<String, TokenError> {
        self.issue_at(user, role, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn issue_at(&self, user: UserId, role: UserRole, now: i64) -> Result<String, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user: UserClaim {
                id: user,
                is_admin: role.is_admin(),
            },
            iat: now,
            exp: now.saturating_add(ttl),
        };
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER_JSON),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`], [`TokenError::BadSignature`] or
    /// [`TokenError::Expired`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Same as [`TokenSigner::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::Malformed)?;
        if header_json != HEADER_JSON.as_bytes() {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        // Constant-time comparison
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn signer() -> TokenSigner {
        TokenSigner::new(
            SecretString::from("k3Y!v9#Qz2@Lm8$Rt5%Wx1^Bn7&Hc4*Pd6"),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let token = signer()
            .issue_at(UserId::new(7), UserRole::Admin, NOW)
            .unwrap();
        let claims = signer().verify_at(&token, NOW + 10).unwrap();

        assert_eq!(claims.user.id, UserId::new(7));
        assert!(claims.user.is_admin);
        assert_eq!(claims.exp, NOW + 3600);
        assert!(claims.current_user().is_admin());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = signer()
            .issue_at(UserId::new(7), UserRole::Customer, NOW)
            .unwrap();
        let err = signer().verify_at(&token, NOW + 3600).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = signer()
            .issue_at(UserId::new(7), UserRole::Customer, NOW)
            .unwrap();
        let other = TokenSigner::new(
            SecretString::from("a-different-signing-key-of-some-length"),
            Duration::from_secs(3600),
        );
        let err = other.verify_at(&token, NOW).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let token = signer()
            .issue_at(UserId::new(7), UserRole::Customer, NOW)
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"user":{{"id":7,"isAdmin":true}},"iat":{NOW},"exp":{}}}"#,
            NOW + 3600
        ));
        let forged = format!("{}.{forged_claims}.{}", parts[0], parts[2]);

        let err = signer().verify_at(&forged, NOW).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            let err = signer().verify_at(token, NOW).unwrap_err();
            assert!(matches!(err, TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn test_claims_wire_shape() {
        let claims = Claims {
            user: UserClaim {
                id: UserId::new(3),
                is_admin: false,
            },
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(claims).unwrap();
        assert_eq!(json["user"]["isAdmin"], false);
        assert_eq!(json["user"]["id"], 3);
    }
}
