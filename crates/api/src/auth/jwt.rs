//! Bearer token issuance and verification.
//!
//! Tokens are HS256-signed JWTs carrying a [`Claims`] payload. A token's own
//! expiry is short (default 15 minutes); whether it may still be refreshed is
//! decided by the session marker in the store, which lives much longer
//! (default 7 days). The two lifetimes are configured independently.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use qrlink_core::types::UserId;
use qrlink_core::user::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::positive_env;

/// JWT claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The user's id.
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub email: String,
    /// The user's role name (e.g. `"admin"`, `"user"`).
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4). Makes every minted token distinct,
    /// even two minted for the same user within the same second.
    pub jti: String,
}

/// Why a token was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// Signature is valid but the `exp` claim has passed.
    #[error("token expired")]
    Expired,

    /// Bad signature, malformed token, or unreadable claims.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Signing failed.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

/// Configuration for token generation and the session marker window.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Session marker lifetime in days (default: 7).
    pub session_ttl_days: u64,
}

/// Default token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default session marker lifetime in days.
const DEFAULT_SESSION_TTL_DAYS: u64 = 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    /// | `SESSION_TTL_DAYS`       | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty, or if either lifetime
    /// is not a positive number.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 =
            positive_env("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS);
        let session_ttl_days: u64 = positive_env("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS);

        Self {
            secret,
            access_token_expiry_mins,
            session_ttl_days,
        }
    }

    /// Token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }

    /// Session marker lifetime in seconds.
    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_days * 24 * 3600
    }
}

/// Stateless token minting and verification.
///
/// Holds the derived signing keys; it never stores tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl_secs: config.access_ttl_secs(),
        }
    }

    /// Token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Mint a token for `user` with the default lifetime.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_with_ttl(user, self.access_ttl_secs)
    }

    /// Mint a token for `user` expiring `ttl_secs` from now.
    pub fn issue_with_ttl(&self, user: &User, ttl_secs: i64) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp: now + ttl_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate signature and expiry, returning the embedded [`Claims`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Read the claims without checking signature or expiry.
    ///
    /// Only for logout and the refresh fallback, where authorization comes
    /// from the session marker rather than from the token itself.
    pub fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Helper to build a test config with a known secret.
    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
            session_ttl_days: 7,
        }
    }

    fn test_user() -> User {
        User {
            id: "u1".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: "admin".to_string(),
            password_hash: String::new(),
            public_key: None,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new(&test_config());
        let token = issuer.issue(&test_user()).expect("token issue should succeed");

        let claims = issuer.verify(&token).expect("token should verify");
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_tokens_for_same_user_are_distinct() {
        let issuer = TokenIssuer::new(&test_config());
        let a = issuer.issue(&test_user()).unwrap();
        let b = issuer.issue(&test_user()).unwrap();
        assert_ne!(a, b, "jti must make every token unique");
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let issuer = TokenIssuer::new(&test_config());

        // Well beyond the default 60-second leeway.
        let token = issuer.issue_with_ttl(&test_user(), -300).unwrap();

        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_different_secrets_fail() {
        let issuer_a = TokenIssuer::new(&JwtConfig {
            secret: "secret-alpha".to_string(),
            ..test_config()
        });
        let issuer_b = TokenIssuer::new(&JwtConfig {
            secret: "secret-bravo".to_string(),
            ..test_config()
        });

        let token = issuer_a.issue(&test_user()).unwrap();

        assert_matches!(issuer_b.verify(&token), Err(TokenError::Invalid(_)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let issuer = TokenIssuer::new(&test_config());
        assert_matches!(issuer.verify("not-a-jwt"), Err(TokenError::Invalid(_)));
        assert_matches!(
            TokenIssuer::decode_unverified("not-a-jwt"),
            Err(TokenError::Invalid(_))
        );
    }

    #[test]
    fn test_decode_unverified_reads_expired_and_foreign_tokens() {
        let foreign = TokenIssuer::new(&JwtConfig {
            secret: "someone-else".to_string(),
            ..test_config()
        });
        let token = foreign.issue_with_ttl(&test_user(), -3600).unwrap();

        let claims = TokenIssuer::decode_unverified(&token).expect("decode should succeed");
        assert_eq!(claims.user_id, "u1");
        assert!(claims.exp < chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_claims_use_user_id_wire_name() {
        let issuer = TokenIssuer::new(&test_config());
        let token = issuer.issue(&test_user()).unwrap();

        let claims = TokenIssuer::decode_unverified(&token).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["userId"], "u1");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_session_ttl_is_seven_days_by_default() {
        assert_eq!(test_config().session_ttl_secs(), 604_800);
        assert_eq!(test_config().access_ttl_secs(), 900);
    }
}
