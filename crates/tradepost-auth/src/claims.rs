//! Signed bearer credential resolution.
//!
//! The resolver verifies an HS256 bearer token (signature, issuer,
//! audience, expiry) against a configured secret and produces an
//! [`AuthContext`]. An optional mode yields the anonymous context on any
//! failure instead of failing the request.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tradepost_types::{Result, Role, TradepostError, UserId};

use crate::context::AuthContext;

/// Default credential lifetime in hours.
const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Claims carried by a TradePost bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the account id.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Coarse authorization tier.
    pub role: Role,
    /// Account email, for display and receipts.
    pub email: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
}

impl Claims {
    /// Returns the account id from the subject claim.
    pub fn user_id(&self) -> Result<UserId> {
        Uuid::parse_str(&self.sub)
            .map(UserId)
            .map_err(|_| TradepostError::InvalidCredential {
                reason: format!("subject '{}' is not a valid account id", self.sub),
            })
    }
}

/// Verifies bearer credentials and mints them for tests and the issuer
/// service. Holds the shared HS256 secret; `Debug` redacts it.
#[derive(Clone)]
pub struct TokenResolver {
    secret: Vec<u8>,
    issuer: String,
    audience: Option<String>,
    default_expiry: Duration,
}

impl TokenResolver {
    /// Create a resolver with an HS256 secret.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new_hs256(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < 32 {
            return Err(TradepostError::InvalidCredential {
                reason: "secret must be at least 32 bytes for HS256".to_string(),
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
            issuer: issuer.into(),
            audience: None,
            default_expiry: Duration::hours(DEFAULT_EXPIRY_HOURS),
        })
    }

    /// Require a specific audience during validation.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Override the default credential lifetime.
    #[must_use]
    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a credential for an account.
    pub fn issue(&self, user_id: UserId, role: Role, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            role,
            email: email.to_string(),
            exp: (now + self.default_expiry).timestamp(),
            iat: now.timestamp(),
        };
        self.issue_claims(&claims)
    }

    /// Issue a credential from explicit claims (expired tokens for tests,
    /// custom lifetimes for the issuer service).
    pub fn issue_claims(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TradepostError::Internal(format!("credential encoding failed: {e}")))
    }

    /// Verify a bearer token and resolve the caller context.
    ///
    /// # Errors
    /// - `MissingCredential` / `CredentialExpired` when absent or stale
    /// - `InvalidCredential` when malformed or the signature, issuer, or
    ///   audience do not match
    pub fn resolve(&self, token: &str) -> Result<AuthContext> {
        if token.is_empty() {
            return Err(TradepostError::MissingCredential);
        }

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &self.validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    TradepostError::CredentialExpired
                }
                _ => TradepostError::InvalidCredential {
                    reason: e.to_string(),
                },
            })?
            .claims;

        let user_id = claims.user_id()?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).unwrap_or_else(Utc::now);
        let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        Ok(AuthContext::authenticated(
            user_id,
            claims.role,
            claims.email,
            issued_at,
            expires_at,
        ))
    }

    /// Optional mode: anonymous context on any failure instead of an error.
    #[must_use]
    pub fn resolve_optional(&self, token: Option<&str>) -> AuthContext {
        match token {
            Some(token) => self.resolve(token).unwrap_or_else(|err| {
                tracing::debug!(%err, "optional credential failed, continuing anonymous");
                AuthContext::anonymous()
            }),
            None => AuthContext::anonymous(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        if let Some(ref aud) = self.audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }
        validation
    }
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("default_expiry", &self.default_expiry)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Extracts a bearer token from an HTTP Authorization header.
///
/// Expected format: `Bearer <token>`
pub fn extract_bearer(header: &str) -> Result<&str> {
    let header = header.trim();
    if header.is_empty() {
        return Err(TradepostError::MissingCredential);
    }
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| TradepostError::InvalidCredential {
            reason: "expected 'Bearer <token>' authorization header".to_string(),
        })
}
