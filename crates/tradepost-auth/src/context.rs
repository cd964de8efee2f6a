//! The resolved caller context.
//!
//! An [`AuthContext`] is the explicit, typed value threaded through the
//! guard chain and into the domain engines. Nothing downstream ever
//! inspects the raw credential; everything works off this struct.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tradepost_types::{Actor, Result, Role, TradepostError, UserId};

/// The authenticated (or anonymous) caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    authenticated: bool,
}

impl AuthContext {
    /// Build an authenticated context from verified credential claims.
    #[must_use]
    pub fn authenticated(
        user_id: UserId,
        role: Role,
        email: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            role,
            email: email.into(),
            issued_at,
            expires_at,
            authenticated: true,
        }
    }

    /// The anonymous context, used by endpoints that behave differently
    /// for unauthenticated callers instead of rejecting them.
    #[must_use]
    pub fn anonymous() -> Self {
        let now = Utc::now();
        Self {
            user_id: UserId(Uuid::nil()),
            role: Role::User,
            email: String::new(),
            issued_at: now,
            expires_at: now,
            authenticated: false,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Fail with `MissingCredential` unless authenticated.
    pub fn require_auth(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(TradepostError::MissingCredential)
        }
    }

    /// The actor identity engines validate transitions against.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.authenticated && self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_not_authenticated() {
        let ctx = AuthContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(!ctx.is_admin());
        assert!(ctx.require_auth().is_err());
    }

    #[test]
    fn authenticated_context() {
        let now = Utc::now();
        let id = UserId::new();
        let ctx = AuthContext::authenticated(
            id,
            Role::Seller,
            "s@example.com",
            now,
            now + chrono::Duration::hours(24),
        );
        assert!(ctx.is_authenticated());
        assert!(ctx.require_auth().is_ok());
        assert_eq!(ctx.actor().id, id);
        assert_eq!(ctx.actor().role, Role::Seller);
    }

    #[test]
    fn admin_check_requires_authentication() {
        let now = Utc::now();
        let ctx = AuthContext::authenticated(UserId::new(), Role::Admin, "a@x.com", now, now);
        assert!(ctx.is_admin());
    }
}
