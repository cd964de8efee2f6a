//! Authorization guards: role tiers, ownership, and the guard chain.
//!
//! Role comparison goes through an immutable [`RoleTable`] built at
//! startup; there is no process-wide mutable state. Call sites compose
//! the independent checks (role, ownership, capability) per endpoint,
//! either directly or through a [`GuardChain`].

use std::collections::HashMap;

use uuid::Uuid;

use tradepost_types::{Result, Role, TradepostError, UserId};

use crate::context::AuthContext;

// ---------------------------------------------------------------------------
// Role tiers
// ---------------------------------------------------------------------------

/// Immutable role-to-tier mapping, injected at startup.
#[derive(Debug, Clone)]
pub struct RoleTable {
    tiers: HashMap<Role, u8>,
}

impl RoleTable {
    /// The standard marketplace hierarchy:
    /// user=1, buyer=2, seller=2, subadmin=3, admin=4.
    #[must_use]
    pub fn standard() -> Self {
        let tiers = [
            (Role::User, 1),
            (Role::Buyer, 2),
            (Role::Seller, 2),
            (Role::Subadmin, 3),
            (Role::Admin, 4),
        ]
        .into_iter()
        .collect();
        Self { tiers }
    }

    /// Build a custom mapping. Roles missing from `tiers` fall back to
    /// their built-in tier.
    #[must_use]
    pub fn with_tiers(tiers: HashMap<Role, u8>) -> Self {
        Self { tiers }
    }

    #[must_use]
    pub fn tier(&self, role: Role) -> u8 {
        self.tiers.get(&role).copied().unwrap_or_else(|| role.tier())
    }

    /// Pass if the caller's tier is at least the *minimum* tier among the
    /// allowed roles.
    ///
    /// # Errors
    /// `MissingCredential` for anonymous callers, `Forbidden` for an
    /// insufficient tier.
    pub fn authorize(&self, ctx: &AuthContext, allowed: &[Role]) -> Result<()> {
        ctx.require_auth()?;

        let Some(required) = allowed.iter().map(|r| self.tier(*r)).min() else {
            return Err(TradepostError::Forbidden {
                reason: "no roles permitted for this operation".to_string(),
            });
        };

        let caller = self.tier(ctx.role);
        if caller >= required {
            Ok(())
        } else {
            Err(TradepostError::Forbidden {
                reason: format!(
                    "role {} (tier {caller}) below required tier {required}",
                    ctx.role
                ),
            })
        }
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Parse a caller-supplied id before any lookup.
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| TradepostError::MalformedId(raw.to_string()))
}

/// Pass if the caller owns the resource or is an admin.
pub fn check_ownership(
    ctx: &AuthContext,
    resource_id: impl ToString,
    owner_id: UserId,
) -> Result<()> {
    ctx.require_auth()?;
    if ctx.is_admin() || ctx.user_id == owner_id {
        Ok(())
    } else {
        Err(TradepostError::OwnershipDenied {
            failed_ids: vec![resource_id.to_string()],
        })
    }
}

/// Batch ownership check. Checks **every** pair and reports the full set
/// of ids the caller does not own; never fails fast on the first one.
pub fn check_ownership_batch(
    ctx: &AuthContext,
    resources: &[(String, UserId)],
) -> Result<()> {
    ctx.require_auth()?;
    if ctx.is_admin() {
        return Ok(());
    }

    let failed_ids: Vec<String> = resources
        .iter()
        .filter(|(_, owner)| *owner != ctx.user_id)
        .map(|(id, _)| id.clone())
        .collect();

    if failed_ids.is_empty() {
        Ok(())
    } else {
        Err(TradepostError::OwnershipDenied { failed_ids })
    }
}

// ---------------------------------------------------------------------------
// Guard chain
// ---------------------------------------------------------------------------

/// A composable guard: takes the context, passes it through or fails.
pub type GuardFn = Box<dyn Fn(AuthContext) -> Result<AuthContext> + Send + Sync>;

/// An ordered list of guards executed in sequence by the request
/// dispatcher (authenticate, authorize, ownership, handler). Keeps guard
/// composition testable in isolation from any transport.
#[derive(Default)]
pub struct GuardChain {
    guards: Vec<GuardFn>,
}

impl GuardChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a guard to the chain.
    #[must_use]
    pub fn then(mut self, guard: GuardFn) -> Self {
        self.guards.push(guard);
        self
    }

    /// Run every guard in order. The first failure aborts the chain.
    pub fn run(&self, ctx: AuthContext) -> Result<AuthContext> {
        let mut ctx = ctx;
        for guard in &self.guards {
            ctx = guard(ctx)?;
        }
        Ok(ctx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// Guard: the caller must be authenticated.
#[must_use]
pub fn authenticated() -> GuardFn {
    Box::new(|ctx| {
        ctx.require_auth()?;
        Ok(ctx)
    })
}

/// Guard: the caller's tier must satisfy [`RoleTable::authorize`].
#[must_use]
pub fn role_at_least(table: RoleTable, allowed: Vec<Role>) -> GuardFn {
    Box::new(move |ctx| {
        table.authorize(&ctx, &allowed)?;
        Ok(ctx)
    })
}
