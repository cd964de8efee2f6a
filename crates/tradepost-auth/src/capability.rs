//! Two-tier capability checks.
//!
//! The credential's role is trusted when it already implies the needed
//! capability; only when it is the coarse `user` tier (or otherwise
//! ambiguous for the capability) does the check load the account and
//! re-derive capability from `user_type` and feature flags. This trades
//! staleness for one avoided lookup per request: a deactivated account
//! keeps its embedded capability until the token expires.

use tradepost_types::{Account, IdentityStore, Result, TradepostError};

use crate::context::AuthContext;

/// Require seller capability.
///
/// Trusts a `seller`/`subadmin`/`admin` token outright; for anything
/// else, falls back to the identity store and re-derives the capability
/// from `user_type`, failing `Forbidden` when the account is deactivated.
pub fn require_seller(ctx: &AuthContext, store: &dyn IdentityStore) -> Result<()> {
    ctx.require_auth()?;
    if ctx.role.implies_seller() {
        return Ok(());
    }
    let account = load_active_account(ctx, store)?;
    if account.user_type.can_sell() {
        Ok(())
    } else {
        Err(TradepostError::Forbidden {
            reason: format!("seller capability required, account is {}", account.user_type),
        })
    }
}

/// Require buyer capability. Mirror image of [`require_seller`].
pub fn require_buyer(ctx: &AuthContext, store: &dyn IdentityStore) -> Result<()> {
    ctx.require_auth()?;
    if ctx.role.implies_buyer() {
        return Ok(());
    }
    let account = load_active_account(ctx, store)?;
    if account.user_type.can_buy() {
        Ok(())
    } else {
        Err(TradepostError::Forbidden {
            reason: format!("buyer capability required, account is {}", account.user_type),
        })
    }
}

/// Require an opt-in feature flag. Flags are never embedded in the
/// credential, so this always consults the store.
pub fn require_feature(
    ctx: &AuthContext,
    store: &dyn IdentityStore,
    feature: &str,
) -> Result<()> {
    ctx.require_auth()?;
    let account = load_active_account(ctx, store)?;
    if account.has_feature(feature) {
        Ok(())
    } else {
        Err(TradepostError::Forbidden {
            reason: format!("feature '{feature}' not enabled for account"),
        })
    }
}

fn load_active_account(ctx: &AuthContext, store: &dyn IdentityStore) -> Result<Account> {
    let account = store
        .find_by_id(ctx.user_id)
        .ok_or(TradepostError::AccountNotFound(ctx.user_id))?;
    if !account.active {
        tracing::warn!(user = %ctx.user_id, "deactivated account attempted a guarded action");
        return Err(TradepostError::AccountDeactivated);
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradepost_types::{
        Account, Role, UserId, UserType, collaborators::doubles::MemoryIdentityStore,
    };

    fn ctx(role: Role) -> AuthContext {
        let now = Utc::now();
        AuthContext::authenticated(UserId::new(), role, "u@example.com", now, now)
    }

    fn store_with(account: Account) -> MemoryIdentityStore {
        let mut store = MemoryIdentityStore::new();
        store.insert(account);
        store
    }

    #[test]
    fn seller_token_trusted_without_lookup() {
        // Empty store: a lookup would fail, proving the token was trusted.
        let store = MemoryIdentityStore::new();
        assert!(require_seller(&ctx(Role::Seller), &store).is_ok());
        assert!(require_seller(&ctx(Role::Admin), &store).is_ok());
    }

    #[test]
    fn buyer_token_trusted_without_lookup() {
        let store = MemoryIdentityStore::new();
        assert!(require_buyer(&ctx(Role::Buyer), &store).is_ok());
        assert!(require_buyer(&ctx(Role::Subadmin), &store).is_ok());
    }

    #[test]
    fn coarse_role_falls_back_to_store() {
        let ctx = ctx(Role::User);
        let store = store_with(Account::new(
            ctx.user_id,
            Role::User,
            UserType::Both,
            "u@example.com",
        ));
        assert!(require_seller(&ctx, &store).is_ok());
        assert!(require_buyer(&ctx, &store).is_ok());
    }

    #[test]
    fn store_user_type_limits_capability() {
        let ctx = ctx(Role::User);
        let store = store_with(Account::new(
            ctx.user_id,
            Role::User,
            UserType::Buyer,
            "u@example.com",
        ));
        assert!(require_buyer(&ctx, &store).is_ok());
        let err = require_seller(&ctx, &store).unwrap_err();
        assert!(matches!(err, TradepostError::Forbidden { .. }));
    }

    #[test]
    fn deactivated_account_is_forbidden() {
        let ctx = ctx(Role::User);
        let mut store = store_with(Account::new(
            ctx.user_id,
            Role::User,
            UserType::Both,
            "u@example.com",
        ));
        store.deactivate(ctx.user_id);
        let err = require_seller(&ctx, &store).unwrap_err();
        assert!(matches!(err, TradepostError::AccountDeactivated));
    }

    #[test]
    fn missing_account_is_not_found() {
        let store = MemoryIdentityStore::new();
        let err = require_seller(&ctx(Role::User), &store).unwrap_err();
        assert!(matches!(err, TradepostError::AccountNotFound(_)));
    }

    #[test]
    fn buyer_role_still_checked_against_store_for_selling() {
        // A buyer-role token can still sell if the account says Both.
        let ctx = ctx(Role::Buyer);
        let store = store_with(Account::new(
            ctx.user_id,
            Role::Buyer,
            UserType::Both,
            "u@example.com",
        ));
        assert!(require_seller(&ctx, &store).is_ok());
    }

    #[test]
    fn feature_flags_always_consult_store() {
        let ctx = ctx(Role::Seller);
        let mut account = Account::new(ctx.user_id, Role::Seller, UserType::Seller, "s@x.com");
        account.features.push("express_payouts".to_string());
        let store = store_with(account);

        assert!(require_feature(&ctx, &store, "express_payouts").is_ok());
        let err = require_feature(&ctx, &store, "bulk_upload").unwrap_err();
        assert!(matches!(err, TradepostError::Forbidden { .. }));
    }

    #[test]
    fn anonymous_fails_every_capability() {
        let store = MemoryIdentityStore::new();
        let anon = AuthContext::anonymous();
        assert!(require_seller(&anon, &store).is_err());
        assert!(require_buyer(&anon, &store).is_err());
        assert!(require_feature(&anon, &store, "x").is_err());
    }
}
