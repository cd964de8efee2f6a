//! # tradepost-auth
//!
//! Credential resolution and authorization guards for TradePost.
//!
//! ## Request flow
//!
//! ```text
//! Authorization header -> TokenResolver.resolve() -> AuthContext
//!     -> GuardChain (role tier, ownership, capability) -> domain engine
//! ```
//!
//! The resolver verifies the signed bearer credential; the guards are
//! independent checks composed per endpoint. Capability checks trust the
//! token-embedded role first and fall back to the identity store only
//! when the role is ambiguous.

pub mod capability;
pub mod claims;
pub mod context;
pub mod guard;

pub use capability::{require_buyer, require_feature, require_seller};
pub use claims::{Claims, TokenResolver, extract_bearer};
pub use context::AuthContext;
pub use guard::{
    GuardChain, GuardFn, RoleTable, authenticated, check_ownership, check_ownership_batch,
    parse_id, role_at_least,
};
