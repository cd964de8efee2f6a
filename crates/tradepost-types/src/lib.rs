//! # tradepost-types
//!
//! Shared types, errors, and configuration for the **TradePost**
//! marketplace transaction engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`ListingId`], [`OfferId`], [`OrderId`], [`WithdrawalId`], [`PaymentRef`], [`TransferId`]
//! - **Identity model**: [`Role`], [`UserType`], [`Account`], [`Actor`]
//! - **Listing model**: [`Listing`], [`ListingStatus`]
//! - **Offer model**: [`Offer`], [`OfferStatus`]
//! - **Order model**: [`Order`], [`OrderStatus`]
//! - **Ledger model**: [`LedgerAccount`], [`WithdrawalRequest`], [`WithdrawalStatus`]
//! - **Audit trail**: [`AuditTrail`], [`TransitionRecord`]
//! - **Collaborator seams**: [`PaymentGateway`], [`IdentityStore`], [`NotificationService`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`TradepostError`] with `TP_ERR_` prefix codes and the [`ErrorKind`] taxonomy
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod ids;
pub mod ledger;
pub mod listing;
pub mod offer;
pub mod order;

// Re-export all primary types at crate root for ergonomic imports:
//   use tradepost_types::{Listing, Offer, Order, LedgerAccount, ...};

pub use audit::*;
pub use collaborators::*;
pub use config::*;
pub use error::*;
pub use identity::*;
pub use ids::*;
pub use ledger::*;
pub use listing::*;
pub use offer::*;
pub use order::*;

// Constants are accessed via `tradepost_types::constants::FOO`
// (not re-exported to avoid name collisions).
