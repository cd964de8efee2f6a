//! # tradepost-market
//!
//! Listing registry and offer negotiation engine.
//!
//! ## Flow
//!
//! ```text
//! seller -> ListingRegistry.create() -> ACTIVE listing
//! buyer  -> OfferEngine.create()     -> PENDING offer
//! seller -> OfferEngine.counter()    -> COUNTERED (optional round)
//! either -> OfferEngine.accept()     -> ACCEPTED offer + PENDING_PAYMENT order
//! ```
//!
//! The produced order is handed to the escrow engine; the listing flips
//! to `sold` only when that order's payment lands.

pub mod listing_registry;
pub mod offer_engine;

pub use listing_registry::ListingRegistry;
pub use offer_engine::OfferEngine;
