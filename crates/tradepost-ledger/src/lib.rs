//! # tradepost-ledger
//!
//! Seller ledger and payout engine.
//!
//! ## Architecture
//!
//! - [`LedgerBook`]: available/pending/withdrawn accounting, clearance
//!   maturation, refund reversals, and the atomic withdrawal reserve
//! - [`PayoutEngine`]: withdrawal request lifecycle against the external
//!   payment gateway
//! - [`ConservationChecker`]: the safety net validating that every
//!   seller's balances always sum to their credited net proceeds
//!
//! Only the escrow engine credits the book (on order completion) and
//! only the payout engine debits it; no user action touches it directly.

pub mod book;
pub mod conservation;
pub mod payout;

pub use book::LedgerBook;
pub use conservation::ConservationChecker;
pub use payout::PayoutEngine;
