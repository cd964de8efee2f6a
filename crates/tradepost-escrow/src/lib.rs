//! # tradepost-escrow
//!
//! The escrow order engine: payment capture, delivery/revision workflow,
//! fund release, and dispute handling.
//!
//! ## Order flow
//!
//! ```text
//! OfferEngine.accept() ──▶ EscrowEngine.admit() ─┐
//! EscrowEngine.buy_now() ────────────────────────┤
//!                                                ▼
//!   create_intent ──▶ confirm_payment (exactly once per PaymentRef)
//!                  ──▶ start_progress ──▶ deliver ⟲ request_revision
//!                  ──▶ accept_delivery / sweep_auto_accept
//!                  ──▶ LedgerBook.credit_pending(net proceeds)
//! ```
//!
//! Payment confirmation flips the listing to `sold`; completion is the
//! only transition that credits the seller ledger.

pub mod engine;
pub mod payment;

pub use engine::{DisputeResolution, EscrowEngine, order_from_offer};
pub use payment::PaymentIndex;
