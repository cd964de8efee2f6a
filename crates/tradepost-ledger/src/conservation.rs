//! Ledger conservation invariant checker.
//!
//! Mathematical invariant enforced after every credit, reversal, and
//! withdrawal step:
//! ```text
//! ∀ seller: available + pending + total_withdrawn + reserved_in_flight
//!           == Σ(credited net proceeds) - Σ(reversed refunds)
//! ```
//!
//! If this invariant ever breaks, something has gone catastrophically
//! wrong in the escrow or payout path; the checker surfaces it as a
//! critical error instead of letting the books drift.

use std::collections::HashMap;

use tradepost_types::{LedgerAccount, Result, TradepostError, UserId};

/// Tracks lifetime credits and reversals per seller and validates the
/// conservation law against account snapshots.
pub struct ConservationChecker {
    /// Net proceeds credited per seller since genesis.
    credited: HashMap<UserId, i64>,
    /// Refund reversals per seller since genesis.
    reversed: HashMap<UserId, i64>,
}

impl ConservationChecker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            credited: HashMap::new(),
            reversed: HashMap::new(),
        }
    }

    /// Record a completed order's net proceeds.
    pub fn record_credit(&mut self, seller_id: UserId, amount: i64) {
        *self.credited.entry(seller_id).or_insert(0) += amount;
    }

    /// Record a refund reversal.
    pub fn record_reversal(&mut self, seller_id: UserId, amount: i64) {
        *self.reversed.entry(seller_id).or_insert(0) += amount;
    }

    /// Expected lifetime total for a seller: credits minus reversals.
    #[must_use]
    pub fn expected_total(&self, seller_id: UserId) -> i64 {
        let credited = self.credited.get(&seller_id).copied().unwrap_or(0);
        let reversed = self.reversed.get(&seller_id).copied().unwrap_or(0);
        credited - reversed
    }

    /// Verify the conservation law for one seller against a snapshot.
    ///
    /// `reserved_in_flight` is the amount held by withdrawal requests
    /// that have left `available` but not yet reached `total_withdrawn`.
    ///
    /// # Errors
    /// [`TradepostError::LedgerConservationViolation`] if actual ≠ expected.
    pub fn verify(&self, account: &LedgerAccount, reserved_in_flight: i64) -> Result<()> {
        let actual = account.lifetime_total() + reserved_in_flight;
        let expected = self.expected_total(account.seller_id);
        if actual != expected {
            return Err(TradepostError::LedgerConservationViolation {
                reason: format!(
                    "seller {}: actual {actual} != expected {expected} \
                     (available={}, pending={}, withdrawn={}, in_flight={reserved_in_flight})",
                    account.seller_id, account.available, account.pending, account.total_withdrawn,
                ),
            });
        }
        Ok(())
    }

    /// All sellers with recorded activity.
    #[must_use]
    pub fn tracked_sellers(&self) -> Vec<UserId> {
        let mut sellers: std::collections::HashSet<UserId> =
            self.credited.keys().copied().collect();
        sellers.extend(self.reversed.keys().copied());
        sellers.into_iter().collect()
    }
}

impl Default for ConservationChecker {
    fn default() -> Self {
        Self::new()
    }
}
