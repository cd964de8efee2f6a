//! Seller ledger types.
//!
//! Every seller has an `available` balance (withdrawable), a `pending`
//! balance (credited proceeds still inside the clearance window), and a
//! `total_withdrawn` tally. The conservation law holds at all times:
//!
//! ```text
//! available + pending + total_withdrawn == Σ(net proceeds of completed orders)
//! ```
//!
//! All amounts are integer minor-currency units and never negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{UserId, WithdrawalId};

/// A seller's balance snapshot. All three figures come from the same
/// read; callers never combine fields from different snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerAccount {
    pub seller_id: UserId,
    /// Withdrawable now.
    pub available: i64,
    /// Credited but still clearing.
    pub pending: i64,
    /// Paid out since account creation.
    pub total_withdrawn: i64,
}

impl LedgerAccount {
    /// Create a zero account for a seller.
    #[must_use]
    pub fn new(seller_id: UserId) -> Self {
        Self {
            seller_id,
            available: 0,
            pending: 0,
            total_withdrawn: 0,
        }
    }

    /// Lifetime credited total (the right-hand side of the conservation law).
    #[must_use]
    pub fn lifetime_total(&self) -> i64 {
        self.available + self.pending + self.total_withdrawn
    }

    /// Whether this account has never been credited.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.pending == 0 && self.total_withdrawn == 0
    }
}

/// Lifecycle status of a withdrawal request.
///
/// - `Pending -> Processing` (picked up for transfer)
/// - `Processing -> Completed` (transfer confirmed; amount lands in `total_withdrawn`)
/// - `Processing -> Failed` (transfer failed; amount restored to `available`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    /// Can this request transition to the given target status?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A withdrawal request. Creation atomically reserves `amount` out of
/// the seller's available balance, so two concurrent requests can never
/// double-spend the same funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub seller_id: UserId,
    pub amount: i64,
    pub status: WithdrawalStatus,
    /// Gateway transfer reference, set once processing starts.
    pub transfer_id: Option<crate::TransferId>,
    pub requested_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_zero() {
        let acct = LedgerAccount::new(UserId::new());
        assert!(acct.is_zero());
        assert_eq!(acct.lifetime_total(), 0);
    }

    #[test]
    fn lifetime_total_sums_all_pools() {
        let acct = LedgerAccount {
            seller_id: UserId::new(),
            available: 100,
            pending: 50,
            total_withdrawn: 25,
        };
        assert_eq!(acct.lifetime_total(), 175);
        assert!(!acct.is_zero());
    }

    #[test]
    fn withdrawal_lifecycle() {
        assert!(WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Processing));
        assert!(WithdrawalStatus::Processing.can_transition_to(WithdrawalStatus::Completed));
        assert!(WithdrawalStatus::Processing.can_transition_to(WithdrawalStatus::Failed));
    }

    #[test]
    fn withdrawal_cannot_skip_processing() {
        assert!(!WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Completed));
        assert!(!WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Failed));
    }

    #[test]
    fn withdrawal_terminal_statuses() {
        for terminal in [WithdrawalStatus::Completed, WithdrawalStatus::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(WithdrawalStatus::Pending));
            assert!(!terminal.can_transition_to(WithdrawalStatus::Processing));
        }
    }

    #[test]
    fn ledger_account_serde_roundtrip() {
        let acct = LedgerAccount {
            seller_id: UserId::new(),
            available: 12345,
            pending: 678,
            total_withdrawn: 90,
        };
        let json = serde_json::to_string(&acct).unwrap();
        let back: LedgerAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(acct, back);
    }
}
