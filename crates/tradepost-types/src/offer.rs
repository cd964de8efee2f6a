//! Offer types for buyer/seller negotiation.
//!
//! At most one *open* (pending or countered) offer exists per
//! (buyer, listing) pair at any time. An offer past `expires_at` is
//! logically expired regardless of stored status; reads reconcile it
//! lazily and a periodic sweep persists the terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, UserId};

/// Lifecycle status of an offer.
///
/// Transitions are monotonic once a terminal status is reached:
/// - `Pending -> Countered` (seller counters)
/// - `Pending | Countered -> Accepted | Rejected | Expired | Withdrawn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Countered,
    Accepted,
    Rejected,
    Expired,
    Withdrawn,
}

impl OfferStatus {
    /// Can this offer transition to the given target status?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(
                target,
                Self::Countered | Self::Accepted | Self::Rejected | Self::Expired | Self::Withdrawn
            ),
            Self::Countered => matches!(
                target,
                Self::Accepted | Self::Rejected | Self::Expired | Self::Withdrawn
            ),
            Self::Accepted | Self::Rejected | Self::Expired | Self::Withdrawn => false,
        }
    }

    /// An open offer occupies the one-offer-per-(buyer, listing) slot.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }

    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Countered => write!(f, "COUNTERED"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Withdrawn => write!(f, "WITHDRAWN"),
        }
    }
}

/// A buyer's offer on a listing. Amounts are in integer minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    /// The buyer's proposed amount. Always > 0.
    pub amount: i64,
    /// The seller's counter amount, once countered.
    pub counter_amount: Option<i64>,
    pub message: String,
    pub status: OfferStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// The amount an acceptance settles at: the counter amount if the
    /// seller countered, the buyer's amount otherwise.
    #[must_use]
    pub fn effective_amount(&self) -> i64 {
        self.counter_amount.unwrap_or(self.amount)
    }

    /// Whether this offer is past its expiry horizon while still open.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && now > self.expires_at
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    pub fn dummy(listing_id: ListingId, buyer_id: UserId, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: OfferId::new(),
            listing_id,
            buyer_id,
            amount,
            counter_amount: None,
            message: "Would you take this?".to_string(),
            status: OfferStatus::Pending,
            expires_at: now + chrono::Duration::days(7),
            created_at: now,
            updated_at: now,
        }
    }
}
