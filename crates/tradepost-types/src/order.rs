//! Escrow order types.
//!
//! An order is created either from an accepted offer or from a direct
//! "buy now" purchase, and walks the escrow lifecycle: payment capture,
//! delivery and revision rounds, then completion (which releases seller
//! proceeds to the ledger) or cancellation/refund.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, OrderId, PaymentRef, UserId};

/// Lifecycle status of an escrow order.
///
/// ```text
/// PENDING_PAYMENT ──▶ PAID ──▶ IN_PROGRESS ──▶ DELIVERED ──▶ COMPLETED
///        │                          ▲              │ ▲
///        ▼                          │              ▼ │ redeliver
///    CANCELLED                      └───── IN_REVISION
///
/// any non-terminal pre-completion state ──▶ DISPUTED ──▶ REFUNDED
///                                               └──▶ IN_PROGRESS
/// ```
///
/// A payment reversal (chargeback) can additionally pull a `completed`
/// order into `disputed`; `cancelled` and `refunded` are fully terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    InProgress,
    Delivered,
    InRevision,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

impl OrderStatus {
    /// Can this order transition to the given target status?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::PendingPayment => {
                matches!(target, Self::Paid | Self::Cancelled | Self::Disputed)
            }
            Self::Paid => matches!(target, Self::InProgress | Self::Disputed),
            Self::InProgress => matches!(target, Self::Delivered | Self::Disputed),
            Self::Delivered => {
                matches!(target, Self::InRevision | Self::Completed | Self::Disputed)
            }
            Self::InRevision => matches!(target, Self::Delivered | Self::Disputed),
            Self::Disputed => matches!(target, Self::Refunded | Self::InProgress),
            // Chargeback path: a payment reversal disputes a settled order.
            Self::Completed => matches!(target, Self::Disputed),
            Self::Cancelled | Self::Refunded => false,
        }
    }

    /// Whether this status is terminal. `Completed` is settled but can
    /// still be disputed by a payment reversal, so it is not listed here.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether the order has settled successfully or terminally failed.
    #[must_use]
    pub fn is_settled(self) -> bool {
        self == Self::Completed || self.is_terminal()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingPayment => write!(f, "PENDING_PAYMENT"),
            Self::Paid => write!(f, "PAID"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::InRevision => write!(f, "IN_REVISION"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// An escrow order. Amounts are in integer minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// The accepting offer this order was created from, if negotiated.
    /// Exactly one order exists per accepting offer.
    pub origin_offer_id: Option<OfferId>,
    pub amount: i64,
    pub status: OrderStatus,
    /// Gateway payment-intent reference, set when the intent is created.
    pub payment_ref: Option<PaymentRef>,
    /// Revision rounds consumed so far. Never exceeds `max_revisions`.
    pub revisions: u32,
    pub max_revisions: u32,
    /// Opaque attachment references from the most recent delivery.
    pub delivery_files: Vec<String>,
    pub delivery_message: Option<String>,
    /// Net proceeds posted to the seller ledger on completion. Present
    /// while the credit stands; cleared if a refund reverses it.
    pub credited_net: Option<i64>,
    /// Set when a refund could not fully reverse the ledger credit;
    /// the order is then waiting on manual reconciliation.
    pub reconciliation_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the actor id is a party to this order.
    #[must_use]
    pub fn is_party(&self, user_id: UserId) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// Whether another revision round may be requested.
    #[must_use]
    pub fn revisions_remaining(&self) -> bool {
        self.revisions < self.max_revisions
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy(listing_id: ListingId, buyer_id: UserId, seller_id: UserId, amount: i64) -> Self {
        Self {
            id: OrderId::new(),
            listing_id,
            buyer_id,
            seller_id,
            origin_offer_id: None,
            amount,
            status: OrderStatus::PendingPayment,
            payment_ref: None,
            revisions: 0,
            max_revisions: 2,
            delivery_files: Vec::new(),
            delivery_message: None,
            credited_net: None,
            reconciliation_note: None,
            created_at: Utc::now(),
            paid_at: None,
            delivered_at: None,
            completed_at: None,
        }
    }
}
