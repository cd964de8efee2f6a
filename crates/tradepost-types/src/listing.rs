//! Listing types for the TradePost marketplace.
//!
//! A listing is owned exclusively by its seller. `sold` is terminal:
//! no further offers or direct purchases are permitted once reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ListingId, UserId};

/// Lifecycle status of a listing.
///
/// ```text
///   ┌───────┐ publish ┌────────┐ payment  ┌──────┐
///   │ DRAFT ├────────▶│ ACTIVE ├─────────▶│ SOLD │
///   └───────┘         └──┬──▲──┘          └──────┘
///                 toggle │  │ toggle         ▲
///                        ▼  │                │ payment
///                    ┌──────┴───┐            │
///                    │ INACTIVE ├────────────┘
///                    └──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Active,
    Inactive,
    Sold,
}

impl ListingStatus {
    /// Can this listing transition to the given target status?
    ///
    /// `Inactive -> Sold` is reachable: a payment can land after the
    /// seller toggled the listing off but before the order was cancelled.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Inactive | Self::Sold)
                | (Self::Inactive, Self::Active | Self::Sold)
        )
    }

    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Sold
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Sold => write!(f, "SOLD"),
        }
    }
}

/// A digital-goods listing. Price is in integer minor-currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    pub title: String,
    /// Listing category, e.g. "domain", "template", "account".
    pub kind: String,
    /// Asking price in minor units. Always > 0.
    pub price: i64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Whether offers and purchases are currently accepted.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Listing {
    pub fn dummy(owner_id: UserId, price: i64, status: ListingStatus) -> Self {
        let now = Utc::now();
        Self {
            id: ListingId::new(),
            owner_id,
            title: "Dummy listing".to_string(),
            kind: "template".to_string(),
            price,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dummy_active(owner_id: UserId, price: i64) -> Self {
        Self::dummy(owner_id, price, ListingStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_publishes_to_active() {
        assert!(ListingStatus::Draft.can_transition_to(ListingStatus::Active));
        assert!(!ListingStatus::Draft.can_transition_to(ListingStatus::Sold));
    }

    #[test]
    fn active_inactive_toggle() {
        assert!(ListingStatus::Active.can_transition_to(ListingStatus::Inactive));
        assert!(ListingStatus::Inactive.can_transition_to(ListingStatus::Active));
    }

    #[test]
    fn sold_is_terminal() {
        assert!(ListingStatus::Sold.is_terminal());
        assert!(!ListingStatus::Sold.can_transition_to(ListingStatus::Active));
        assert!(!ListingStatus::Sold.can_transition_to(ListingStatus::Inactive));
        assert!(!ListingStatus::Sold.can_transition_to(ListingStatus::Draft));
    }

    #[test]
    fn payment_can_land_on_inactive() {
        assert!(ListingStatus::Inactive.can_transition_to(ListingStatus::Sold));
    }

    #[test]
    fn purchasable_only_when_active() {
        let owner = UserId::new();
        assert!(Listing::dummy_active(owner, 100).is_purchasable());
        assert!(!Listing::dummy(owner, 100, ListingStatus::Draft).is_purchasable());
        assert!(!Listing::dummy(owner, 100, ListingStatus::Sold).is_purchasable());
    }

    #[test]
    fn serde_roundtrip() {
        let listing = Listing::dummy_active(UserId::new(), 5000);
        let json = serde_json::to_string(&listing).unwrap();
        let back: Listing = serde_json::from_str(&json).unwrap();
        assert_eq!(listing.id, back.id);
        assert_eq!(listing.price, back.price);
        assert_eq!(listing.status, back.status);
    }
}
