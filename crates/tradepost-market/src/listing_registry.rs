//! Listing lifecycle and visibility.
//!
//! The registry is the source of truth for listing state. Owner checks
//! happen here on every mutation; the escrow engine is the only caller
//! of [`ListingRegistry::mark_sold`], when an order's payment lands.

use std::collections::HashMap;

use chrono::Utc;

use tradepost_types::{
    Actor, AuditActor, AuditEntity, AuditTrail, Listing, ListingId, ListingStatus, Result,
    TradepostError,
};

/// Manages the listing population.
pub struct ListingRegistry {
    listings: HashMap<ListingId, Listing>,
    audit: AuditTrail,
}

impl ListingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
            audit: AuditTrail::new(),
        }
    }

    /// Create a listing owned by the actor, in `draft` or directly `active`.
    ///
    /// # Errors
    /// `InvalidListing` for a non-positive price or an empty title.
    pub fn create(
        &mut self,
        actor: Actor,
        title: impl Into<String>,
        kind: impl Into<String>,
        price: i64,
        publish_now: bool,
    ) -> Result<ListingId> {
        let title = title.into();
        if price <= 0 {
            return Err(TradepostError::InvalidListing {
                reason: format!("price must be positive, got {price}"),
            });
        }
        if title.trim().is_empty() {
            return Err(TradepostError::InvalidListing {
                reason: "title must not be empty".to_string(),
            });
        }

        let now = Utc::now();
        let status = if publish_now {
            ListingStatus::Active
        } else {
            ListingStatus::Draft
        };
        let listing = Listing {
            id: ListingId::new(),
            owner_id: actor.id,
            title,
            kind: kind.into(),
            price,
            status,
            created_at: now,
            updated_at: now,
        };
        let id = listing.id;
        tracing::info!(listing = %id, owner = %actor.id, %status, "listing created");
        self.listings.insert(id, listing);
        Ok(id)
    }

    /// Look up a listing by id.
    pub fn get(&self, id: ListingId) -> Result<&Listing> {
        self.listings
            .get(&id)
            .ok_or(TradepostError::ListingNotFound(id))
    }

    /// Listings visible to the given viewer: everyone sees `active`;
    /// the owner and admins also see their drafts, inactive, and sold.
    #[must_use]
    pub fn visible_to(&self, viewer: Option<Actor>) -> Vec<&Listing> {
        self.listings
            .values()
            .filter(|l| {
                l.status == ListingStatus::Active
                    || viewer.is_some_and(|v| v.is_admin() || v.id == l.owner_id)
            })
            .collect()
    }

    /// Publish a draft (`draft -> active`). Owner only.
    pub fn publish(&mut self, actor: Actor, id: ListingId) -> Result<()> {
        self.transition(actor, id, ListingStatus::Active, "publish")
    }

    /// Toggle `active <-> inactive`. Owner only; fails once sold.
    pub fn set_active(&mut self, actor: Actor, id: ListingId, active: bool) -> Result<()> {
        let target = if active {
            ListingStatus::Active
        } else {
            ListingStatus::Inactive
        };
        self.transition(actor, id, target, "toggle")
    }

    /// Flip a listing to `sold`. Called by the escrow engine when an
    /// order reaches `paid`; not reachable from any user action.
    pub fn mark_sold(&mut self, id: ListingId) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(TradepostError::ListingNotFound(id))?;

        if listing.status == ListingStatus::Sold {
            return Err(TradepostError::ListingSold(id));
        }
        if !listing.status.can_transition_to(ListingStatus::Sold) {
            return Err(TradepostError::ListingNotActive {
                listing: id,
                status: listing.status,
            });
        }

        let previous = listing.status;
        listing.status = ListingStatus::Sold;
        listing.updated_at = Utc::now();
        self.audit.record(
            AuditEntity::Listing,
            id,
            previous,
            ListingStatus::Sold,
            AuditActor::System,
        );
        tracing::info!(listing = %id, "listing sold");
        Ok(())
    }

    /// Number of listings tracked.
    #[must_use]
    pub fn count(&self) -> usize {
        self.listings.len()
    }

    /// The listing transition audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    fn transition(
        &mut self,
        actor: Actor,
        id: ListingId,
        target: ListingStatus,
        action: &str,
    ) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(TradepostError::ListingNotFound(id))?;

        if !actor.is_admin() && listing.owner_id != actor.id {
            return Err(TradepostError::OwnershipDenied {
                failed_ids: vec![id.to_string()],
            });
        }

        if listing.status == ListingStatus::Sold {
            return Err(TradepostError::ListingSold(id));
        }
        if listing.status == target {
            // Toggling to the current state is a no-op.
            return Ok(());
        }
        if !listing.status.can_transition_to(target) {
            return Err(TradepostError::ListingNotActive {
                listing: id,
                status: listing.status,
            });
        }

        let previous = listing.status;
        listing.status = target;
        listing.updated_at = Utc::now();
        self.audit.record(
            AuditEntity::Listing,
            id,
            previous,
            target,
            AuditActor::User(actor),
        );
        tracing::info!(listing = %id, %previous, new = %target, %action, "listing transition");
        Ok(())
    }
}

impl Default for ListingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradepost_types::{Role, UserId};

    fn seller() -> Actor {
        Actor::new(UserId::new(), Role::Seller)
    }

    #[test]
    fn create_active_listing() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Logo pack", "template", 5000, true).unwrap();
        let listing = reg.get(id).unwrap();
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.owner_id, owner.id);
        assert_eq!(listing.price, 5000);
    }

    #[test]
    fn create_draft_listing() {
        let mut reg = ListingRegistry::new();
        let id = reg.create(seller(), "Draft", "domain", 100, false).unwrap();
        assert_eq!(reg.get(id).unwrap().status, ListingStatus::Draft);
    }

    #[test]
    fn nonpositive_price_rejected() {
        let mut reg = ListingRegistry::new();
        assert!(reg.create(seller(), "Free", "template", 0, true).is_err());
        assert!(reg.create(seller(), "Negative", "template", -5, true).is_err());
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn empty_title_rejected() {
        let mut reg = ListingRegistry::new();
        let err = reg.create(seller(), "   ", "template", 100, true).unwrap_err();
        assert!(matches!(err, TradepostError::InvalidListing { .. }));
    }

    #[test]
    fn publish_draft() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Draft", "template", 100, false).unwrap();
        reg.publish(owner, id).unwrap();
        assert_eq!(reg.get(id).unwrap().status, ListingStatus::Active);
        assert_eq!(reg.audit().for_entity(&id.to_string()).len(), 1);
    }

    #[test]
    fn toggle_active_inactive() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Toggle me", "template", 100, true).unwrap();

        reg.set_active(owner, id, false).unwrap();
        assert_eq!(reg.get(id).unwrap().status, ListingStatus::Inactive);
        reg.set_active(owner, id, true).unwrap();
        assert_eq!(reg.get(id).unwrap().status, ListingStatus::Active);
    }

    #[test]
    fn toggle_to_same_state_is_noop() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Same", "template", 100, true).unwrap();
        reg.set_active(owner, id, true).unwrap();
        // No audit record for a no-op.
        assert!(reg.audit().for_entity(&id.to_string()).is_empty());
    }

    #[test]
    fn non_owner_cannot_mutate() {
        let mut reg = ListingRegistry::new();
        let id = reg.create(seller(), "Mine", "template", 100, true).unwrap();
        let intruder = seller();
        let err = reg.set_active(intruder, id, false).unwrap_err();
        assert!(matches!(err, TradepostError::OwnershipDenied { .. }));
        // No mutation happened.
        assert_eq!(reg.get(id).unwrap().status, ListingStatus::Active);
    }

    #[test]
    fn admin_can_mutate_any_listing() {
        let mut reg = ListingRegistry::new();
        let id = reg.create(seller(), "Mine", "template", 100, true).unwrap();
        let admin = Actor::new(UserId::new(), Role::Admin);
        assert!(reg.set_active(admin, id, false).is_ok());
    }

    #[test]
    fn sold_blocks_all_owner_mutations() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Sold out", "template", 100, true).unwrap();
        reg.mark_sold(id).unwrap();

        let err = reg.set_active(owner, id, false).unwrap_err();
        assert!(matches!(err, TradepostError::ListingSold(_)));
        let err = reg.publish(owner, id).unwrap_err();
        assert!(matches!(err, TradepostError::ListingSold(_)));
    }

    #[test]
    fn mark_sold_twice_conflicts() {
        let mut reg = ListingRegistry::new();
        let id = reg.create(seller(), "Once", "template", 100, true).unwrap();
        reg.mark_sold(id).unwrap();
        let err = reg.mark_sold(id).unwrap_err();
        assert!(matches!(err, TradepostError::ListingSold(_)));
    }

    #[test]
    fn mark_sold_from_inactive() {
        // Payment can land after the seller toggled the listing off.
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let id = reg.create(owner, "Paused", "template", 100, true).unwrap();
        reg.set_active(owner, id, false).unwrap();
        assert!(reg.mark_sold(id).is_ok());
    }

    #[test]
    fn draft_cannot_be_sold() {
        let mut reg = ListingRegistry::new();
        let id = reg.create(seller(), "Draft", "template", 100, false).unwrap();
        assert!(reg.mark_sold(id).is_err());
    }

    #[test]
    fn visibility_rules() {
        let mut reg = ListingRegistry::new();
        let owner = seller();
        let active = reg.create(owner, "Public", "template", 100, true).unwrap();
        let draft = reg.create(owner, "Hidden", "template", 100, false).unwrap();

        // Anonymous browsing sees only active.
        let anon: Vec<_> = reg.visible_to(None).iter().map(|l| l.id).collect();
        assert!(anon.contains(&active));
        assert!(!anon.contains(&draft));

        // The owner sees both.
        let own: Vec<_> = reg.visible_to(Some(owner)).iter().map(|l| l.id).collect();
        assert!(own.contains(&active));
        assert!(own.contains(&draft));

        // So does an admin.
        let admin = Actor::new(UserId::new(), Role::Admin);
        assert_eq!(reg.visible_to(Some(admin)).len(), 2);
    }

    #[test]
    fn missing_listing_not_found() {
        let reg = ListingRegistry::new();
        let err = reg.get(ListingId::new()).unwrap_err();
        assert!(matches!(err, TradepostError::ListingNotFound(_)));
    }
}
