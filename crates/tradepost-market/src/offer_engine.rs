//! Offer negotiation state machine.
//!
//! The engine enforces the one-open-offer invariant through an index
//! keyed by (buyer, listing): a second offer while one is open is a
//! conflict, never a silent create. Expiry is reconciled lazily on every
//! read and persisted by a periodic sweep so a stale open offer can
//! never race an `accept`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use tradepost_types::{
    Actor, AuditActor, AuditEntity, AuditTrail, EngineConfig, ListingId, ListingStatus, Offer,
    OfferId, OfferStatus, Order, OrderId, OrderStatus, Result, TradepostError, UserId,
};

use crate::listing_registry::ListingRegistry;

/// Manages the offer lifecycle: create, counter, accept, reject,
/// withdraw, and expiry.
pub struct OfferEngine {
    config: EngineConfig,
    offers: HashMap<OfferId, Offer>,
    /// Open (pending/countered) offer per (buyer, listing) pair.
    open_index: HashMap<(UserId, ListingId), OfferId>,
    audit: AuditTrail,
}

impl OfferEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            offers: HashMap::new(),
            open_index: HashMap::new(),
            audit: AuditTrail::new(),
        }
    }

    /// Create an offer on an active listing.
    ///
    /// # Errors
    /// - `ListingSold` / `ListingNotActive` when the listing cannot take offers
    /// - `OwnListingOffer` when the buyer owns the listing
    /// - `InvalidOffer` / `OfferAmountOutOfBounds` for amounts outside policy
    /// - `OpenOfferExists` when this buyer already has an open offer here
    pub fn create(
        &mut self,
        listings: &ListingRegistry,
        buyer: Actor,
        listing_id: ListingId,
        amount: i64,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferId> {
        let listing = listings.get(listing_id)?;
        if listing.status == ListingStatus::Sold {
            return Err(TradepostError::ListingSold(listing_id));
        }
        if listing.status != ListingStatus::Active {
            return Err(TradepostError::ListingNotActive {
                listing: listing_id,
                status: listing.status,
            });
        }
        if listing.owner_id == buyer.id {
            return Err(TradepostError::OwnListingOffer(listing_id));
        }
        if amount <= 0 {
            return Err(TradepostError::InvalidOffer {
                reason: format!("amount must be positive, got {amount}"),
            });
        }
        let ceiling = self.config.offer_ceiling(listing.price);
        if amount > ceiling {
            return Err(TradepostError::OfferAmountOutOfBounds { amount, ceiling });
        }

        // A stale open offer past its horizon does not block a new one.
        if let Some(&existing) = self.open_index.get(&(buyer.id, listing_id)) {
            self.reconcile_expiry(existing, now);
            if let Some(&open) = self.open_index.get(&(buyer.id, listing_id)) {
                return Err(TradepostError::OpenOfferExists {
                    listing: listing_id,
                    offer: open,
                });
            }
        }

        let offer = Offer {
            id: OfferId::new(),
            listing_id,
            buyer_id: buyer.id,
            amount,
            counter_amount: None,
            message: message.into(),
            status: OfferStatus::Pending,
            expires_at: now + self.config.offer_ttl(),
            created_at: now,
            updated_at: now,
        };
        let id = offer.id;
        self.open_index.insert((buyer.id, listing_id), id);
        self.offers.insert(id, offer);
        tracing::info!(offer = %id, listing = %listing_id, buyer = %buyer.id, amount, "offer created");
        Ok(id)
    }

    /// Look up an offer, reconciling lazy expiry first: an open offer
    /// past its horizon reads as `expired`.
    pub fn get_current(&mut self, id: OfferId, now: DateTime<Utc>) -> Result<&Offer> {
        self.reconcile_expiry(id, now);
        self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))
    }

    /// Raw lookup without expiry reconciliation.
    pub fn get(&self, id: OfferId) -> Result<&Offer> {
        self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))
    }

    /// The open offer for a (buyer, listing) pair, if any.
    #[must_use]
    pub fn open_offer_for(&self, buyer_id: UserId, listing_id: ListingId) -> Option<OfferId> {
        self.open_index.get(&(buyer_id, listing_id)).copied()
    }

    /// Accept an offer and synchronously produce its order in
    /// `pending_payment`, at the countered amount if one was recorded.
    ///
    /// The listing owner accepts a `pending` or `countered` offer; the
    /// buyer accepts only a `countered` one (taking the seller's terms).
    ///
    /// # Errors
    /// `ListingSold` if the listing was sold in the interim; the caller
    /// is expected to surface this as a lost race.
    pub fn accept(
        &mut self,
        listings: &ListingRegistry,
        actor: Actor,
        id: OfferId,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        self.reconcile_expiry(id, now);
        let offer = self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))?;

        if offer.status == OfferStatus::Expired {
            return Err(TradepostError::OfferExpired(id));
        }
        if !offer.status.is_open() {
            return Err(TradepostError::OfferTransitionInvalid {
                from: offer.status,
                action: "accept",
            });
        }

        let listing = listings.get(offer.listing_id)?;
        let seller_accepting = actor.is_admin() || actor.id == listing.owner_id;
        let buyer_accepting_counter =
            actor.id == offer.buyer_id && offer.status == OfferStatus::Countered;
        if !seller_accepting && !buyer_accepting_counter {
            return Err(TradepostError::OwnershipDenied {
                failed_ids: vec![id.to_string()],
            });
        }

        // Re-validate against the race where another order already paid.
        if listing.status == ListingStatus::Sold {
            return Err(TradepostError::ListingSold(offer.listing_id));
        }

        let amount = offer.effective_amount();
        let (listing_id, buyer_id, seller_id) = (offer.listing_id, offer.buyer_id, listing.owner_id);
        self.transition(actor, id, OfferStatus::Accepted, now)?;

        Ok(Order {
            id: OrderId::new(),
            listing_id,
            buyer_id,
            seller_id,
            origin_offer_id: Some(id),
            amount,
            status: OrderStatus::PendingPayment,
            payment_ref: None,
            revisions: 0,
            max_revisions: self.config.max_revisions,
            delivery_files: Vec::new(),
            delivery_message: None,
            credited_net: None,
            reconciliation_note: None,
            created_at: now,
            paid_at: None,
            delivered_at: None,
            completed_at: None,
        })
    }

    /// Reject an open offer. Listing owner (or admin) only; no side effects.
    pub fn reject(
        &mut self,
        listings: &ListingRegistry,
        actor: Actor,
        id: OfferId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.reconcile_expiry(id, now);
        let offer = self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))?;
        let listing = listings.get(offer.listing_id)?;
        if !actor.is_admin() && actor.id != listing.owner_id {
            return Err(TradepostError::OwnershipDenied {
                failed_ids: vec![id.to_string()],
            });
        }
        self.transition(actor, id, OfferStatus::Rejected, now)
    }

    /// Counter a pending offer with new terms. Listing owner only.
    pub fn counter(
        &mut self,
        listings: &ListingRegistry,
        actor: Actor,
        id: OfferId,
        counter_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.reconcile_expiry(id, now);
        let offer = self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))?;
        let listing = listings.get(offer.listing_id)?;
        if !actor.is_admin() && actor.id != listing.owner_id {
            return Err(TradepostError::OwnershipDenied {
                failed_ids: vec![id.to_string()],
            });
        }
        if offer.status != OfferStatus::Pending {
            return Err(TradepostError::OfferTransitionInvalid {
                from: offer.status,
                action: "counter",
            });
        }
        if counter_amount <= 0 {
            return Err(TradepostError::InvalidOffer {
                reason: format!("counter amount must be positive, got {counter_amount}"),
            });
        }
        let ceiling = self.config.offer_ceiling(listing.price);
        if counter_amount > ceiling {
            return Err(TradepostError::OfferAmountOutOfBounds {
                amount: counter_amount,
                ceiling,
            });
        }

        self.transition(actor, id, OfferStatus::Countered, now)?;
        // Record terms after the transition committed.
        if let Some(offer) = self.offers.get_mut(&id) {
            offer.counter_amount = Some(counter_amount);
        }
        Ok(())
    }

    /// Withdraw an open offer. Buyer only.
    pub fn withdraw(&mut self, actor: Actor, id: OfferId, now: DateTime<Utc>) -> Result<()> {
        self.reconcile_expiry(id, now);
        let offer = self.offers.get(&id).ok_or(TradepostError::OfferNotFound(id))?;
        if !actor.is_admin() && actor.id != offer.buyer_id {
            return Err(TradepostError::OwnershipDenied {
                failed_ids: vec![id.to_string()],
            });
        }
        self.transition(actor, id, OfferStatus::Withdrawn, now)
    }

    /// Persist `expired` on every open offer past its horizon. Returns
    /// the number of offers expired.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let stale: Vec<OfferId> = self
            .offers
            .values()
            .filter(|o| o.is_expired(now))
            .map(|o| o.id)
            .collect();
        for id in &stale {
            self.reconcile_expiry(*id, now);
        }
        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "offer expiry sweep");
        }
        stale.len()
    }

    /// Number of open offers.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open_index.len()
    }

    /// The offer transition audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Persist expiry if the offer is open and past its horizon.
    fn reconcile_expiry(&mut self, id: OfferId, now: DateTime<Utc>) {
        let Some(offer) = self.offers.get_mut(&id) else {
            return;
        };
        if !offer.is_expired(now) {
            return;
        }
        let previous = offer.status;
        offer.status = OfferStatus::Expired;
        offer.updated_at = now;
        self.open_index.remove(&(offer.buyer_id, offer.listing_id));
        self.audit.record(
            AuditEntity::Offer,
            id,
            previous,
            OfferStatus::Expired,
            AuditActor::System,
        );
        tracing::info!(offer = %id, %previous, "offer expired");
    }

    /// Commit a status transition, maintaining the open index and audit
    /// trail. The caller has already authorized the actor.
    fn transition(
        &mut self,
        actor: Actor,
        id: OfferId,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let offer = self.offers.get_mut(&id).ok_or(TradepostError::OfferNotFound(id))?;
        if !offer.status.can_transition_to(target) {
            return Err(TradepostError::OfferTransitionInvalid {
                from: offer.status,
                action: match target {
                    OfferStatus::Accepted => "accept",
                    OfferStatus::Rejected => "reject",
                    OfferStatus::Countered => "counter",
                    OfferStatus::Withdrawn => "withdraw",
                    OfferStatus::Expired => "expire",
                    OfferStatus::Pending => "reopen",
                },
            });
        }

        let previous = offer.status;
        offer.status = target;
        offer.updated_at = now;
        if target.is_terminal() {
            self.open_index.remove(&(offer.buyer_id, offer.listing_id));
        }
        self.audit.record(
            AuditEntity::Offer,
            id,
            previous,
            target,
            AuditActor::User(actor),
        );
        tracing::info!(offer = %id, %previous, new = %target, actor = %actor, "offer transition");
        Ok(())
    }
}
