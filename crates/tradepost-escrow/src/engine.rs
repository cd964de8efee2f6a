//! The escrow order engine.
//!
//! Orders enter at `pending_payment` (from an accepted offer or a
//! buy-now purchase) and walk the lifecycle: payment capture, delivery
//! and revision rounds, completion, disputes. Every transition validates
//! the caller against the order's parties and the source state; a lost
//! race surfaces as a conflict, never a silent overwrite.
//!
//! Completion is the only site that credits the seller ledger.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use tradepost_ledger::LedgerBook;
use tradepost_market::ListingRegistry;
use tradepost_types::{
    Actor, AuditActor, AuditEntity, AuditTrail, EngineConfig, ListingId, ListingStatus,
    NotificationService, Offer, OfferId, Order, OrderId, OrderStatus, PaymentGateway, PaymentRef,
    Result, TradepostError, UserId,
};

use crate::payment::PaymentIndex;

/// Admin resolution of a disputed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeResolution {
    /// Refund the buyer, reversing any ledger credit already posted.
    Refund,
    /// Send the order back to the seller to continue work.
    Resume,
}

/// Manages the order population and the escrow state machine.
pub struct EscrowEngine {
    config: EngineConfig,
    orders: HashMap<OrderId, Order>,
    /// One order per accepting offer, enforced at admission.
    offer_index: HashMap<OfferId, OrderId>,
    /// Intent reference to order, populated at intent creation.
    intent_index: HashMap<PaymentRef, OrderId>,
    /// Applied payment references (exactly-once transition guard).
    payments: PaymentIndex,
    audit: AuditTrail,
}

impl EscrowEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let capacity = config.payment_index_capacity;
        Self {
            config,
            orders: HashMap::new(),
            offer_index: HashMap::new(),
            intent_index: HashMap::new(),
            payments: PaymentIndex::new(capacity),
            audit: AuditTrail::new(),
        }
    }

    /// Admit an order produced by an accepted offer.
    ///
    /// Admission is idempotent per origin offer: re-admitting the same
    /// handoff returns the already-registered order. A *different* order
    /// claiming the same offer is a conflict.
    pub fn admit(&mut self, order: Order) -> Result<OrderId> {
        if order.status != OrderStatus::PendingPayment {
            return Err(TradepostError::OrderTransitionInvalid {
                from: order.status,
                to: OrderStatus::PendingPayment,
            });
        }

        if let Some(offer_id) = order.origin_offer_id {
            if let Some(&existing_id) = self.offer_index.get(&offer_id) {
                let existing = self
                    .orders
                    .get(&existing_id)
                    .ok_or(TradepostError::OrderNotFound(existing_id))?;
                if existing.buyer_id == order.buyer_id && existing.amount == order.amount {
                    return Ok(existing_id);
                }
                return Err(TradepostError::DuplicateOrderForOffer {
                    offer: offer_id,
                    order: existing_id,
                });
            }
            self.offer_index.insert(offer_id, order.id);
        }

        let id = order.id;
        tracing::info!(order = %id, listing = %order.listing_id, amount = order.amount, "order admitted");
        self.orders.insert(id, order);
        Ok(id)
    }

    /// Direct purchase of an active listing at its asking price, without
    /// negotiation. Enters the same state machine at `pending_payment`.
    pub fn buy_now(
        &mut self,
        listings: &ListingRegistry,
        buyer: Actor,
        listing_id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<OrderId> {
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
            return Err(TradepostError::Forbidden {
                reason: "cannot purchase own listing".to_string(),
            });
        }

        let order = Order {
            id: OrderId::new(),
            listing_id,
            buyer_id: buyer.id,
            seller_id: listing.owner_id,
            origin_offer_id: None,
            amount: listing.price,
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
        };
        let id = order.id;
        tracing::info!(order = %id, listing = %listing_id, buyer = %buyer.id, "buy-now order created");
        self.orders.insert(id, order);
        Ok(id)
    }

    /// Create the payment intent for an order awaiting payment.
    ///
    /// Idempotent per order: a retry returns the reference already
    /// recorded instead of creating a second intent. The gateway call
    /// carries a deterministic idempotency key for the same reason.
    pub fn create_intent(
        &mut self,
        gateway: &mut dyn PaymentGateway,
        order_id: OrderId,
        currency: &str,
    ) -> Result<PaymentRef> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or(TradepostError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::PendingPayment {
            return Err(TradepostError::OrderTransitionInvalid {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }
        if let Some(ref existing) = order.payment_ref {
            return Ok(existing.clone());
        }

        let key = intent_key(order_id);
        let payment_ref = gateway.create_intent(order.amount, currency, &key)?;
        self.intent_index.insert(payment_ref.clone(), order_id);
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.payment_ref = Some(payment_ref.clone());
        }
        tracing::info!(order = %order_id, %payment_ref, "payment intent created");
        Ok(payment_ref)
    }

    /// Apply a payment-success notification, exactly once per reference.
    ///
    /// The first notification moves the order `pending_payment -> paid`,
    /// stamps `paid_at`, and flips the listing to `sold`. A duplicate is
    /// a no-op returning the same order id.
    ///
    /// # Errors
    /// - `UnknownPaymentRef` for a reference the engine never issued
    /// - `ListingSold` when another order's payment won the listing; this
    ///   order stays in `pending_payment` for the dispute/refund path
    pub fn confirm_payment(
        &mut self,
        listings: &mut ListingRegistry,
        notifier: &mut dyn NotificationService,
        payment_ref: &PaymentRef,
        now: DateTime<Utc>,
    ) -> Result<OrderId> {
        // Duplicate notifications return the original result.
        if let Some(order_id) = self.payments.order_for(payment_ref) {
            tracing::info!(%payment_ref, order = %order_id, "duplicate payment notification ignored");
            return Ok(order_id);
        }

        let order_id = self
            .intent_index
            .get(payment_ref)
            .copied()
            .ok_or_else(|| TradepostError::UnknownPaymentRef(payment_ref.clone()))?;
        let order = self
            .orders
            .get(&order_id)
            .ok_or(TradepostError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::PendingPayment {
            return Err(TradepostError::OrderTransitionInvalid {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }

        let (listing_id, buyer_id, seller_id) = (order.listing_id, order.buyer_id, order.seller_id);
        // First successful payment takes the single-unit listing; a
        // later order's payment fails here and must not capture.
        listings.mark_sold(listing_id)?;

        self.commit(AuditActor::System, order_id, OrderStatus::Paid)?;
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.paid_at = Some(now);
        }
        self.payments.record(payment_ref, order_id);

        let payload = serde_json::json!({ "order": order_id.to_string() });
        notifier.notify(buyer_id, "order.paid", &payload);
        notifier.notify(seller_id, "order.paid", &payload);
        Ok(order_id)
    }

    /// Seller starts work: `paid -> in_progress`.
    pub fn start_progress(&mut self, actor: Actor, order_id: OrderId) -> Result<()> {
        let order = self.get(order_id)?;
        ensure_seller(order, actor)?;
        self.commit(AuditActor::User(actor), order_id, OrderStatus::InProgress)
    }

    /// Seller delivers: message plus at least one attachment reference.
    /// Valid from `in_progress` (first delivery) and `in_revision`
    /// (redelivery); stamps `delivered_at`.
    pub fn deliver(
        &mut self,
        notifier: &mut dyn NotificationService,
        actor: Actor,
        order_id: OrderId,
        message: impl Into<String>,
        files: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(TradepostError::DeliveryIncomplete {
                reason: "delivery message must not be empty".to_string(),
            });
        }
        if files.is_empty() {
            return Err(TradepostError::DeliveryIncomplete {
                reason: "delivery requires at least one attachment".to_string(),
            });
        }

        let order = self.get(order_id)?;
        ensure_seller(order, actor)?;
        let buyer_id = order.buyer_id;
        self.commit(AuditActor::User(actor), order_id, OrderStatus::Delivered)?;
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.delivered_at = Some(now);
            order.delivery_message = Some(message);
            order.delivery_files = files;
        }
        notifier.notify(
            buyer_id,
            "order.delivered",
            &serde_json::json!({ "order": order_id.to_string() }),
        );
        Ok(())
    }

    /// Buyer requests another revision round, while the allowance lasts.
    pub fn request_revision(&mut self, actor: Actor, order_id: OrderId) -> Result<()> {
        let order = self.get(order_id)?;
        ensure_buyer(order, actor)?;
        if !order.revisions_remaining() {
            return Err(TradepostError::RevisionLimitReached {
                revisions: order.revisions,
                max: order.max_revisions,
            });
        }
        self.commit(AuditActor::User(actor), order_id, OrderStatus::InRevision)?;
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.revisions += 1;
        }
        Ok(())
    }

    /// Buyer accepts the delivery: `delivered -> completed`, crediting
    /// the seller's net proceeds into the ledger's pending pool. Returns
    /// the credited amount.
    pub fn accept_delivery(
        &mut self,
        book: &mut LedgerBook,
        notifier: &mut dyn NotificationService,
        actor: Actor,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let order = self.get(order_id)?;
        ensure_buyer(order, actor)?;
        self.complete(book, notifier, AuditActor::User(actor), order_id, now)
    }

    /// Raise a dispute. Any party may dispute a live order; only an
    /// admin (acting on a payment reversal) may dispute a completed one.
    pub fn dispute(&mut self, actor: Actor, order_id: OrderId) -> Result<()> {
        let order = self.get(order_id)?;
        if !actor.is_admin() && !order.is_party(actor.id) {
            return Err(TradepostError::NotOrderParty(order_id));
        }
        if order.status == OrderStatus::Completed && !actor.is_admin() {
            return Err(TradepostError::Forbidden {
                reason: "only an admin can dispute a completed order".to_string(),
            });
        }
        self.commit(AuditActor::User(actor), order_id, OrderStatus::Disputed)
    }

    /// Admin resolution of a disputed order: refund the buyer or resume
    /// work.
    ///
    /// A refund reverses any ledger credit already posted. If the
    /// credited proceeds were already withdrawn, the reversal fails with
    /// a conflict, the order is annotated for manual reconciliation, and
    /// it stays `disputed`; the books are never driven negative.
    pub fn resolve_dispute(
        &mut self,
        book: &mut LedgerBook,
        notifier: &mut dyn NotificationService,
        actor: Actor,
        order_id: OrderId,
        resolution: DisputeResolution,
    ) -> Result<OrderStatus> {
        if !actor.is_admin() {
            return Err(TradepostError::Forbidden {
                reason: "dispute resolution is admin-only".to_string(),
            });
        }
        let order = self.get(order_id)?;
        if order.status != OrderStatus::Disputed {
            return Err(TradepostError::OrderTransitionInvalid {
                from: order.status,
                to: match resolution {
                    DisputeResolution::Refund => OrderStatus::Refunded,
                    DisputeResolution::Resume => OrderStatus::InProgress,
                },
            });
        }
        let (seller_id, buyer_id, credited) = (order.seller_id, order.buyer_id, order.credited_net);

        match resolution {
            DisputeResolution::Resume => {
                self.commit(AuditActor::User(actor), order_id, OrderStatus::InProgress)?;
                Ok(OrderStatus::InProgress)
            }
            DisputeResolution::Refund => {
                if let Some(net) = credited {
                    if let Err(err) = book.reverse_credit(seller_id, order_id, net) {
                        if let Some(order) = self.orders.get_mut(&order_id) {
                            order.reconciliation_note =
                                Some(format!("refund blocked, credit {net} already withdrawn"));
                        }
                        return Err(err);
                    }
                    if let Some(order) = self.orders.get_mut(&order_id) {
                        order.credited_net = None;
                    }
                }
                self.commit(AuditActor::User(actor), order_id, OrderStatus::Refunded)?;
                notifier.notify(
                    buyer_id,
                    "order.refunded",
                    &serde_json::json!({ "order": order_id.to_string() }),
                );
                Ok(OrderStatus::Refunded)
            }
        }
    }

    /// Complete every delivered order whose acceptance window elapsed.
    /// Returns the completed order ids.
    pub fn sweep_auto_accept(
        &mut self,
        book: &mut LedgerBook,
        notifier: &mut dyn NotificationService,
        now: DateTime<Utc>,
    ) -> Vec<OrderId> {
        let window = self.config.auto_accept_window();
        let due: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Delivered
                    && o.delivered_at.is_some_and(|d| d + window <= now)
            })
            .map(|o| o.id)
            .collect();

        let mut completed = Vec::with_capacity(due.len());
        for id in due {
            match self.complete(book, notifier, AuditActor::System, id, now) {
                Ok(_) => completed.push(id),
                Err(err) => tracing::warn!(order = %id, %err, "auto-accept failed"),
            }
        }
        if !completed.is_empty() {
            tracing::info!(count = completed.len(), "auto-accept sweep completed orders");
        }
        completed
    }

    /// Cancel every order stuck in `pending_payment` past the payment
    /// timeout. The listing never left `active`, so it is immediately
    /// purchasable again. Returns the cancelled order ids.
    pub fn sweep_payment_timeout(&mut self, now: DateTime<Utc>) -> Vec<OrderId> {
        let timeout = self.config.payment_timeout();
        let due: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::PendingPayment && o.created_at + timeout <= now)
            .map(|o| o.id)
            .collect();

        let mut cancelled = Vec::with_capacity(due.len());
        for id in due {
            match self.commit(AuditActor::System, id, OrderStatus::Cancelled) {
                Ok(()) => cancelled.push(id),
                Err(err) => tracing::warn!(order = %id, %err, "payment-timeout cancel failed"),
            }
        }
        if !cancelled.is_empty() {
            tracing::info!(count = cancelled.len(), "payment timeout sweep cancelled orders");
        }
        cancelled
    }

    /// Look up an order by id.
    pub fn get(&self, order_id: OrderId) -> Result<&Order> {
        self.orders
            .get(&order_id)
            .ok_or(TradepostError::OrderNotFound(order_id))
    }

    /// The order created by an accepting offer, if admitted.
    #[must_use]
    pub fn order_for_offer(&self, offer_id: OfferId) -> Option<OrderId> {
        self.offer_index.get(&offer_id).copied()
    }

    /// Number of orders tracked.
    #[must_use]
    pub fn count(&self) -> usize {
        self.orders.len()
    }

    /// The order transition audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Completion: the only transition that credits the ledger.
    fn complete(
        &mut self,
        book: &mut LedgerBook,
        notifier: &mut dyn NotificationService,
        actor: AuditActor,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let order = self.get(order_id)?;
        let (seller_id, amount) = (order.seller_id, order.amount);
        self.commit(actor, order_id, OrderStatus::Completed)?;

        let net = self.config.net_proceeds(amount);
        book.credit_pending(seller_id, net, now, self.config.clearance_delay());
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.completed_at = Some(now);
            order.credited_net = Some(net);
        }
        notifier.notify(
            seller_id,
            "order.completed",
            &serde_json::json!({ "order": order_id.to_string(), "net": net }),
        );
        Ok(net)
    }

    /// Commit a status transition, validating the source state under the
    /// same borrow that writes it: a concurrent conflicting transition
    /// fails here instead of overwriting.
    fn commit(&mut self, actor: AuditActor, order_id: OrderId, target: OrderStatus) -> Result<()> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(TradepostError::OrderNotFound(order_id))?;
        if !order.status.can_transition_to(target) {
            return Err(TradepostError::OrderTransitionInvalid {
                from: order.status,
                to: target,
            });
        }
        let previous = order.status;
        order.status = target;
        self.audit
            .record(AuditEntity::Order, order_id, previous, target, actor);
        tracing::info!(order = %order_id, %previous, new = %target, %actor, "order transition");
        Ok(())
    }
}

/// Re-create an order value for an accepted offer. Used when the offer
/// engine and escrow engine are wired through a queue rather than a
/// direct call and the handoff must be reconstructed.
#[must_use]
pub fn order_from_offer(
    offer: &Offer,
    seller_id: UserId,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Order {
    Order {
        id: OrderId::new(),
        listing_id: offer.listing_id,
        buyer_id: offer.buyer_id,
        seller_id,
        origin_offer_id: Some(offer.id),
        amount: offer.effective_amount(),
        status: OrderStatus::PendingPayment,
        payment_ref: None,
        revisions: 0,
        max_revisions: config.max_revisions,
        delivery_files: Vec::new(),
        delivery_message: None,
        credited_net: None,
        reconciliation_note: None,
        created_at: now,
        paid_at: None,
        delivered_at: None,
        completed_at: None,
    }
}

/// Deterministic idempotency key for intent creation.
fn intent_key(order_id: OrderId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tradepost:intent:v1:");
    hasher.update(order_id.0.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

fn ensure_seller(order: &Order, actor: Actor) -> Result<()> {
    if actor.is_admin() || actor.id == order.seller_id {
        return Ok(());
    }
    if order.is_party(actor.id) {
        return Err(TradepostError::Forbidden {
            reason: "only the seller may perform this action".to_string(),
        });
    }
    Err(TradepostError::NotOrderParty(order.id))
}

fn ensure_buyer(order: &Order, actor: Actor) -> Result<()> {
    if actor.is_admin() || actor.id == order.buyer_id {
        return Ok(());
    }
    if order.is_party(actor.id) {
        return Err(TradepostError::Forbidden {
            reason: "only the buyer may perform this action".to_string(),
        });
    }
    Err(TradepostError::NotOrderParty(order.id))
}
