//! End-to-end integration tests across the whole transaction engine.
//!
//! These tests exercise the full marketplace lifecycle:
//! Auth -> Listing Registry -> Offer Engine -> Escrow Engine -> Ledger
//!
//! They verify that the components work together correctly in realistic
//! scenarios: negotiation, payment capture, delivery and acceptance,
//! ledger conservation, withdrawal processing, and the conflict paths.

use chrono::{DateTime, Duration, Utc};

use tradepost_auth::{AuthContext, RoleTable, TokenResolver, check_ownership_batch, require_seller};
use tradepost_escrow::{DisputeResolution, EscrowEngine};
use tradepost_ledger::{ConservationChecker, LedgerBook, PayoutEngine};
use tradepost_market::{ListingRegistry, OfferEngine};
use tradepost_types::collaborators::doubles::{
    MemoryGateway, MemoryIdentityStore, RecordingNotifier,
};
use tradepost_types::{
    Account, Actor, EngineConfig, ErrorKind, ListingId, ListingStatus, OfferId, OrderId,
    OrderStatus, Role, TradepostError, UserId, UserType, WithdrawalStatus,
};

/// Helper: the full engine stack wired together.
struct Marketplace {
    config: EngineConfig,
    listings: ListingRegistry,
    offers: OfferEngine,
    escrow: EscrowEngine,
    book: LedgerBook,
    payouts: PayoutEngine,
    conservation: ConservationChecker,
    gateway: MemoryGateway,
    notifier: RecordingNotifier,
    seller: Actor,
    buyer: Actor,
}

impl Marketplace {
    fn new() -> Self {
        let config = EngineConfig::default();
        let seller = Actor::new(UserId::new(), Role::Seller);
        let buyer = Actor::new(UserId::new(), Role::Buyer);
        let mut gateway = MemoryGateway::new();
        gateway.enable_payouts(seller.id);
        Self {
            listings: ListingRegistry::new(),
            offers: OfferEngine::new(config.clone()),
            escrow: EscrowEngine::new(config.clone()),
            book: LedgerBook::new(),
            payouts: PayoutEngine::new(config.clone()),
            conservation: ConservationChecker::new(),
            gateway,
            notifier: RecordingNotifier::new(),
            seller,
            buyer,
            config,
        }
    }

    fn list(&mut self, price: i64) -> ListingId {
        self.listings
            .create(self.seller, "Site template", "template", price, true)
            .expect("listing creation should succeed")
    }

    fn offer(&mut self, listing: ListingId, amount: i64, now: DateTime<Utc>) -> OfferId {
        self.offers
            .create(&self.listings, self.buyer, listing, amount, "deal?", now)
            .expect("offer creation should succeed")
    }

    fn accept_offer(&mut self, offer: OfferId, now: DateTime<Utc>) -> OrderId {
        let order = self
            .offers
            .accept(&self.listings, self.seller, offer, now)
            .expect("accept should succeed");
        self.escrow.admit(order).expect("admission should succeed")
    }

    fn pay(&mut self, order: OrderId, now: DateTime<Utc>) {
        let payment_ref = self
            .escrow
            .create_intent(&mut self.gateway, order, "USD")
            .expect("intent creation should succeed");
        self.escrow
            .confirm_payment(&mut self.listings, &mut self.notifier, &payment_ref, now)
            .expect("payment confirmation should succeed");
    }

    fn deliver(&mut self, order: OrderId, now: DateTime<Utc>) {
        self.escrow
            .start_progress(self.seller, order)
            .expect("start should succeed");
        self.escrow
            .deliver(
                &mut self.notifier,
                self.seller,
                order,
                "final build attached",
                vec!["att://deliveries/final.zip".to_string()],
                now,
            )
            .expect("delivery should succeed");
    }

    fn accept_delivery(&mut self, order: OrderId, now: DateTime<Utc>) -> i64 {
        let net = self
            .escrow
            .accept_delivery(&mut self.book, &mut self.notifier, self.buyer, order, now)
            .expect("acceptance should succeed");
        self.conservation.record_credit(self.seller.id, net);
        net
    }

    /// The conservation law must hold at every observed instant.
    fn assert_conserved(&self) {
        let account = self.book.account(self.seller.id);
        let reserved = self.book.reserved_for(self.seller.id);
        self.conservation
            .verify(&account, reserved)
            .expect("ledger conservation must hold");
    }
}

// =============================================================================
// Scenario: negotiate, pay, deliver, accept, proceeds credited
// =============================================================================
#[test]
fn e2e_negotiated_sale() {
    let mut m = Marketplace::new();
    let now = Utc::now();

    // Listing priced 10_000; buyer offers 8_000.
    let listing = m.list(10_000);
    let offer = m.offer(listing, 8_000, now);

    // Seller accepts: offer ACCEPTED, order PENDING_PAYMENT at 8_000.
    let order = m.accept_offer(offer, now);
    assert_eq!(m.offers.get(offer).unwrap().status.to_string(), "ACCEPTED");
    let o = m.escrow.get(order).unwrap();
    assert_eq!(o.status, OrderStatus::PendingPayment);
    assert_eq!(o.amount, 8_000);

    // Payment lands: order PAID, listing SOLD.
    m.pay(order, now);
    assert_eq!(m.escrow.get(order).unwrap().status, OrderStatus::Paid);
    assert_eq!(m.listings.get(listing).unwrap().status, ListingStatus::Sold);

    // Deliver with one attachment, buyer accepts.
    m.deliver(order, now);
    assert_eq!(m.escrow.get(order).unwrap().status, OrderStatus::Delivered);
    let net = m.accept_delivery(order, now);

    // Seller's pending balance grows by the amount minus the 5% fee.
    assert_eq!(net, 7_600);
    let acct = m.book.account(m.seller.id);
    assert_eq!(acct.pending, 7_600);
    assert_eq!(acct.available, 0);
    m.assert_conserved();

    // After the clearance delay the proceeds become withdrawable.
    m.book.sweep_matured(now + m.config.clearance_delay());
    let acct = m.book.account(m.seller.id);
    assert_eq!(acct.available, 7_600);
    assert_eq!(acct.pending, 0);
    m.assert_conserved();
}

// =============================================================================
// Scenario: offer on a sold listing conflicts
// =============================================================================
#[test]
fn e2e_offer_on_sold_listing_conflicts() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);

    // Another buyer buys outright and pays.
    let other = Actor::new(UserId::new(), Role::Buyer);
    let order = m
        .escrow
        .buy_now(&m.listings, other, listing, now)
        .unwrap();
    m.pay(order, now);

    // A late offer hits the sold listing.
    let err = m
        .offers
        .create(&m.listings, m.buyer, listing, 8_000, "", now)
        .unwrap_err();
    assert!(matches!(err, TradepostError::ListingSold(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// =============================================================================
// Scenario: accept racing a buy-now payment loses cleanly
// =============================================================================
#[test]
fn e2e_accept_loses_race_against_direct_sale() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    let offer = m.offer(listing, 8_000, now);

    // A direct purchase pays while the offer sits open.
    let other = Actor::new(UserId::new(), Role::Buyer);
    let direct = m.escrow.buy_now(&m.listings, other, listing, now).unwrap();
    m.pay(direct, now);

    // The seller's accept now fails with a conflict instead of creating
    // a second order for the same single-unit listing.
    let err = m
        .offers
        .accept(&m.listings, m.seller, offer, now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// =============================================================================
// Scenario: duplicate payment callbacks settle exactly once
// =============================================================================
#[test]
fn e2e_duplicate_payment_callback_is_idempotent() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    let order = m.escrow.buy_now(&m.listings, m.buyer, listing, now).unwrap();
    let payment_ref = m.escrow.create_intent(&mut m.gateway, order, "USD").unwrap();

    let first = m
        .escrow
        .confirm_payment(&mut m.listings, &mut m.notifier, &payment_ref, now)
        .unwrap();
    let second = m
        .escrow
        .confirm_payment(&mut m.listings, &mut m.notifier, &payment_ref, now)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(m.escrow.get(order).unwrap().status, OrderStatus::Paid);
    // One paid event per party, not two.
    assert_eq!(m.notifier.events_for(m.buyer.id), vec!["order.paid"]);
}

// =============================================================================
// Scenario: one open offer per (buyer, listing)
// =============================================================================
#[test]
fn e2e_single_open_offer_invariant() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    m.offer(listing, 8_000, now);

    let err = m
        .offers
        .create(&m.listings, m.buyer, listing, 9_000, "", now)
        .unwrap_err();
    assert!(matches!(err, TradepostError::OpenOfferExists { .. }));
    assert_eq!(m.offers.open_count(), 1);
}

// =============================================================================
// Scenario: revision allowance is a hard bound
// =============================================================================
#[test]
fn e2e_revision_bound_holds() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    let order = m.escrow.buy_now(&m.listings, m.buyer, listing, now).unwrap();
    m.pay(order, now);
    m.deliver(order, now);

    let max = m.config.max_revisions;
    for _ in 0..max {
        m.escrow.request_revision(m.buyer, order).unwrap();
        m.escrow
            .deliver(
                &mut m.notifier,
                m.seller,
                order,
                "revised",
                vec!["att://deliveries/rev.zip".to_string()],
                now,
            )
            .unwrap();
    }

    let err = m.escrow.request_revision(m.buyer, order).unwrap_err();
    assert!(matches!(err, TradepostError::RevisionLimitReached { .. }));
    let o = m.escrow.get(order).unwrap();
    assert_eq!(o.revisions, max);
    assert!(o.revisions <= o.max_revisions);
}

// =============================================================================
// Scenario: over-balance withdrawal conflicts without mutation
// =============================================================================
#[test]
fn e2e_over_balance_withdrawal_conflicts() {
    let mut m = Marketplace::new();
    let now = Utc::now();

    // Seller has 500 available.
    m.book.credit_pending(m.seller.id, 500, now, Duration::zero());
    m.book.sweep_matured(now);
    m.conservation.record_credit(m.seller.id, 500);

    let err = m
        .payouts
        .request_withdrawal(&mut m.book, &m.gateway, m.seller, 1_000, now)
        .unwrap_err();
    assert!(matches!(err, TradepostError::InsufficientAvailable { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Balance unchanged, conservation intact.
    assert_eq!(m.book.account(m.seller.id).available, 500);
    m.assert_conserved();
}

// =============================================================================
// Scenario: full withdrawal lifecycle, success and failure
// =============================================================================
#[test]
fn e2e_withdrawal_lifecycle() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    let order = m.escrow.buy_now(&m.listings, m.buyer, listing, now).unwrap();
    m.pay(order, now);
    m.deliver(order, now);
    m.accept_delivery(order, now);
    m.book.sweep_matured(now + m.config.clearance_delay());

    // Request reserves atomically; conservation holds mid-flight.
    let id = m
        .payouts
        .request_withdrawal(&mut m.book, &m.gateway, m.seller, 6_000, now)
        .unwrap();
    assert_eq!(m.book.account(m.seller.id).available, 1_600);
    m.assert_conserved();

    // First processing attempt: gateway outage, balance restored.
    m.gateway.fail_transfers = true;
    let status = m
        .payouts
        .process(&mut m.book, &mut m.gateway, id, now)
        .unwrap();
    assert_eq!(status, WithdrawalStatus::Failed);
    assert_eq!(m.book.account(m.seller.id).available, 7_600);
    m.assert_conserved();

    // A fresh request succeeds once the gateway recovers.
    m.gateway.fail_transfers = false;
    let id = m
        .payouts
        .request_withdrawal(&mut m.book, &m.gateway, m.seller, 6_000, now)
        .unwrap();
    let status = m
        .payouts
        .process(&mut m.book, &mut m.gateway, id, now)
        .unwrap();
    assert_eq!(status, WithdrawalStatus::Completed);

    let acct = m.book.account(m.seller.id);
    assert_eq!(acct.available, 1_600);
    assert_eq!(acct.total_withdrawn, 6_000);
    m.assert_conserved();
}

// =============================================================================
// Scenario: chargeback after withdrawal parks for reconciliation
// =============================================================================
#[test]
fn e2e_chargeback_after_withdrawal_needs_reconciliation() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    let order = m.escrow.buy_now(&m.listings, m.buyer, listing, now).unwrap();
    m.pay(order, now);
    m.deliver(order, now);
    m.accept_delivery(order, now);

    // Everything matures and is withdrawn.
    m.book.sweep_matured(now + m.config.clearance_delay());
    let id = m
        .payouts
        .request_withdrawal(&mut m.book, &m.gateway, m.seller, 7_600, now)
        .unwrap();
    m.payouts.process(&mut m.book, &mut m.gateway, id, now).unwrap();

    // Payment reversal: refund cannot silently drive the books negative.
    let admin = Actor::new(UserId::new(), Role::Admin);
    m.escrow.dispute(admin, order).unwrap();
    let err = m
        .escrow
        .resolve_dispute(&mut m.book, &mut m.notifier, admin, order, DisputeResolution::Refund)
        .unwrap_err();
    assert!(matches!(err, TradepostError::RefundAfterWithdrawal { .. }));
    assert!(m.escrow.get(order).unwrap().reconciliation_note.is_some());
    m.assert_conserved();
}

// =============================================================================
// Scenario: credential -> guard chain -> ownership, end to end
// =============================================================================
#[test]
fn e2e_auth_guards_protect_listings() {
    let mut m = Marketplace::new();
    let listing = m.list(10_000);

    let resolver = TokenResolver::new_hs256([7u8; 32], "tradepost").unwrap();
    let table = RoleTable::standard();

    // The seller's own credential passes role and ownership checks.
    let token = resolver
        .issue(m.seller.id, Role::Seller, "seller@example.com")
        .unwrap();
    let ctx = resolver.resolve(&token).unwrap();
    table.authorize(&ctx, &[Role::Seller]).unwrap();
    let owner_id = m.listings.get(listing).unwrap().owner_id;
    check_ownership_batch(&ctx, &[(listing.to_string(), owner_id)]).unwrap();

    // A different seller fails ownership with the offending id reported,
    // and nothing about the listing changes.
    let intruder_token = resolver
        .issue(UserId::new(), Role::Seller, "other@example.com")
        .unwrap();
    let intruder = resolver.resolve(&intruder_token).unwrap();
    let err = check_ownership_batch(&intruder, &[(listing.to_string(), owner_id)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    match err {
        TradepostError::OwnershipDenied { failed_ids } => {
            assert_eq!(failed_ids, vec![listing.to_string()]);
        }
        other => panic!("expected OwnershipDenied, got {other:?}"),
    }
    assert_eq!(m.listings.get(listing).unwrap().status, ListingStatus::Active);

    // An anonymous caller is unauthenticated, not forbidden.
    let anon = AuthContext::anonymous();
    let err = table.authorize(&anon, &[Role::Seller]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

// =============================================================================
// Scenario: capability fallback consults the identity store
// =============================================================================
#[test]
fn e2e_capability_fallback_blocks_deactivated_account() {
    let resolver = TokenResolver::new_hs256([7u8; 32], "tradepost").unwrap();

    // A coarse `user` credential for a seller-capable account.
    let user_id = UserId::new();
    let mut store = MemoryIdentityStore::new();
    store.insert(Account::new(user_id, Role::User, UserType::Seller, "u@example.com"));

    let token = resolver.issue(user_id, Role::User, "u@example.com").unwrap();
    let ctx = resolver.resolve(&token).unwrap();
    require_seller(&ctx, &store).unwrap();

    // Deactivation takes effect on the next store-backed check.
    store.deactivate(user_id);
    let err = require_seller(&ctx, &store).unwrap_err();
    assert!(matches!(err, TradepostError::AccountDeactivated));
}

// =============================================================================
// Scenario: expiry sweep and auto-accept keep the system moving
// =============================================================================
#[test]
fn e2e_sweeps() {
    let mut m = Marketplace::new();
    let now = Utc::now();
    let listing = m.list(10_000);
    m.offer(listing, 8_000, now);

    // The offer expires after its 7-day horizon.
    let swept = m.offers.sweep_expired(now + Duration::days(8));
    assert_eq!(swept, 1);
    assert_eq!(m.offers.open_count(), 0);

    // A delivered order completes on its own after the acceptance window.
    let order = m.escrow.buy_now(&m.listings, m.buyer, listing, now).unwrap();
    m.pay(order, now);
    m.deliver(order, now);
    let completed = m.escrow.sweep_auto_accept(
        &mut m.book,
        &mut m.notifier,
        now + m.config.auto_accept_window(),
    );
    assert_eq!(completed, vec![order]);
    m.conservation.record_credit(m.seller.id, 7_600);
    m.assert_conserved();

    // An unpaid order is cancelled after the payment timeout.
    let second_listing = m.list(5_000);
    let stale = m
        .escrow
        .buy_now(&m.listings, m.buyer, second_listing, now)
        .unwrap();
    let cancelled = m.escrow.sweep_payment_timeout(now + Duration::hours(25));
    assert_eq!(cancelled, vec![stale]);
    assert_eq!(m.escrow.get(stale).unwrap().status, OrderStatus::Cancelled);
    // The listing is still purchasable.
    assert!(m.listings.get(second_listing).unwrap().is_purchasable());
}
