//! Payment idempotency index.
//!
//! Payment-success notifications are keyed by their gateway reference:
//! the first notification for a reference applies the
//! `pending_payment -> paid` transition, every later one is a no-op
//! returning the same order. The index is bounded with oldest-first
//! eviction so memory stays predictable in long-running processes.

use std::collections::{HashMap, VecDeque};

use tradepost_types::{OrderId, PaymentRef};

/// Bounded map of applied payment references.
pub struct PaymentIndex {
    /// References already applied, with the order they settled.
    applied: HashMap<PaymentRef, OrderId>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<PaymentRef>,
    /// Maximum number of entries before eviction kicks in.
    max_size: usize,
}

impl PaymentIndex {
    /// Create a new index with the given maximum cache size.
    ///
    /// # Panics
    /// Panics if `max_size` is zero.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "PaymentIndex max_size must be > 0");
        Self {
            applied: HashMap::with_capacity(max_size.min(4096)),
            order: VecDeque::with_capacity(max_size.min(4096)),
            max_size,
        }
    }

    /// Record a reference as applied to an order. Returns the previously
    /// recorded order if the reference was already applied (duplicate
    /// notification); the caller then skips the transition.
    pub fn record(&mut self, payment_ref: &PaymentRef, order_id: OrderId) -> Option<OrderId> {
        if let Some(&existing) = self.applied.get(payment_ref) {
            return Some(existing);
        }

        if self.applied.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.applied.remove(&oldest);
            }
        }

        self.applied.insert(payment_ref.clone(), order_id);
        self.order.push_back(payment_ref.clone());
        None
    }

    /// The order a reference settled, if it was applied.
    #[must_use]
    pub fn order_for(&self, payment_ref: &PaymentRef) -> Option<OrderId> {
        self.applied.get(payment_ref).copied()
    }

    /// Number of references currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
