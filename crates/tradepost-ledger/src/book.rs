//! The seller ledger book.
//!
//! Tracks per-seller balances with available/pending/withdrawn
//! accounting. All mutations are atomic: either the full operation
//! succeeds or the balance is unchanged. Proceeds enter `pending` and
//! mature into `available` after the clearance delay; withdrawals
//! reserve out of `available` before any external transfer is attempted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use tradepost_types::{LedgerAccount, OrderId, Result, TradepostError, UserId};

/// A scheduled pending-to-available move.
#[derive(Debug, Clone)]
struct Maturation {
    seller_id: UserId,
    amount: i64,
    available_at: DateTime<Utc>,
}

/// Source of truth for all seller balance state.
///
/// The escrow engine credits it on order completion; the payout engine
/// debits it through the reserve/settle/restore cycle. No user action
/// mutates it directly.
pub struct LedgerBook {
    accounts: HashMap<UserId, LedgerAccount>,
    /// Pending credits waiting out the clearance delay, in schedule order.
    maturations: Vec<Maturation>,
    /// Amounts reserved by in-flight withdrawal requests, per seller.
    reserved: HashMap<UserId, i64>,
}

impl LedgerBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            maturations: Vec::new(),
            reserved: HashMap::new(),
        }
    }

    /// A consistent snapshot of the seller's account. All three figures
    /// come from the same read.
    #[must_use]
    pub fn account(&self, seller_id: UserId) -> LedgerAccount {
        self.accounts
            .get(&seller_id)
            .cloned()
            .unwrap_or_else(|| LedgerAccount::new(seller_id))
    }

    /// Total reserved by in-flight withdrawals for a seller.
    #[must_use]
    pub fn reserved_for(&self, seller_id: UserId) -> i64 {
        self.reserved.get(&seller_id).copied().unwrap_or(0)
    }

    /// Credit seller proceeds into `pending` and schedule their
    /// maturation after the clearance delay.
    pub fn credit_pending(
        &mut self,
        seller_id: UserId,
        amount: i64,
        now: DateTime<Utc>,
        clearance: Duration,
    ) {
        if amount <= 0 {
            return;
        }
        let entry = self
            .accounts
            .entry(seller_id)
            .or_insert_with(|| LedgerAccount::new(seller_id));
        entry.pending += amount;
        self.maturations.push(Maturation {
            seller_id,
            amount,
            available_at: now + clearance,
        });
        tracing::info!(seller = %seller_id, amount, "proceeds credited to pending");
    }

    /// Move every matured pending credit into `available`. Returns the
    /// total amount moved.
    pub fn sweep_matured(&mut self, now: DateTime<Utc>) -> i64 {
        let mut moved = 0;
        let mut remaining = Vec::with_capacity(self.maturations.len());
        for m in self.maturations.drain(..) {
            if m.available_at <= now {
                if let Some(entry) = self.accounts.get_mut(&m.seller_id) {
                    entry.pending -= m.amount;
                    entry.available += m.amount;
                    moved += m.amount;
                }
            } else {
                remaining.push(m);
            }
        }
        self.maturations = remaining;
        if moved > 0 {
            tracing::info!(moved, "clearance sweep matured pending proceeds");
        }
        moved
    }

    /// Reverse a previously posted credit (refund path). Debits `pending`
    /// first, then `available`.
    ///
    /// # Errors
    /// [`TradepostError::RefundAfterWithdrawal`] if the remaining credit
    /// cannot cover the reversal: the proceeds were already withdrawn.
    /// The balance is left untouched; the order must be flagged for
    /// manual reconciliation.
    pub fn reverse_credit(
        &mut self,
        seller_id: UserId,
        order_id: OrderId,
        amount: i64,
    ) -> Result<()> {
        let entry = match self.accounts.get_mut(&seller_id) {
            Some(e) if e.pending + e.available >= amount => e,
            other => {
                let have = other.map_or(0, |e| e.pending + e.available);
                tracing::warn!(
                    seller = %seller_id,
                    order = %order_id,
                    amount,
                    have,
                    "refund exceeds remaining credit, manual reconciliation required"
                );
                return Err(TradepostError::RefundAfterWithdrawal {
                    order: order_id,
                    shortfall: amount - have,
                });
            }
        };

        let from_pending = amount.min(entry.pending);
        entry.pending -= from_pending;
        entry.available -= amount - from_pending;

        // Cancel scheduled maturations covering the reversed pending
        // portion, oldest first, so the sweep cannot over-mature.
        let mut to_cancel = from_pending;
        for m in &mut self.maturations {
            if to_cancel == 0 {
                break;
            }
            if m.seller_id != seller_id {
                continue;
            }
            let cancelled = m.amount.min(to_cancel);
            m.amount -= cancelled;
            to_cancel -= cancelled;
        }
        self.maturations.retain(|m| m.amount > 0);

        tracing::info!(seller = %seller_id, order = %order_id, amount, "credit reversed");
        Ok(())
    }

    /// Atomically reserve `amount` out of the available balance for a
    /// withdrawal. Either the full amount moves out of the spendable
    /// pool or nothing changes.
    ///
    /// # Errors
    /// [`TradepostError::InsufficientAvailable`] if available < amount.
    pub fn reserve(&mut self, seller_id: UserId, amount: i64) -> Result<()> {
        let entry = self
            .accounts
            .get_mut(&seller_id)
            .ok_or(TradepostError::InsufficientAvailable {
                requested: amount,
                available: 0,
            })?;

        if entry.available < amount {
            return Err(TradepostError::InsufficientAvailable {
                requested: amount,
                available: entry.available,
            });
        }

        entry.available -= amount;
        *self.reserved.entry(seller_id).or_insert(0) += amount;
        Ok(())
    }

    /// Restore a reserved amount after a failed transfer.
    pub fn restore(&mut self, seller_id: UserId, amount: i64) {
        let entry = self
            .accounts
            .entry(seller_id)
            .or_insert_with(|| LedgerAccount::new(seller_id));
        entry.available += amount;
        if let Some(reserved) = self.reserved.get_mut(&seller_id) {
            *reserved -= amount.min(*reserved);
        }
    }

    /// Move a reserved amount into `total_withdrawn` after a confirmed
    /// transfer.
    pub fn settle_withdrawn(&mut self, seller_id: UserId, amount: i64) {
        let entry = self
            .accounts
            .entry(seller_id)
            .or_insert_with(|| LedgerAccount::new(seller_id));
        entry.total_withdrawn += amount;
        if let Some(reserved) = self.reserved.get_mut(&seller_id) {
            *reserved -= amount.min(*reserved);
        }
    }
}

impl Default for LedgerBook {
    fn default() -> Self {
        Self::new()
    }
}
