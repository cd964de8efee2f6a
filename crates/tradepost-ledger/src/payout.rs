//! Withdrawal request processing.
//!
//! `request_withdrawal` validates policy and atomically reserves the
//! amount out of the available balance in the same operation that
//! records the request: there is no window where the balance is
//! spendable twice. The external transfer runs afterwards, against a
//! request already in `processing`, so a slow gateway call never holds
//! the ledger.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use tradepost_types::{
    Actor, AuditActor, AuditEntity, AuditTrail, EngineConfig, PaymentGateway, Result,
    TradepostError, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};

use crate::book::LedgerBook;

/// Drives withdrawal requests from creation through settlement.
pub struct PayoutEngine {
    config: EngineConfig,
    withdrawals: HashMap<WithdrawalId, WithdrawalRequest>,
    audit: AuditTrail,
}

impl PayoutEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            withdrawals: HashMap::new(),
            audit: AuditTrail::new(),
        }
    }

    /// Create a withdrawal request, reserving the amount atomically.
    ///
    /// # Errors
    /// - `WithdrawalBelowMinimum` / `PayoutNotEnabled` on policy failures
    /// - `InsufficientAvailable` when the balance cannot cover the amount;
    ///   the balance is unchanged
    pub fn request_withdrawal(
        &mut self,
        book: &mut LedgerBook,
        gateway: &dyn PaymentGateway,
        seller: Actor,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalId> {
        if amount < self.config.min_withdrawal {
            return Err(TradepostError::WithdrawalBelowMinimum {
                amount,
                minimum: self.config.min_withdrawal,
            });
        }
        if !gateway.payout_capable(seller.id) {
            return Err(TradepostError::PayoutNotEnabled(seller.id));
        }

        // Reserve and record in one step; the reserve is the commit point.
        book.reserve(seller.id, amount)?;
        let request = WithdrawalRequest {
            id: WithdrawalId::new(),
            seller_id: seller.id,
            amount,
            status: WithdrawalStatus::Pending,
            transfer_id: None,
            requested_at: now,
            settled_at: None,
        };
        let id = request.id;
        self.withdrawals.insert(id, request);
        tracing::info!(withdrawal = %id, seller = %seller.id, amount, "withdrawal requested");
        Ok(id)
    }

    /// Process a pending request: move it to `processing`, run the
    /// external transfer, then settle to `completed` or `failed`.
    ///
    /// The request leaves `pending` before the gateway call, so a
    /// concurrent processor picking the same id loses on the transition
    /// and the transfer runs exactly once. A failed transfer restores
    /// the reserved amount to the available balance.
    pub fn process(
        &mut self,
        book: &mut LedgerBook,
        gateway: &mut dyn PaymentGateway,
        id: WithdrawalId,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalStatus> {
        let request = self
            .withdrawals
            .get_mut(&id)
            .ok_or(TradepostError::WithdrawalNotFound(id))?;

        if !request.status.can_transition_to(WithdrawalStatus::Processing) {
            return Err(TradepostError::WithdrawalTransitionInvalid {
                from: request.status,
                action: "process",
            });
        }
        request.status = WithdrawalStatus::Processing;
        self.audit.record(
            AuditEntity::Withdrawal,
            id,
            WithdrawalStatus::Pending,
            WithdrawalStatus::Processing,
            AuditActor::System,
        );

        let (seller_id, amount) = (request.seller_id, request.amount);
        let key = transfer_key(id);
        let outcome = gateway.transfer(seller_id, amount, &key);

        let request = self
            .withdrawals
            .get_mut(&id)
            .ok_or(TradepostError::WithdrawalNotFound(id))?;
        let settled = match outcome {
            Ok(transfer_id) => {
                request.transfer_id = Some(transfer_id);
                request.status = WithdrawalStatus::Completed;
                book.settle_withdrawn(seller_id, amount);
                WithdrawalStatus::Completed
            }
            Err(err) => {
                tracing::warn!(withdrawal = %id, %err, "transfer failed, restoring balance");
                request.status = WithdrawalStatus::Failed;
                book.restore(seller_id, amount);
                WithdrawalStatus::Failed
            }
        };
        request.settled_at = Some(now);
        self.audit.record(
            AuditEntity::Withdrawal,
            id,
            WithdrawalStatus::Processing,
            settled,
            AuditActor::System,
        );
        tracing::info!(withdrawal = %id, status = %settled, "withdrawal settled");
        Ok(settled)
    }

    /// Look up a withdrawal request.
    pub fn get(&self, id: WithdrawalId) -> Result<&WithdrawalRequest> {
        self.withdrawals
            .get(&id)
            .ok_or(TradepostError::WithdrawalNotFound(id))
    }

    /// Ids of requests awaiting processing, for the background worker.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<WithdrawalId> {
        let mut ids: Vec<WithdrawalId> = self
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .map(|w| w.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The withdrawal transition audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }
}

/// Deterministic idempotency key for the gateway transfer: a retried
/// call for the same request always carries the same key.
#[must_use]
pub fn transfer_key(id: WithdrawalId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tradepost:payout:v1:");
    hasher.update(id.0.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
