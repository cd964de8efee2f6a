//! External collaborator traits.
//!
//! The engine calls payments, identity, and notifications through these
//! narrow seams and expects nothing beyond the declared shapes. Real
//! adapters live outside this workspace; the in-memory doubles behind
//! `test-helpers` are what the test suites wire in.

use serde_json::Value;

use crate::{Account, PaymentRef, Result, TransferId, UserId};

/// Payment capture and payout transfers.
///
/// Intent creation and transfers are naturally retryable: both take an
/// idempotency key so a retried call cannot double-charge or double-pay.
pub trait PaymentGateway {
    /// Create a payment intent for an order. Returns the gateway reference
    /// the success notification will later be keyed on.
    fn create_intent(
        &mut self,
        amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<PaymentRef>;

    /// Whether the seller's gateway account can receive payouts.
    fn payout_capable(&self, seller_id: UserId) -> bool;

    /// Execute a payout transfer to the seller.
    fn transfer(
        &mut self,
        seller_id: UserId,
        amount: i64,
        idempotency_key: &str,
    ) -> Result<TransferId>;
}

/// Account lookups for the lazy capability re-checks in the guard layer.
pub trait IdentityStore {
    fn find_by_id(&self, id: UserId) -> Option<Account>;
}

/// Fire-and-forget notification delivery. The engine never blocks on or
/// fails because of delivery; implementations swallow their own errors.
pub trait NotificationService {
    fn notify(&mut self, user_id: UserId, event: &str, payload: &Value);
}

// ---------------------------------------------------------------------------
// In-memory doubles for tests
// ---------------------------------------------------------------------------

/// Test doubles. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub mod doubles {
    use std::collections::{HashMap, HashSet};

    use serde_json::Value;

    use crate::{Account, PaymentRef, Result, TradepostError, TransferId, UserId};

    /// In-memory gateway: mints sequential references, tracks payout
    /// capability per seller, and can be told to fail transfers.
    #[derive(Debug, Default)]
    pub struct MemoryGateway {
        next_ref: u64,
        pub payout_capable: HashSet<UserId>,
        pub fail_transfers: bool,
        /// (seller, amount, idempotency key) per attempted transfer.
        pub transfers: Vec<(UserId, i64, String)>,
    }

    impl MemoryGateway {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn enable_payouts(&mut self, seller_id: UserId) {
            self.payout_capable.insert(seller_id);
        }
    }

    impl super::PaymentGateway for MemoryGateway {
        fn create_intent(
            &mut self,
            _amount: i64,
            _currency: &str,
            idempotency_key: &str,
        ) -> Result<PaymentRef> {
            self.next_ref += 1;
            Ok(PaymentRef::new(format!(
                "pi_{}_{idempotency_key}",
                self.next_ref
            )))
        }

        fn payout_capable(&self, seller_id: UserId) -> bool {
            self.payout_capable.contains(&seller_id)
        }

        fn transfer(
            &mut self,
            seller_id: UserId,
            amount: i64,
            idempotency_key: &str,
        ) -> Result<TransferId> {
            self.transfers
                .push((seller_id, amount, idempotency_key.to_string()));
            if self.fail_transfers {
                return Err(TradepostError::TransferFailed {
                    reason: "simulated gateway outage".to_string(),
                });
            }
            Ok(TransferId::new(format!("tr_{}", self.transfers.len())))
        }
    }

    /// In-memory identity store.
    #[derive(Debug, Default)]
    pub struct MemoryIdentityStore {
        accounts: HashMap<UserId, Account>,
    }

    impl MemoryIdentityStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, account: Account) {
            self.accounts.insert(account.id, account);
        }

        pub fn deactivate(&mut self, id: UserId) {
            if let Some(account) = self.accounts.get_mut(&id) {
                account.deactivate();
            }
        }
    }

    impl super::IdentityStore for MemoryIdentityStore {
        fn find_by_id(&self, id: UserId) -> Option<Account> {
            self.accounts.get(&id).cloned()
        }
    }

    /// Notifier that records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Vec<(UserId, String, Value)>,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn events_for(&self, user_id: UserId) -> Vec<&str> {
            self.sent
                .iter()
                .filter(|(u, _, _)| *u == user_id)
                .map(|(_, e, _)| e.as_str())
                .collect()
        }
    }

    impl super::NotificationService for RecordingNotifier {
        fn notify(&mut self, user_id: UserId, event: &str, payload: &Value) {
            self.sent.push((user_id, event.to_string(), payload.clone()));
        }
    }
}
