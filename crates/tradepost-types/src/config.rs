//! Engine policy configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Policy knobs for the transaction engine. One immutable instance is
/// built at startup and shared by the market, escrow, and ledger crates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Offer negotiation horizon in days.
    pub offer_ttl_days: i64,
    /// Offers above `listing price * multiplier` are rejected.
    pub offer_ceiling_multiplier: i64,
    /// Platform fee retained from seller proceeds, in basis points.
    pub platform_fee_bps: i64,
    /// Minimum withdrawal amount in minor units.
    pub min_withdrawal: i64,
    /// Hours before pending proceeds mature into the available balance.
    pub clearance_hours: i64,
    /// Hours after delivery before automatic buyer acceptance.
    pub auto_accept_hours: i64,
    /// Hours an order may sit unpaid before the sweep cancels it.
    pub payment_timeout_hours: i64,
    /// Revision allowance for new orders.
    pub max_revisions: u32,
    /// Capacity of the payment idempotency index.
    pub payment_index_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_ttl_days: constants::DEFAULT_OFFER_TTL_DAYS,
            offer_ceiling_multiplier: constants::DEFAULT_OFFER_CEILING_MULTIPLIER,
            platform_fee_bps: constants::DEFAULT_PLATFORM_FEE_BPS,
            min_withdrawal: constants::DEFAULT_MIN_WITHDRAWAL,
            clearance_hours: constants::DEFAULT_CLEARANCE_HOURS,
            auto_accept_hours: constants::DEFAULT_AUTO_ACCEPT_HOURS,
            payment_timeout_hours: constants::DEFAULT_PAYMENT_TIMEOUT_HOURS,
            max_revisions: constants::DEFAULT_MAX_REVISIONS,
            payment_index_capacity: constants::PAYMENT_INDEX_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Offer expiry horizon as a duration.
    #[must_use]
    pub fn offer_ttl(&self) -> Duration {
        Duration::days(self.offer_ttl_days)
    }

    /// Clearance delay as a duration.
    #[must_use]
    pub fn clearance_delay(&self) -> Duration {
        Duration::hours(self.clearance_hours)
    }

    /// Auto-acceptance window as a duration.
    #[must_use]
    pub fn auto_accept_window(&self) -> Duration {
        Duration::hours(self.auto_accept_hours)
    }

    /// Payment timeout as a duration.
    #[must_use]
    pub fn payment_timeout(&self) -> Duration {
        Duration::hours(self.payment_timeout_hours)
    }

    /// The maximum acceptable offer amount for a listing price.
    #[must_use]
    pub fn offer_ceiling(&self, listing_price: i64) -> i64 {
        listing_price.saturating_mul(self.offer_ceiling_multiplier)
    }

    /// Platform fee for an order amount, rounded down.
    #[must_use]
    pub fn platform_fee(&self, amount: i64) -> i64 {
        amount * self.platform_fee_bps / constants::BPS_DENOMINATOR
    }

    /// Seller proceeds after the platform fee.
    #[must_use]
    pub fn net_proceeds(&self, amount: i64) -> i64 {
        amount - self.platform_fee(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.offer_ttl_days, 7);
        assert_eq!(cfg.offer_ceiling_multiplier, 3);
        assert_eq!(cfg.min_withdrawal, 500);
        assert_eq!(cfg.max_revisions, 2);
    }

    #[test]
    fn offer_ceiling_is_multiple_of_price() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.offer_ceiling(100), 300);
        assert_eq!(cfg.offer_ceiling(0), 0);
    }

    #[test]
    fn fee_arithmetic() {
        let cfg = EngineConfig::default();
        // 5% of 10_000 minor units.
        assert_eq!(cfg.platform_fee(10_000), 500);
        assert_eq!(cfg.net_proceeds(10_000), 9_500);
        // Rounds down on odd amounts.
        assert_eq!(cfg.platform_fee(101), 5);
        assert_eq!(cfg.net_proceeds(101), 96);
    }

    #[test]
    fn fee_of_zero_is_zero() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.platform_fee(0), 0);
        assert_eq!(cfg.net_proceeds(0), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.platform_fee_bps, back.platform_fee_bps);
        assert_eq!(cfg.clearance_hours, back.clearance_hours);
    }
}
