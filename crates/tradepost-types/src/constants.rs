//! System-wide constants for the TradePost transaction engine.

/// Basis-point denominator for fee arithmetic.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Default offer negotiation horizon in days.
pub const DEFAULT_OFFER_TTL_DAYS: i64 = 7;

/// Default offer ceiling as a multiple of the listing price
/// (fraud / fat-finger guard).
pub const DEFAULT_OFFER_CEILING_MULTIPLIER: i64 = 3;

/// Default platform fee in basis points (500 = 5%).
pub const DEFAULT_PLATFORM_FEE_BPS: i64 = 500;

/// Default minimum withdrawal amount in minor units.
pub const DEFAULT_MIN_WITHDRAWAL: i64 = 500;

/// Default clearance delay before pending proceeds become available, in hours.
pub const DEFAULT_CLEARANCE_HOURS: i64 = 72;

/// Default window after delivery before automatic acceptance, in hours.
pub const DEFAULT_AUTO_ACCEPT_HOURS: i64 = 72;

/// Default window an order may sit in `pending_payment` before the
/// sweep cancels it, in hours.
pub const DEFAULT_PAYMENT_TIMEOUT_HOURS: i64 = 24;

/// Default revision allowance per order.
pub const DEFAULT_MAX_REVISIONS: u32 = 2;

/// Payment idempotency index capacity (number of references to remember).
pub const PAYMENT_INDEX_CAPACITY: usize = 500_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TradePost";
