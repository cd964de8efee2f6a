//! Error types for the TradePost transaction engine.
//!
//! All errors use the `TP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authentication / authorization errors
//! - 2xx: Listing errors
//! - 3xx: Offer errors
//! - 4xx: Order / escrow errors
//! - 5xx: Ledger / payout errors
//! - 6xx: External collaborator errors
//! - 9xx: General / internal errors
//!
//! Every variant maps onto a coarse [`ErrorKind`] via [`TradepostError::kind`],
//! which is what a transport layer would translate into a status code.

use thiserror::Error;

use crate::{ListingId, OfferId, OfferStatus, OrderId, OrderStatus, UserId, WithdrawalId};

/// Coarse error taxonomy. Transport layers map these to status codes;
/// the engine itself only ever constructs the specific variants below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No credential, or the credential is expired/malformed/forged.
    Unauthenticated,
    /// Authenticated but lacking role, ownership, or capability.
    Forbidden,
    /// A resource id did not resolve.
    NotFound,
    /// Malformed input or an amount outside policy bounds.
    BadRequest,
    /// A state-machine transition from an unexpected source state, or a lost race.
    Conflict,
    /// A payment/payout collaborator failed.
    ExternalFailure,
    /// Unrecoverable internal error.
    Internal,
}

/// Central error enum for all TradePost operations.
#[derive(Debug, Error)]
pub enum TradepostError {
    // =================================================================
    // Authentication / Authorization Errors (1xx)
    // =================================================================
    /// No bearer credential was presented.
    #[error("TP_ERR_100: Credential missing")]
    MissingCredential,

    /// The credential is past its expiry.
    #[error("TP_ERR_101: Credential expired")]
    CredentialExpired,

    /// The credential is malformed, or its signature/issuer/audience do not match.
    #[error("TP_ERR_102: Invalid credential: {reason}")]
    InvalidCredential { reason: String },

    /// Authenticated but the role tier is insufficient.
    #[error("TP_ERR_103: Forbidden: {reason}")]
    Forbidden { reason: String },

    /// One or more resources are not owned by the caller. Carries the
    /// full set of failing ids, never just the first one.
    #[error("TP_ERR_104: Ownership check failed for: {}", failed_ids.join(", "))]
    OwnershipDenied { failed_ids: Vec<String> },

    /// The account exists but has been deactivated.
    #[error("TP_ERR_105: Account is deactivated")]
    AccountDeactivated,

    /// The account id did not resolve in the identity store.
    #[error("TP_ERR_106: Account not found: {0}")]
    AccountNotFound(UserId),

    /// A caller-supplied id is not a well-formed identifier.
    #[error("TP_ERR_107: Malformed identifier: {0}")]
    MalformedId(String),

    // =================================================================
    // Listing Errors (2xx)
    // =================================================================
    /// The requested listing was not found.
    #[error("TP_ERR_200: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing is not in `active` status.
    #[error("TP_ERR_201: Listing {listing} is {status}, not ACTIVE")]
    ListingNotActive {
        listing: ListingId,
        status: crate::ListingStatus,
    },

    /// The listing has already been sold. Terminal; no offers or purchases.
    #[error("TP_ERR_202: Listing already sold: {0}")]
    ListingSold(ListingId),

    /// The listing failed validation (non-positive price, etc.).
    #[error("TP_ERR_203: Invalid listing: {reason}")]
    InvalidListing { reason: String },

    // =================================================================
    // Offer Errors (3xx)
    // =================================================================
    /// The requested offer was not found.
    #[error("TP_ERR_300: Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// An open (pending/countered) offer already exists for this buyer and listing.
    #[error("TP_ERR_301: Open offer {offer} already exists for listing {listing}")]
    OpenOfferExists { listing: ListingId, offer: OfferId },

    /// A seller attempted to offer on their own listing.
    #[error("TP_ERR_302: Cannot offer on own listing: {0}")]
    OwnListingOffer(ListingId),

    /// The offer amount is outside policy bounds. Carries the computed ceiling.
    #[error("TP_ERR_303: Offer amount {amount} out of bounds (ceiling {ceiling})")]
    OfferAmountOutOfBounds { amount: i64, ceiling: i64 },

    /// The offer failed validation (non-positive amount, etc.).
    #[error("TP_ERR_304: Invalid offer: {reason}")]
    InvalidOffer { reason: String },

    /// The offer cannot take this action from its current status.
    #[error("TP_ERR_305: Offer cannot {action} from {from}")]
    OfferTransitionInvalid {
        from: OfferStatus,
        action: &'static str,
    },

    /// The offer is past its expiry horizon.
    #[error("TP_ERR_306: Offer expired: {0}")]
    OfferExpired(OfferId),

    // =================================================================
    // Order / Escrow Errors (4xx)
    // =================================================================
    /// The requested order was not found.
    #[error("TP_ERR_400: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order cannot transition from its current status to the target.
    #[error("TP_ERR_401: Order cannot transition {from} -> {to}")]
    OrderTransitionInvalid { from: OrderStatus, to: OrderStatus },

    /// An order already exists for this accepting offer (1:1 linkage).
    #[error("TP_ERR_402: Order {order} already exists for offer {offer}")]
    DuplicateOrderForOffer { offer: OfferId, order: OrderId },

    /// A payment-success notification referenced an intent the engine
    /// never created.
    #[error("TP_ERR_403: Unknown payment reference: {0}")]
    UnknownPaymentRef(crate::PaymentRef),

    /// Delivery requires a message and at least one attachment.
    #[error("TP_ERR_404: Delivery incomplete: {reason}")]
    DeliveryIncomplete { reason: String },

    /// The revision allowance is exhausted.
    #[error("TP_ERR_405: Revision limit reached: {revisions}/{max}")]
    RevisionLimitReached { revisions: u32, max: u32 },

    /// The caller is neither the order's buyer, its seller, nor an admin.
    #[error("TP_ERR_406: Caller is not a party to order {0}")]
    NotOrderParty(OrderId),

    // =================================================================
    // Ledger / Payout Errors (5xx)
    // =================================================================
    /// Not enough available balance for the requested operation.
    #[error("TP_ERR_500: Insufficient available balance: requested {requested}, have {available}")]
    InsufficientAvailable { requested: i64, available: i64 },

    /// The withdrawal amount is below the configured minimum.
    #[error("TP_ERR_501: Withdrawal {amount} below minimum {minimum}")]
    WithdrawalBelowMinimum { amount: i64, minimum: i64 },

    /// The seller's gateway account is not enabled for payouts.
    #[error("TP_ERR_502: Payouts not enabled for seller {0}")]
    PayoutNotEnabled(UserId),

    /// The withdrawal request was not found.
    #[error("TP_ERR_503: Withdrawal not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    /// The withdrawal cannot take this step from its current status.
    #[error("TP_ERR_504: Withdrawal cannot {action} from {from}")]
    WithdrawalTransitionInvalid {
        from: crate::WithdrawalStatus,
        action: &'static str,
    },

    /// The ledger conservation law no longer holds. Critical safety alert.
    #[error("TP_ERR_505: Ledger conservation violation: {reason}")]
    LedgerConservationViolation { reason: String },

    /// A refund was requested but the credited proceeds were already
    /// withdrawn. Flagged for manual reconciliation, never auto-corrected.
    #[error("TP_ERR_506: Refund for order {order} exceeds remaining credit by {shortfall}")]
    RefundAfterWithdrawal { order: OrderId, shortfall: i64 },

    // =================================================================
    // External Collaborator Errors (6xx)
    // =================================================================
    /// The payment gateway rejected or failed an operation.
    #[error("TP_ERR_600: Payment gateway failure: {reason}")]
    GatewayFailure { reason: String },

    /// The payout transfer failed at the gateway.
    #[error("TP_ERR_601: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TP_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl TradepostError {
    /// The coarse taxonomy bucket for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential | Self::CredentialExpired | Self::InvalidCredential { .. } => {
                ErrorKind::Unauthenticated
            }
            Self::Forbidden { .. }
            | Self::OwnershipDenied { .. }
            | Self::AccountDeactivated
            | Self::NotOrderParty(_) => ErrorKind::Forbidden,
            Self::AccountNotFound(_)
            | Self::ListingNotFound(_)
            | Self::OfferNotFound(_)
            | Self::OrderNotFound(_)
            | Self::UnknownPaymentRef(_)
            | Self::WithdrawalNotFound(_) => ErrorKind::NotFound,
            Self::MalformedId(_)
            | Self::InvalidListing { .. }
            | Self::OfferAmountOutOfBounds { .. }
            | Self::InvalidOffer { .. }
            | Self::DeliveryIncomplete { .. }
            | Self::WithdrawalBelowMinimum { .. }
            | Self::PayoutNotEnabled(_) => ErrorKind::BadRequest,
            Self::ListingNotActive { .. }
            | Self::ListingSold(_)
            | Self::OpenOfferExists { .. }
            | Self::OwnListingOffer(_)
            | Self::OfferTransitionInvalid { .. }
            | Self::OfferExpired(_)
            | Self::OrderTransitionInvalid { .. }
            | Self::DuplicateOrderForOffer { .. }
            | Self::RevisionLimitReached { .. }
            | Self::InsufficientAvailable { .. }
            | Self::WithdrawalTransitionInvalid { .. }
            | Self::RefundAfterWithdrawal { .. } => ErrorKind::Conflict,
            Self::GatewayFailure { .. } | Self::TransferFailed { .. } => ErrorKind::ExternalFailure,
            Self::LedgerConservationViolation { .. }
            | Self::Internal(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TradepostError>;
