//! Status-transition audit trail.
//!
//! Every committed status transition appends a [`TransitionRecord`]:
//! previous state, new state, actor, timestamp. The trail is append-only
//! and sufficient to reconstruct entity history for dispute resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Actor;

/// Which entity family a transition record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEntity {
    Listing,
    Offer,
    Order,
    Withdrawal,
}

impl std::fmt::Display for AuditEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listing => write!(f, "LISTING"),
            Self::Offer => write!(f, "OFFER"),
            Self::Order => write!(f, "ORDER"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// Who drove a transition: a caller, or the engine itself (sweeps,
/// gateway callbacks, maturation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditActor {
    User(Actor),
    System,
}

impl std::fmt::Display for AuditActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(actor) => write!(f, "{actor}"),
            Self::System => write!(f, "SYSTEM"),
        }
    }
}

/// One committed status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub entity: AuditEntity,
    /// Display form of the entity id (`lst:...`, `ord:...`, ...).
    pub entity_id: String,
    pub previous: String,
    pub new: String,
    pub actor: AuditActor,
    pub at: DateTime<Utc>,
}

/// Append-only transition log.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: Vec<TransitionRecord>,
}

impl AuditTrail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition record.
    pub fn record(
        &mut self,
        entity: AuditEntity,
        entity_id: impl ToString,
        previous: impl ToString,
        new: impl ToString,
        actor: AuditActor,
    ) {
        self.records.push(TransitionRecord {
            entity,
            entity_id: entity_id.to_string(),
            previous: previous.to_string(),
            new: new.to_string(),
            actor,
            at: Utc::now(),
        });
    }

    /// All records for one entity, in commit order.
    #[must_use]
    pub fn for_entity(&self, entity_id: &str) -> Vec<&TransitionRecord> {
        self.records
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .collect()
    }

    /// The full trail, in commit order.
    #[must_use]
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
