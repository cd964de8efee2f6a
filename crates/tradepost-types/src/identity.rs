//! Caller identity: roles, capability tiers, and account state.
//!
//! `Role` is the coarse tier embedded in the bearer credential. It is
//! advisory: `user_type` on the stored [`Account`] refines whether an
//! account can actually buy or sell. A deactivated account can perform
//! no guarded action regardless of role.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Coarse authorization tier carried in the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Buyer,
    Seller,
    Subadmin,
    Admin,
}

impl Role {
    /// Integer rank used to compare roles for authorization.
    /// Higher tiers subsume lower ones.
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Self::User => 1,
            Self::Buyer | Self::Seller => 2,
            Self::Subadmin => 3,
            Self::Admin => 4,
        }
    }

    /// Whether this role alone is enough to assert seller capability
    /// without consulting the identity store.
    #[must_use]
    pub fn implies_seller(self) -> bool {
        matches!(self, Self::Seller | Self::Subadmin | Self::Admin)
    }

    /// Whether this role alone is enough to assert buyer capability.
    #[must_use]
    pub fn implies_buyer(self) -> bool {
        matches!(self, Self::Buyer | Self::Subadmin | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
            Self::Subadmin => write!(f, "SUBADMIN"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Whether an account is set up to buy, sell, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Buyer,
    Seller,
    Both,
}

impl UserType {
    #[must_use]
    pub fn can_sell(self) -> bool {
        matches!(self, Self::Seller | Self::Both)
    }

    #[must_use]
    pub fn can_buy(self) -> bool {
        matches!(self, Self::Buyer | Self::Both)
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

/// Stored account state, as returned by the identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub role: Role,
    pub user_type: UserType,
    pub email: String,
    pub active: bool,
    /// Opt-in feature flags gating extra capabilities.
    #[serde(default)]
    pub features: Vec<String>,
}

impl Account {
    #[must_use]
    pub fn new(id: UserId, role: Role, user_type: UserType, email: impl Into<String>) -> Self {
        Self {
            id,
            role,
            user_type,
            email: email.into(),
            active: true,
            features: Vec::new(),
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// The identity performing a guarded mutation. Engines validate every
/// transition against the actor's id and role; they never trust the
/// transport layer to have done so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.role, self.id)
    }
}
