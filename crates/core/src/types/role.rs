//! Roles, portals, auth providers, and languages.

use serde::{Deserialize, Serialize};

/// A user's registered role, and the axis along which the app splits into
/// product surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Traveler,
    Merchant,
    Specialist,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traveler => write!(f, "traveler"),
            Self::Merchant => write!(f, "merchant"),
            Self::Specialist => write!(f, "specialist"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traveler" => Ok(Self::Traveler),
            "merchant" => Ok(Self::Merchant),
            "specialist" => Ok(Self::Specialist),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// The product surface selected on the login screen, before authenticating.
///
/// Distinct from [`Role`]: the portal is a UI-local hint sent to the backend
/// as `target_role`. The account's actual role is resolved server-side and
/// may differ (triggering a role mismatch, or a role switch for
/// super-admins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portal {
    Traveler,
    Merchant,
    Specialist,
    Admin,
}

impl Portal {
    /// The role a user of this portal is expected to hold.
    #[must_use]
    pub const fn target_role(self) -> Role {
        match self {
            Self::Traveler => Role::Traveler,
            Self::Merchant => Role::Merchant,
            Self::Specialist => Role::Specialist,
            Self::Admin => Role::Admin,
        }
    }
}

impl From<Role> for Portal {
    fn from(role: Role) -> Self {
        match role {
            Role::Traveler => Self::Traveler,
            Role::Merchant => Self::Merchant,
            Role::Specialist => Self::Specialist,
            Role::Admin => Self::Admin,
        }
    }
}

impl std::fmt::Display for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.target_role().fmt(f)
    }
}

/// The authentication method that produced the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Google,
    Email,
    Guest,
}

/// UI language preference, persisted across launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "en")]
    #[default]
    En,
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "ko")]
    Ko,
}
