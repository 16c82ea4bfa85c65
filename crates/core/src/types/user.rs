//! The session user record and collection items.

use serde::{Deserialize, Serialize};

use crate::types::id::{ItemId, UserId};
use crate::types::role::{Provider, Role};

/// The authenticated user, as held by the session store.
///
/// One mutable record per process, owned by the session store from login to
/// logout. `role` is the registered role; `active_role` is the role
/// currently worn in the UI and only diverges from `role` for super-admin
/// accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
    #[serde(default)]
    pub is_super_admin: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessible_roles: Vec<Role>,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl User {
    /// The role currently worn in the UI: `active_role` when set, otherwise
    /// the registered role.
    #[must_use]
    pub fn effective_role(&self) -> Role {
        self.active_role.unwrap_or(self.role)
    }

    /// Whether this record satisfies the role invariant: non-super-admin
    /// users never wear a role other than their registered one.
    #[must_use]
    pub fn role_invariant_holds(&self) -> bool {
        self.is_super_admin || self.active_role.is_none_or(|active| active == self.role)
    }

    /// Whether the account may switch into `role` without a separate login.
    #[must_use]
    pub fn can_switch_to(&self, role: Role) -> bool {
        self.is_super_admin
            && (self.accessible_roles.is_empty() || self.accessible_roles.contains(&role))
    }
}

/// An item in the traveler's collection (gacha rewards, saved places).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Merge `incoming` items into `existing`, de-duplicating by id.
///
/// Items whose id is already present are dropped; order of the existing
/// collection is preserved and new items are appended in their given order.
/// Returns the number of items actually appended.
pub fn merge_collection(existing: &mut Vec<CollectionItem>, incoming: Vec<CollectionItem>) -> usize {
    let mut appended = 0;
    for item in incoming {
        if existing.iter().any(|e| e.id == item.id) {
            continue;
        }
        existing.push(item);
        appended += 1;
    }
    appended
}
