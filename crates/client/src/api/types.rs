//! Wire types for the Mibu backend REST API.
//!
//! Response decoding is deliberately tolerant of the backend's two observed
//! location field spellings (`lat`/`lng` and `latitude`/`longitude`) via
//! serde aliases; requests always send `lat`/`lng`. Normalization happens
//! here, at the boundary, and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mibu_core::{AvatarId, CountryId, RegionId, Role, User, UserId};

// =============================================================================
// Auth
// =============================================================================

/// Response to `POST /api/auth/switch-role`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRoleResponse {
    /// The role the server confirmed. Authoritative; the locally requested
    /// role is never trusted as the persisted value.
    #[serde(default)]
    pub active_role: Option<Role>,
    /// Optionally, the updated user record. May be incomplete.
    #[serde(default)]
    pub user: Option<PartialUser>,
}

/// A possibly-incomplete user payload embedded in auth responses.
///
/// The switch-role endpoint sometimes returns a trimmed record; callers
/// must re-fetch the full profile when [`Self::merge_over`] yields `None`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUser {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub active_role: Option<Role>,
    #[serde(default)]
    pub is_approved: Option<bool>,
    #[serde(default)]
    pub is_super_admin: Option<bool>,
    #[serde(default)]
    pub accessible_roles: Option<Vec<Role>>,
}

impl PartialUser {
    /// Merge this payload over `base`, yielding a complete record.
    ///
    /// Returns `None` when the payload is too incomplete to be trusted as a
    /// user update (missing id), in which case the caller re-fetches the
    /// profile instead.
    #[must_use]
    pub fn merge_over(self, base: &User) -> Option<User> {
        let id = self.id?;
        let mut user = base.clone();
        user.id = id;
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        if let Some(avatar) = self.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(active) = self.active_role {
            user.active_role = Some(active);
        }
        if let Some(approved) = self.is_approved {
            user.is_approved = Some(approved);
        }
        if let Some(is_super) = self.is_super_admin {
            user.is_super_admin = is_super;
        }
        if let Some(roles) = self.accessible_roles {
            user.accessible_roles = roles;
        }
        Some(user)
    }
}

/// Body for the account registration endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Merchant registrations carry the shop name; specialist ones the
    /// field of expertise. Travelers send neither.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
}

/// Response to a successful registration: a fresh session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// =============================================================================
// Location
// =============================================================================

/// Body for `POST /api/location/update`. Always `lat`/`lng` on the wire.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lng: f64,
}

/// A trip-planner member's live location, as echoed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerLocation {
    pub user_id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lng: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response to a location update. The planner set, when present, replaces
/// the previously known set in full.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateResponse {
    #[serde(default)]
    pub planner_locations: Option<Vec<PlannerLocation>>,
}

// =============================================================================
// Reference data
// =============================================================================

/// A country available in the trip planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A region within a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: RegionId,
    pub country_id: CountryId,
    pub name: String,
}

/// A selectable avatar preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarPreset {
    pub id: AvatarId,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Push
// =============================================================================

/// Body for push-token registration/removal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRequest {
    pub device_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}
