//! Scenario tests for the Mibu client core.
//!
//! These exercise the crates together the way the app shell wires them:
//! an [`mibu_client::AuthFlow`] over a [`mibu_client::SessionStore`] and
//! [`mibu_client::PreloadService`], all backed by in-process stubs instead
//! of the real backend. No network, no device storage.
//!
//! ```bash
//! cargo test -p mibu-integration-tests
//! ```
//!
//! The [`StubBackend`] here stands in for the whole API surface; per-module
//! edge cases live in the unit tests of `mibu-core` and `mibu-client`.

// Test support code; unwraps on fixture data are fine here.
#![allow(clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use mibu_client::api::{
    AuthApi, AvatarPreset, Country, PartialUser, ReferenceApi, Region, SwitchRoleResponse,
};
use mibu_client::config::MibuConfig;
use mibu_client::error::ApiError;
use mibu_core::{AvatarId, CountryId, Language, Provider, RegionId, Role, User, UserId};

/// How the stub answers a role-switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPolicy {
    /// Confirm the requested role and update the stored profile.
    Confirm,
    /// Fail the call with a server error.
    Reject,
    /// Succeed the call but confirm a role other than the requested one.
    ConfirmWrongRole(Role),
}

/// In-process stand-in for the Mibu backend.
///
/// Holds one "current" user profile; `get_user` returns it and a confirmed
/// role switch mutates it, mirroring the real backend's behavior.
pub struct StubBackend {
    user: Mutex<User>,
    switch_policy: Mutex<SwitchPolicy>,
    pub get_user_calls: AtomicUsize,
    pub country_calls: AtomicUsize,
}

impl StubBackend {
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            user: Mutex::new(user),
            switch_policy: Mutex::new(SwitchPolicy::Confirm),
            get_user_calls: AtomicUsize::new(0),
            country_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_switch_policy(&self, policy: SwitchPolicy) {
        *self.switch_policy.lock().unwrap() = policy;
    }

    #[must_use]
    pub fn current_user(&self) -> User {
        self.user.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for StubBackend {
    async fn get_user(&self, _token: &str) -> Result<User, ApiError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_user())
    }

    async fn switch_role(&self, _token: &str, role: Role) -> Result<SwitchRoleResponse, ApiError> {
        let policy = *self.switch_policy.lock().unwrap();
        match policy {
            SwitchPolicy::Confirm => {
                self.user.lock().unwrap().active_role = Some(role);
                let user = self.current_user();
                Ok(SwitchRoleResponse {
                    active_role: Some(role),
                    user: Some(PartialUser {
                        id: Some(user.id),
                        name: Some(user.name),
                        email: user.email,
                        avatar: user.avatar,
                        role: Some(user.role),
                        active_role: Some(role),
                        is_approved: user.is_approved,
                        is_super_admin: Some(user.is_super_admin),
                        accessible_roles: Some(user.accessible_roles),
                    }),
                })
            }
            SwitchPolicy::Reject => Err(ApiError::Api {
                status: 403,
                message: "switch not permitted".to_string(),
            }),
            SwitchPolicy::ConfirmWrongRole(other) => Ok(SwitchRoleResponse {
                active_role: Some(other),
                user: None,
            }),
        }
    }
}

#[async_trait]
impl ReferenceApi for StubBackend {
    async fn countries(&self) -> Result<Vec<Country>, ApiError> {
        self.country_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(vec![Country {
            id: CountryId::new("tw"),
            name: "Taiwan".to_string(),
            code: Some("TW".to_string()),
        }])
    }

    async fn regions(&self, country_id: &CountryId) -> Result<Vec<Region>, ApiError> {
        Ok(vec![Region {
            id: RegionId::new("taipei"),
            country_id: country_id.clone(),
            name: "Taipei".to_string(),
        }])
    }

    async fn avatar_presets(&self) -> Result<Vec<AvatarPreset>, ApiError> {
        Ok(vec![AvatarPreset {
            id: AvatarId::new("fox"),
            url: "https://cdn.mibu.app/avatars/fox.png".to_string(),
            name: None,
        }])
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A config as the app shell would load it, without touching the env.
#[must_use]
pub fn test_config() -> MibuConfig {
    MibuConfig {
        api_base_url: Url::parse("https://api.mibu.test").unwrap(),
        deep_link_scheme: "mibu".to_string(),
        oauth_timeout: Duration::from_secs(120),
        default_language: Language::En,
    }
}

#[must_use]
pub fn traveler() -> User {
    user_base("u-trav", "Mei", Role::Traveler)
}

#[must_use]
pub fn approved_merchant() -> User {
    let mut user = user_base("u-shop", "Night Market Stall", Role::Merchant);
    user.is_approved = Some(true);
    user
}

#[must_use]
pub fn pending_merchant() -> User {
    let mut user = user_base("u-shop-2", "New Stall", Role::Merchant);
    user.is_approved = Some(false);
    user
}

#[must_use]
pub fn super_admin() -> User {
    let mut user = user_base("u-root", "Root", Role::Admin);
    user.active_role = Some(Role::Admin);
    user.is_super_admin = true;
    user.accessible_roles = vec![Role::Traveler, Role::Merchant, Role::Specialist, Role::Admin];
    user
}

fn user_base(id: &str, name: &str, role: Role) -> User {
    User {
        id: UserId::new(id),
        name: name.to_string(),
        email: Some(format!("{id}@mibu.test")),
        avatar: None,
        first_name: None,
        last_name: None,
        role,
        active_role: None,
        is_approved: None,
        is_super_admin: false,
        accessible_roles: vec![],
        provider: Provider::Google,
        provider_id: None,
    }
}
