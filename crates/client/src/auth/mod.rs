//! Login orchestration and role resolution.
//!
//! # Flow
//!
//! 1. The UI picks a [`Portal`] and opens [`crate::ApiClient::login_url`]
//!    in a browser (popup on web, auth session on native).
//! 2. The platform redirect hook feeds the callback URL into a
//!    [`DeepLinkDispatcher`]; the flow awaits its [`CallbackHandle`] under
//!    the configured ceiling (default 120 s).
//! 3. On a token: persist the session, fetch the profile. Super-admin
//!    accounts whose resolved role differs from the selected portal get a
//!    server-side role switch; the switch response's `activeRole` is
//!    authoritative.
//! 4. The navigation target is computed from the confirmed user record.
//!
//! Every failing step returns the flow to idle with a typed [`AuthError`];
//! the only hard timeout is the callback ceiling. A failed role switch is
//! not fatal: the flow routes by the role the server actually confirmed
//! and logs a warning (the selected portal is never client-asserted).

mod deep_link;
mod error;

pub use deep_link::{CallbackHandle, CallbackParams, DeepLinkDispatcher};
pub use error::AuthError;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use mibu_core::{NavTarget, Portal, Provider, Role, User, UserId, resolve_navigation};

use crate::api::AuthApi;
use crate::cache::PreloadService;
use crate::config::MibuConfig;
use crate::session::SessionStore;

/// The result of a completed login: the confirmed user and where to route.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub nav: NavTarget,
}

/// Orchestrates the OAuth exchange, session persistence, optional role
/// switch, and the navigation decision.
#[derive(Clone)]
pub struct AuthFlow {
    inner: Arc<AuthFlowInner>,
}

struct AuthFlowInner {
    api: Arc<dyn AuthApi>,
    session: SessionStore,
    preload: PreloadService,
    oauth_timeout: Duration,
}

impl AuthFlow {
    /// Create a flow over the given collaborators.
    #[must_use]
    pub fn new(
        config: &MibuConfig,
        api: Arc<dyn AuthApi>,
        session: SessionStore,
        preload: PreloadService,
    ) -> Self {
        Self {
            inner: Arc::new(AuthFlowInner {
                api,
                session,
                preload,
                oauth_timeout: config.oauth_timeout,
            }),
        }
    }

    /// Run a login attempt for the selected portal.
    ///
    /// `handle` is the callback subscription taken out before the browser
    /// was opened; its teardown is automatic whether the flow completes,
    /// errors, or times out.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Timeout`] when no callback arrives,
    /// [`AuthError::RoleMismatch`] for the structured mismatch code, and
    /// the underlying API/storage error otherwise.
    #[instrument(skip(self, handle), fields(portal = %portal))]
    pub async fn login(
        &self,
        portal: Portal,
        handle: CallbackHandle,
    ) -> Result<LoginOutcome, AuthError> {
        let params = handle.wait(self.inner.oauth_timeout).await?;

        if params.is_role_mismatch() {
            return Err(AuthError::RoleMismatch);
        }
        if let Some(code) = params.error {
            return Err(AuthError::Callback(code));
        }

        let token = params.token.map(SecretString::from).ok_or(AuthError::MissingToken)?;

        let user = self.inner.api.get_user(token.expose_secret()).await?;
        self.inner.session.set_user(user.clone(), Some(token)).await?;

        // Super-admins logging into a portal other than their resolved role
        // get a server-side switch; its confirmation is authoritative
        let user = if user.is_super_admin && user.effective_role() != portal.target_role() {
            if self.inner.session.switch_role(portal.target_role()).await {
                self.inner.session.user().await.unwrap_or(user)
            } else {
                warn!(
                    confirmed_role = %user.effective_role(),
                    "role switch failed, routing by server-confirmed role"
                );
                user
            }
        } else {
            user
        };

        // Route by what the server confirmed: when the switch failed, the
        // effective role (not the selected portal) drives navigation
        let nav = resolve_navigation(&user, Portal::from(user.effective_role()));

        // Best-effort reference-data warm-up; failures only mean a slower
        // first paint later
        let preload = self.inner.preload.clone();
        tokio::spawn(async move { preload.preload_after_auth().await });

        info!(user_id = %user.id, ?nav, "login complete");
        Ok(LoginOutcome { user, nav })
    }

    /// Sign in as a local-only guest, bypassing OAuth entirely.
    ///
    /// Guests carry no bearer token, so no push registration or preload is
    /// triggered.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] when the guest record cannot be
    /// persisted.
    #[instrument(skip(self))]
    pub async fn guest_login(&self, name: &str) -> Result<LoginOutcome, AuthError> {
        let user = guest_user(name.to_string());
        self.inner.session.set_user(user.clone(), None).await?;
        Ok(LoginOutcome {
            user,
            nav: NavTarget::MainTabs,
        })
    }

    /// End the session: clear the store and the reference caches.
    pub async fn logout(&self) {
        self.inner.session.logout().await;
        self.inner.preload.clear().await;
    }
}

/// Build a local-only guest user record.
fn guest_user(name: String) -> User {
    User {
        id: UserId::new(format!("guest-{}", random_suffix(12))),
        name,
        email: None,
        avatar: None,
        first_name: None,
        last_name: None,
        role: Role::Traveler,
        active_role: None,
        is_approved: None,
        is_super_admin: false,
        accessible_roles: vec![],
        provider: Provider::Guest,
        provider_id: None,
    }
}

/// Generate a random alphanumeric suffix.
fn random_suffix(length: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            // SAFETY: idx is always within bounds since random_range returns 0..CHARSET.len()
            char::from(*CHARSET.get(idx).expect("idx within bounds"))
        })
        .collect()
}
