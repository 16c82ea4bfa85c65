//! Auth callback deep links.
//!
//! The platform's URL hook (native deep link or the web popup bridge)
//! feeds redirect URLs into a [`DeepLinkDispatcher`]; the login flow holds
//! a [`CallbackHandle`] subscription. Teardown is structured: dropping the
//! handle cancels the subscription, so there is a single disposal path
//! instead of manual listener removal at every exit branch.

use std::sync::Mutex;

use tokio::sync::oneshot;
use url::Url;

use mibu_core::Portal;

use super::error::AuthError;

/// Structured error code the backend uses when the account cannot use the
/// selected portal.
const ERROR_ROLE_MISMATCH: &str = "role_mismatch";

/// Parsed query params of an auth callback redirect.
#[derive(Debug, Clone)]
pub struct CallbackParams {
    /// Bearer token on success.
    pub token: Option<String>,
    /// Structured error code on failure.
    pub error: Option<String>,
    /// Authorization code (popup variants that exchange server-side).
    pub code: Option<String>,
    /// The portal the login was initiated for, echoed back.
    pub portal: Option<Portal>,
}

impl CallbackParams {
    /// Parse a callback URL like `mibu://auth/callback?token=...`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCallback` when the URL does not parse or
    /// is not the auth callback route on the expected scheme.
    pub fn parse(raw: &str, scheme: &str) -> Result<Self, AuthError> {
        let url = Url::parse(raw).map_err(|e| AuthError::InvalidCallback(e.to_string()))?;

        if url.scheme() != scheme || url.host_str() != Some("auth") || url.path() != "/callback" {
            return Err(AuthError::InvalidCallback(format!(
                "expected {scheme}://auth/callback, got {raw}"
            )));
        }

        let mut params = Self {
            token: None,
            error: None,
            code: None,
            portal: None,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "code" => params.code = Some(value.into_owned()),
                "portal" => {
                    params.portal = value.parse::<mibu_core::Role>().ok().map(Portal::from);
                }
                _ => {}
            }
        }
        Ok(params)
    }

    /// Whether the callback carries the structured role-mismatch code.
    #[must_use]
    pub fn is_role_mismatch(&self) -> bool {
        self.error.as_deref() == Some(ERROR_ROLE_MISMATCH)
    }
}

/// Receives platform redirect URLs and resolves the waiting login flow.
///
/// Holds at most one waiter; a new subscription replaces (and thereby
/// cancels) any previous one.
pub struct DeepLinkDispatcher {
    scheme: String,
    waiter: Mutex<Option<oneshot::Sender<CallbackParams>>>,
}

impl DeepLinkDispatcher {
    /// Create a dispatcher for the given deep-link scheme.
    #[must_use]
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            waiter: Mutex::new(None),
        }
    }

    /// Subscribe for the next auth callback.
    ///
    /// The returned handle is the only way to consume the callback;
    /// dropping it tears the subscription down.
    pub fn subscribe(&self) -> CallbackHandle {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiter) = self.waiter.lock() {
            *waiter = Some(tx);
        }
        CallbackHandle { rx }
    }

    /// Dispatch a redirect URL to the current waiter.
    ///
    /// Returns `true` when a waiter consumed the callback; `false` when
    /// the URL was not an auth callback or no live subscription exists.
    pub fn dispatch(&self, raw_url: &str) -> bool {
        let Ok(params) = CallbackParams::parse(raw_url, &self.scheme) else {
            return false;
        };

        let Ok(mut waiter) = self.waiter.lock() else {
            return false;
        };
        // send() fails when the handle was dropped (flow gone); either way
        // the slot is consumed
        waiter.take().is_some_and(|tx| tx.send(params).is_ok())
    }
}

/// A one-shot subscription to the next auth callback.
pub struct CallbackHandle {
    rx: oneshot::Receiver<CallbackParams>,
}

impl CallbackHandle {
    /// Wait for the callback, up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Timeout` when nothing arrives in time, or
    /// `AuthError::ListenerClosed` when the dispatcher dropped the sender
    /// (e.g. a newer subscription replaced this one).
    pub async fn wait(self, timeout: std::time::Duration) -> Result<CallbackParams, AuthError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(AuthError::ListenerClosed),
            Err(_) => Err(AuthError::Timeout),
        }
    }

    /// Resolve immediately with already-received params, for tests and the
    /// web popup bridge which collects params synchronously.
    #[must_use]
    pub fn resolved(params: CallbackParams) -> Self {
        let (tx, rx) = oneshot::channel();
        // Receiver is held by the returned handle, so this cannot fail
        let _ = tx.send(params);
        Self { rx }
    }
}
