//! Mibu backend REST API client.
//!
//! A thin typed layer over `reqwest`. The client holds no token state; the
//! session store owns the bearer token and passes it per call, so the
//! client itself can be shared freely.

pub mod types;

pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use mibu_core::{CountryId, Portal, Role, User};

use crate::config::MibuConfig;
use crate::error::ApiError;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Mibu backend API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: url::Url,
}

impl ApiClient {
    /// Create a new API client.
    #[must_use]
    pub fn new(config: &MibuConfig) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_base_url.clone(),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    /// Build the browser URL that starts the OAuth login flow.
    ///
    /// This URL is opened as a page (popup on web, auth session on native),
    /// never fetched directly. The backend finishes by redirecting to
    /// `redirect_uri` with `token`/`error` query params.
    #[must_use]
    pub fn login_url(&self, portal: Portal, redirect_uri: &str) -> String {
        format!(
            "{}?redirect_uri={}&portal={}&target_role={}",
            self.endpoint("/api/auth/login"),
            urlencoding::encode(redirect_uri),
            portal,
            portal.target_role(),
        )
    }

    /// Execute a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let path = response.url().path().to_string();
        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Mibu API returned non-success status"
            );
            return Err(status_error(status, &path, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse Mibu API response"
            );
            ApiError::Parse(e)
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T, ApiError> {
        let mut request = self.inner.client.get(self.endpoint(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.execute(request).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut request = self.inner.client.post(self.endpoint(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.execute(request).await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Fetch the current user profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_user(&self, token: &str) -> Result<User, ApiError> {
        self.get("/api/auth/user", Some(token)).await
    }

    /// Switch the active role of a super-admin account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; callers must still validate
    /// the confirmed `active_role` in the payload.
    #[instrument(skip(self, token), fields(role = %role))]
    pub async fn switch_role(&self, token: &str, role: Role) -> Result<SwitchRoleResponse, ApiError> {
        self.post(
            "/api/auth/switch-role",
            Some(token),
            &serde_json::json!({ "role": role }),
        )
        .await
    }

    /// Register a traveler account.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<AuthResponse, ApiError> {
        self.post("/api/auth/register", None, request).await
    }

    /// Register a merchant account (lands unapproved, pending review).
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, request))]
    pub async fn register_merchant(
        &self,
        request: &RegistrationRequest,
    ) -> Result<AuthResponse, ApiError> {
        self.post("/api/auth/register/merchant", None, request).await
    }

    /// Register a specialist account (lands unapproved, pending review).
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, request))]
    pub async fn register_specialist(
        &self,
        request: &RegistrationRequest,
    ) -> Result<AuthResponse, ApiError> {
        self.post("/api/auth/register/specialist", None, request)
            .await
    }

    // =========================================================================
    // Location
    // =========================================================================

    /// Report the device position.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn update_location(
        &self,
        token: &str,
        lat: f64,
        lng: f64,
    ) -> Result<LocationUpdateResponse, ApiError> {
        self.post(
            "/api/location/update",
            Some(token),
            &LocationUpdateRequest { lat, lng },
        )
        .await
    }

    // =========================================================================
    // Push tokens
    // =========================================================================

    /// Register a device push token for the current account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, request))]
    pub async fn register_push_token(
        &self,
        token: &str,
        request: &PushTokenRequest,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("/api/notifications/push-token", Some(token), request)
            .await?;
        Ok(())
    }

    /// De-register a device push token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, request))]
    pub async fn remove_push_token(
        &self,
        token: &str,
        request: &PushTokenRequest,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("/api/notifications/push-token/remove", Some(token), request)
            .await?;
        Ok(())
    }
}

/// Map a non-success status (other than 401/429, which are handled before
/// the body is read) to its typed error.
fn status_error(status: reqwest::StatusCode, path: &str, body: &str) -> ApiError {
    if status == reqwest::StatusCode::NOT_FOUND {
        return ApiError::NotFound(path.to_string());
    }
    ApiError::Api {
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    }
}

// =============================================================================
// Traits (injection seams)
// =============================================================================

/// The auth-facing slice of the backend, as the session store sees it.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Fetch the current user profile.
    async fn get_user(&self, token: &str) -> Result<User, ApiError>;

    /// Switch the active role of a super-admin account.
    async fn switch_role(&self, token: &str, role: Role) -> Result<SwitchRoleResponse, ApiError>;
}

/// The reference-data slice of the backend, as the preload cache sees it.
#[async_trait]
pub trait ReferenceApi: Send + Sync {
    /// Fetch the country list.
    async fn countries(&self) -> Result<Vec<Country>, ApiError>;

    /// Fetch the regions of one country.
    async fn regions(&self, country_id: &CountryId) -> Result<Vec<Region>, ApiError>;

    /// Fetch the avatar preset list.
    async fn avatar_presets(&self) -> Result<Vec<AvatarPreset>, ApiError>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn get_user(&self, token: &str) -> Result<User, ApiError> {
        Self::get_user(self, token).await
    }

    async fn switch_role(&self, token: &str, role: Role) -> Result<SwitchRoleResponse, ApiError> {
        Self::switch_role(self, token, role).await
    }
}

#[async_trait]
impl ReferenceApi for ApiClient {
    async fn countries(&self) -> Result<Vec<Country>, ApiError> {
        self.get("/api/reference/countries", None).await
    }

    async fn regions(&self, country_id: &CountryId) -> Result<Vec<Region>, ApiError> {
        self.get(&format!("/api/reference/countries/{country_id}/regions"), None)
            .await
    }

    async fn avatar_presets(&self) -> Result<Vec<AvatarPreset>, ApiError> {
        self.get("/api/reference/avatars", None).await
    }
}
