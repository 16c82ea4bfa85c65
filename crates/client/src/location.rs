//! Throttled location reporting.
//!
//! The device location subscription fires on its own cadence (the
//! [`SUBSCRIPTION_TIME_INTERVAL_MS`]/[`SUBSCRIPTION_DISTANCE_METERS`]
//! settings below are what the UI configures the stream with); the
//! [`LocationReporter`] sits inside that callback and decides, via the
//! [`ReportGate`], which fixes actually reach the server.
//!
//! Report failures are logged and swallowed - the subscription keeps
//! firing regardless, and a failed report leaves the gate unchanged so the
//! next tick retries.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, RwLock};
use tracing::{instrument, trace, warn};

use mibu_core::{GeoSample, ReportGate};

use crate::api::{ApiClient, LocationUpdateResponse, PlannerLocation};
use crate::error::ApiError;
use crate::session::SessionStore;

/// Time interval the UI configures the device location stream with.
pub const SUBSCRIPTION_TIME_INTERVAL_MS: u64 = 5_000;

/// Distance interval the UI configures the device location stream with.
pub const SUBSCRIPTION_DISTANCE_METERS: f64 = 5.0;

/// The location-update slice of the backend.
#[async_trait]
pub trait LocationApi: Send + Sync {
    /// Report the device position.
    async fn update_location(&self, lat: f64, lng: f64)
        -> Result<LocationUpdateResponse, ApiError>;
}

/// [`LocationApi`] over the real client, reading the bearer token from the
/// session store per call.
pub struct SessionLocationApi {
    api: ApiClient,
    session: SessionStore,
}

impl SessionLocationApi {
    /// Bind the API client to the session's token.
    #[must_use]
    pub const fn new(api: ApiClient, session: SessionStore) -> Self {
        Self { api, session }
    }
}

#[async_trait]
impl LocationApi for SessionLocationApi {
    async fn update_location(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<LocationUpdateResponse, ApiError> {
        let token = self.session.token().await.ok_or(ApiError::Unauthorized)?;
        self.api
            .update_location(token.expose_secret(), lat, lng)
            .await
    }
}

/// Throttled reporter for the device location stream.
pub struct LocationReporter {
    api: Arc<dyn LocationApi>,
    // Gate is locked across the decision and the send, so report decisions
    // never race against stale state even if observe() overlaps
    gate: Mutex<ReportGate>,
    planner: RwLock<Vec<PlannerLocation>>,
}

impl LocationReporter {
    /// Create a reporter with a fresh gate.
    #[must_use]
    pub fn new(api: Arc<dyn LocationApi>) -> Self {
        Self {
            api,
            gate: Mutex::new(ReportGate::new()),
            planner: RwLock::new(Vec::new()),
        }
    }

    /// Feed one fix from the device stream.
    ///
    /// Suppressed fixes produce no network call and leave the gate
    /// untouched. A successful report advances the gate and replaces the
    /// planner-member set in full when the response carries one.
    #[instrument(skip(self, sample), fields(ts = sample.timestamp_ms))]
    pub async fn observe(&self, sample: GeoSample) {
        let mut gate = self.gate.lock().await;
        let now_ms = sample.timestamp_ms;

        if !gate.should_report(&sample, now_ms) {
            trace!("location report suppressed");
            return;
        }

        match self.api.update_location(sample.latitude, sample.longitude).await {
            Ok(response) => {
                gate.mark_reported(sample, now_ms);
                if let Some(locations) = response.planner_locations {
                    // Full replacement, never a merge
                    *self.planner.write().await = locations;
                }
            }
            Err(e) => {
                warn!(error = %e, "location report failed");
            }
        }
    }

    /// The last planner-member set the server sent.
    pub async fn planner_locations(&self) -> Vec<PlannerLocation> {
        self.planner.read().await.clone()
    }
}
