//! Geo samples, haversine distance, and the location report throttle.
//!
//! The device location stream fires on its own cadence; the [`ReportGate`]
//! decides which of those fixes are worth pushing to the server. Reports go
//! out when either gate fires:
//!
//! - **Time gate**: at least [`THROTTLE_INTERVAL_MS`] since the last report,
//!   regardless of movement. This is a heartbeat that keeps server-side
//!   presence fresh while stationary.
//! - **Distance gate**: the fix moved at least [`MIN_DISTANCE_METERS`] from
//!   the last *reported* position (great-circle distance).
//!
//! Gate state advances only when a report is actually sent; suppressed ticks
//! leave it untouched.

use serde::{Deserialize, Serialize};

/// Minimum time between unconditional reports, in milliseconds.
pub const THROTTLE_INTERVAL_MS: i64 = 10_000;

/// Minimum displacement that forces a report, in meters.
pub const MIN_DISTANCE_METERS: f64 = 10.0;

/// Mean Earth radius, in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A single GPS fix from the device location stream.
///
/// Timestamps are unix milliseconds, matching what the device stream
/// reports and keeping gate arithmetic deterministic in tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
}

impl GeoSample {
    /// Create a sample from coordinates and a unix-millisecond timestamp.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }
}

/// Great-circle distance between two fixes in meters, via the haversine
/// formula.
#[must_use]
pub fn haversine_meters(a: &GeoSample, b: &GeoSample) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Throttle state for location reporting.
///
/// Keeps only the last *reported* fix, not a history. A fresh gate reports
/// the first sample it sees (no previous report to throttle against).
#[derive(Debug, Clone, Default)]
pub struct ReportGate {
    last_reported: Option<GeoSample>,
    last_report_at_ms: Option<i64>,
}

impl ReportGate {
    /// A gate with no report history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_reported: None,
            last_report_at_ms: None,
        }
    }

    /// Whether `sample` should be reported, given `now` in unix
    /// milliseconds. Does not modify gate state.
    #[must_use]
    pub fn should_report(&self, sample: &GeoSample, now_ms: i64) -> bool {
        let time_gate = self
            .last_report_at_ms
            .is_none_or(|last| now_ms - last >= THROTTLE_INTERVAL_MS);
        if time_gate {
            return true;
        }

        self.last_reported
            .as_ref()
            .is_some_and(|last| haversine_meters(last, sample) >= MIN_DISTANCE_METERS)
    }

    /// Record that `sample` was reported at `now_ms`.
    ///
    /// Call only when a report was actually sent; suppressed samples must
    /// not advance the gate.
    pub fn mark_reported(&mut self, sample: GeoSample, now_ms: i64) {
        self.last_reported = Some(sample);
        self.last_report_at_ms = Some(now_ms);
    }

    /// The last fix that was actually reported, if any.
    #[must_use]
    pub const fn last_reported(&self) -> Option<&GeoSample> {
        self.last_reported.as_ref()
    }

    /// When the last report was sent, in unix milliseconds.
    #[must_use]
    pub const fn last_report_at_ms(&self) -> Option<i64> {
        self.last_report_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    /// A point `meters` north of `origin` along a meridian.
    fn offset_north(origin: &GeoSample, meters: f64, at_ms: i64) -> GeoSample {
        let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
        GeoSample::new(origin.latitude + d_lat, origin.longitude, at_ms)
    }

    fn reported_gate(origin: GeoSample) -> ReportGate {
        let mut gate = ReportGate::new();
        gate.mark_reported(origin, origin.timestamp_ms);
        gate
    }

    #[test]
    fn test_haversine_known_distance() {
        // Taipei 101 to Taipei Main Station is roughly 5.2 km
        let a = GeoSample::new(25.0340, 121.5645, T0);
        let b = GeoSample::new(25.0478, 121.5170, T0);
        let d = haversine_meters(&a, &b);
        assert!((d - 5050.0).abs() < 200.0, "distance was {d}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        let a = GeoSample::new(25.0, 121.5, T0);
        assert!(haversine_meters(&a, &a) < f64::EPSILON);
    }

    #[test]
    fn test_fresh_gate_reports_first_sample() {
        let gate = ReportGate::new();
        let sample = GeoSample::new(25.0, 121.5, T0);
        assert!(gate.should_report(&sample, T0));
    }

    #[test]
    fn test_time_gate_fires_at_interval_even_when_stationary() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let gate = reported_gate(origin);

        let still = GeoSample::new(25.0, 121.5, T0 + THROTTLE_INTERVAL_MS);
        assert!(gate.should_report(&still, T0 + THROTTLE_INTERVAL_MS));
    }

    #[test]
    fn test_time_gate_suppresses_just_under_interval() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let gate = reported_gate(origin);

        let still = GeoSample::new(25.0, 121.5, T0 + THROTTLE_INTERVAL_MS - 1);
        assert!(!gate.should_report(&still, T0 + THROTTLE_INTERVAL_MS - 1));
    }

    #[test]
    fn test_distance_gate_fires_at_threshold_before_interval() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let gate = reported_gate(origin);

        // 1 second later, exactly 10 m away (plus a hair for float rounding)
        let moved = offset_north(&origin, MIN_DISTANCE_METERS + 0.001, T0 + 1_000);
        assert!(gate.should_report(&moved, T0 + 1_000));
    }

    #[test]
    fn test_distance_gate_suppresses_just_under_threshold() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let gate = reported_gate(origin);

        let moved = offset_north(&origin, 9.99, T0 + 1_000);
        assert!(!gate.should_report(&moved, T0 + 1_000));
    }

    #[test]
    fn test_suppressed_sample_leaves_gate_untouched() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let gate = reported_gate(origin);

        let nearby = offset_north(&origin, 1.0, T0 + 1_000);
        assert!(!gate.should_report(&nearby, T0 + 1_000));

        // State unchanged: a later sample is still throttled against origin
        assert_eq!(gate.last_report_at_ms(), Some(T0));
        assert_eq!(gate.last_reported(), Some(&origin));
    }

    #[test]
    fn test_gate_advances_only_on_mark_reported() {
        let origin = GeoSample::new(25.0, 121.5, T0);
        let mut gate = reported_gate(origin);

        let moved = offset_north(&origin, 50.0, T0 + 2_000);
        assert!(gate.should_report(&moved, T0 + 2_000));
        gate.mark_reported(moved, T0 + 2_000);

        // 5 m past the new anchor stays suppressed within the interval
        let next = offset_north(&moved, 5.0, T0 + 3_000);
        assert!(!gate.should_report(&next, T0 + 3_000));
    }
}
