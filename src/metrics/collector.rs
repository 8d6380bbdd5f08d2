//! Capture metrics registry.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for camera sessions and exposures.
///
/// Cloning is cheap and every clone updates the same series.
#[derive(Clone)]
pub struct CaptureMetrics {
    registry: Registry,

    // Exposure metrics
    exposures_total: IntCounter,
    frames_total: IntCounter,
    capture_failures_total: IntCounter,

    // Device state
    open_sessions: IntGauge,
    exposure_us: IntGauge,
    gain_db: Gauge,
}

impl CaptureMetrics {
    /// Creates a registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let exposures_total = IntCounter::new(
            "xiq_camera_exposures_total",
            "Total number of completed exposures",
        )?;
        let frames_total = IntCounter::new(
            "xiq_camera_frames_total",
            "Total number of frames summed into exposures",
        )?;
        let capture_failures_total = IntCounter::new(
            "xiq_camera_capture_failures_total",
            "Total number of exposures that failed",
        )?;
        let open_sessions = IntGauge::new(
            "xiq_camera_open_sessions",
            "Number of devices with an open session",
        )?;
        let exposure_us = IntGauge::new(
            "xiq_camera_exposure_microseconds",
            "Last exposure time written to a device",
        )?;
        let gain_db = Gauge::new("xiq_camera_gain_decibels", "Last gain written to a device")?;

        registry.register(Box::new(exposures_total.clone()))?;
        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(capture_failures_total.clone()))?;
        registry.register(Box::new(open_sessions.clone()))?;
        registry.register(Box::new(exposure_us.clone()))?;
        registry.register(Box::new(gain_db.clone()))?;

        Ok(Self {
            registry,
            exposures_total,
            frames_total,
            capture_failures_total,
            open_sessions,
            exposure_us,
            gain_db,
        })
    }

    /// Counts one completed exposure of `frames` frames.
    pub fn record_exposure(&self, frames: u32) {
        self.exposures_total.inc();
        self.frames_total.inc_by(frames as u64);
    }

    /// Counts one failed exposure.
    pub fn record_failure(&self) {
        self.capture_failures_total.inc();
    }

    /// Sets the open session gauge.
    pub fn set_open_sessions(&self, count: usize) {
        self.open_sessions.set(count as i64);
    }

    /// Records the last exposure time written.
    pub fn set_exposure(&self, microseconds: i32) {
        self.exposure_us.set(microseconds as i64);
    }

    /// Records the last gain written.
    pub fn set_gain(&self, decibels: f32) {
        self.gain_db.set(decibels as f64);
    }

    /// Total exposures recorded so far.
    pub fn exposures(&self) -> u64 {
        self.exposures_total.get()
    }

    /// Total failed exposures recorded so far.
    pub fn failures(&self) -> u64 {
        self.capture_failures_total.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
