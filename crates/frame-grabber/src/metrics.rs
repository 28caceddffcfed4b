use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::Serialize;

#[derive(Clone)]
pub struct GrabberMetrics {
    pub frames_arrived: IntCounter,
    pub frames_cached: IntCounter,
    pub frames_discarded: IntCounter,
    pub grabber_valid: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub grabber: GrabberMetrics,
}

/// Point-in-time copy of the grabber counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct GrabberStats {
    pub frames_arrived: u64,
    pub frames_cached: u64,
    pub frames_discarded: u64,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let frames_arrived =
            IntCounter::new("fg_frames_arrived", "Frame-arrived notifications handled")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let frames_cached =
            IntCounter::new("fg_frames_cached", "Frames stored as the latest snapshot")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let frames_discarded = IntCounter::new(
            "fg_frames_discarded",
            "Notifications without a usable frame or coordinate system",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let grabber_valid = IntGauge::new("fg_grabber_valid", "1 when the frame reader is running")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let grabber = GrabberMetrics {
            frames_arrived,
            frames_cached,
            frames_discarded,
            grabber_valid,
        };
        let _ = registry.register(Box::new(grabber.frames_arrived.clone()));
        let _ = registry.register(Box::new(grabber.frames_cached.clone()));
        let _ = registry.register(Box::new(grabber.frames_discarded.clone()));
        let _ = registry.register(Box::new(grabber.grabber_valid.clone()));
        Ok(Self { registry, grabber })
    }

    pub fn stats(&self) -> GrabberStats {
        GrabberStats {
            frames_arrived: self.grabber.frames_arrived.get(),
            frames_cached: self.grabber.frames_cached.get(),
            frames_discarded: self.grabber.frames_discarded.get(),
        }
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
