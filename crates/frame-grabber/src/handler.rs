use crate::metrics::GrabberMetrics;
use crate::{Clock, FrameCache, FrameHandle, FrameReader, FrameSnapshot};
use std::sync::Arc;
use tracing::trace;

/// Turns frame-arrived notifications into cache updates.
///
/// Runs on the capture subsystem's delivery threads, possibly several at
/// once. It never blocks waiting for a frame and never reports errors:
/// notifications without a usable frame are dropped.
#[derive(Clone)]
pub struct FrameArrivalHandler {
    cache: Arc<FrameCache>,
    clock: Arc<dyn Clock>,
    metrics: Option<GrabberMetrics>,
}

impl FrameArrivalHandler {
    pub fn new(cache: Arc<FrameCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: GrabberMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle one notification from `reader`. Returns true when the cache
    /// now holds a snapshot of the acquired frame.
    pub fn on_frame_arrived(&self, reader: &dyn FrameReader) -> bool {
        if let Some(m) = &self.metrics {
            m.frames_arrived.inc();
        }
        let Some(frame) = reader.try_acquire_latest_frame() else {
            trace!("frame arrived notification without a frame");
            self.discarded();
            return false;
        };
        let sequence = frame.sequence();
        // Snapshot is built before the cache lock is taken.
        let Some(snapshot) = FrameSnapshot::from_frame(frame, self.clock.now_ms()) else {
            trace!(sequence, "frame has no coordinate system, dropped");
            self.discarded();
            return false;
        };
        self.cache.replace(snapshot);
        if let Some(m) = &self.metrics {
            m.frames_cached.inc();
        }
        trace!(sequence, "latest frame updated");
        true
    }

    fn discarded(&self) {
        if let Some(m) = &self.metrics {
            m.frames_discarded.inc();
        }
    }
}
