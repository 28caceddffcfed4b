use crate::{
    select_color_source, CaptureSession, CaptureSubsystem, Clock, FrameArrivalHandler,
    FrameArrivedCallback, FrameCache, FrameReader, FrameSnapshot, GrabberConfig, GrabberStats,
    InitError, InitStage, MetricsHub, SelectedSource, SystemClock,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles held by a grabber whose reader started.
struct CaptureBinding {
    // Kept alive for as long as the reader runs.
    #[allow(dead_code)]
    session: Arc<dyn CaptureSession>,
    selected: SelectedSource,
    reader: Arc<dyn FrameReader>,
}

enum GrabberState {
    Valid(CaptureBinding),
    Invalid(InitError),
}

/// Keeps the most recent color-camera frame and its pose available for polling.
///
/// Built only through [`FrameGrabber::create`], which always yields a
/// grabber: check [`FrameGrabber::is_valid`] before expecting frames. An
/// invalid grabber stays invalid; build a new one to retry.
pub struct FrameGrabber {
    state: GrabberState,
    cache: Arc<FrameCache>,
    metrics: Option<MetricsHub>,
}

impl FrameGrabber {
    /// Select the color camera, open a session on it and start reading.
    ///
    /// Failures at any stage are logged and produce an invalid grabber.
    pub async fn create(subsystem: &dyn CaptureSubsystem, config: &GrabberConfig) -> Self {
        Self::create_with_clock(subsystem, config, Arc::new(SystemClock)).await
    }

    /// Like [`FrameGrabber::create`], stamping snapshots with `clock`.
    pub async fn create_with_clock(
        subsystem: &dyn CaptureSubsystem,
        config: &GrabberConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(FrameCache::new());
        let metrics = match MetricsHub::new() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("frame grabber metrics disabled: {e}");
                None
            }
        };

        let state = match initialize(subsystem, config).await {
            Ok(binding) => {
                let mut handler = FrameArrivalHandler::new(Arc::clone(&cache), clock);
                if let Some(m) = &metrics {
                    handler = handler.with_metrics(m.grabber.clone());
                    m.grabber.grabber_valid.set(1);
                }
                let callback: FrameArrivedCallback =
                    Arc::new(move |reader: &dyn FrameReader| {
                        handler.on_frame_arrived(reader);
                    });
                binding.reader.set_frame_arrived(Some(callback));
                info!(
                    group = %binding.selected.group,
                    source = %binding.selected.source.id,
                    "frame grabber ready"
                );
                GrabberState::Valid(binding)
            }
            Err(err) => {
                warn!(stage = %err.stage(), "frame grabber unavailable: {err}");
                GrabberState::Invalid(err)
            }
        };

        Self {
            state,
            cache,
            metrics,
        }
    }

    /// True when the reader started and frames are being received.
    pub fn is_valid(&self) -> bool {
        matches!(self.state, GrabberState::Valid(_))
    }

    /// Most recent snapshot, `None` until the first usable frame arrives.
    ///
    /// Never blocks; the result may be stale.
    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.cache.latest()
    }

    /// Why initialization failed, for an invalid grabber.
    pub fn failure(&self) -> Option<&InitError> {
        match &self.state {
            GrabberState::Invalid(err) => Some(err),
            GrabberState::Valid(_) => None,
        }
    }

    pub fn selected_source(&self) -> Option<&SelectedSource> {
        match &self.state {
            GrabberState::Valid(binding) => Some(&binding.selected),
            GrabberState::Invalid(_) => None,
        }
    }

    pub fn stats(&self) -> GrabberStats {
        self.metrics
            .as_ref()
            .map(MetricsHub::stats)
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        if let GrabberState::Valid(binding) = &self.state {
            binding.reader.set_frame_arrived(None);
            binding.reader.stop();
            if let Some(m) = &self.metrics {
                m.grabber.grabber_valid.set(0);
            }
            debug!(source = %binding.selected.source.id, "frame reader stopped");
        }
    }
}

/// Selection, session, reader and start, short-circuiting on the first failure.
async fn initialize(
    subsystem: &dyn CaptureSubsystem,
    config: &GrabberConfig,
) -> Result<CaptureBinding, InitError> {
    debug!(stage = %InitStage::SelectingSource, "frame grabber init");
    let groups = subsystem
        .enumerate_source_groups()
        .await
        .map_err(InitError::Enumeration)?;
    let selected =
        select_color_source(&groups, config.selection).ok_or(InitError::NoColorSource)?;

    debug!(
        stage = %InitStage::OpeningSession,
        group = %selected.group,
        sharing = ?config.session.sharing,
        memory = ?config.session.memory,
        "frame grabber init"
    );
    let session = subsystem
        .open_session(&selected.group, &config.session)
        .await
        .map_err(InitError::SessionOpen)?;

    debug!(
        stage = %InitStage::CreatingReader,
        source = %selected.source.id,
        "frame grabber init"
    );
    let reader = session
        .create_reader(&selected.source)
        .await
        .map_err(InitError::ReaderCreate)?;

    debug!(stage = %InitStage::Starting, "frame grabber init");
    let status = reader.start().await;
    if !status.is_success() {
        return Err(InitError::ReaderStart(status));
    }

    Ok(CaptureBinding {
        session,
        selected,
        reader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCaptureSubsystem, MockFrame};
    use crate::{
        CaptureError, FrameHandle, ManualClock, ReaderStartStatus, SelectionPolicy, SessionConfig,
        SourceDescriptor, SourceGroup, SourceKind,
    };

    fn group(id: &str, sources: &[(&str, SourceKind)]) -> SourceGroup {
        SourceGroup {
            id: id.to_string(),
            display_name: id.to_string(),
            sources: sources
                .iter()
                .map(|(sid, kind)| SourceDescriptor::new(*sid, *kind))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_no_sources_yields_invalid_grabber() {
        let subsystem = MockCaptureSubsystem::new(vec![]);
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert!(grabber.latest_frame().is_none());
        assert_eq!(grabber.failure(), Some(&InitError::NoColorSource));
        assert_eq!(subsystem.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_no_color_source_never_opens_session() {
        let subsystem = MockCaptureSubsystem::new(vec![group(
            "depth-only",
            &[("depth#0", SourceKind::Depth)],
        )]);
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert_eq!(subsystem.sessions_opened(), 0);
        assert_eq!(grabber.stats(), GrabberStats::default());
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_selection_failure() {
        let subsystem = MockCaptureSubsystem::single_color_camera()
            .with_enumerate_error(CaptureError::Backend("enumeration".into()));
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert_eq!(
            grabber.failure().map(InitError::stage),
            Some(InitStage::SelectingSource)
        );
    }

    #[tokio::test]
    async fn test_later_group_color_source_is_selected() {
        let subsystem = MockCaptureSubsystem::new(vec![
            group("g1", &[("g1-color", SourceKind::Color)]),
            group("g2", &[("g2-color", SourceKind::Color)]),
        ]);
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(grabber.is_valid());
        let selected = grabber.selected_source().unwrap();
        assert_eq!(selected.group.id, "g2");
        assert_eq!(selected.source.id, "g2-color");
        assert_eq!(subsystem.reader().unwrap().source().id, "g2-color");
    }

    #[tokio::test]
    async fn test_first_match_policy_selects_earlier_group() {
        let subsystem = MockCaptureSubsystem::new(vec![
            group("g1", &[("g1-color", SourceKind::Color)]),
            group("g2", &[("g2-color", SourceKind::Color)]),
        ]);
        let config = GrabberConfig {
            selection: SelectionPolicy::FirstMatch,
            ..GrabberConfig::default()
        };
        let grabber = FrameGrabber::create(&subsystem, &config).await;
        assert_eq!(grabber.selected_source().unwrap().group.id, "g1");
    }

    #[tokio::test]
    async fn test_session_opened_shared_read_only_on_cpu() {
        let subsystem = MockCaptureSubsystem::single_color_camera();
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(grabber.is_valid());
        let (group, cfg) = subsystem.opened_with().unwrap();
        assert_eq!(group.id, "mock-pv");
        assert_eq!(cfg, SessionConfig::default());
    }

    #[tokio::test]
    async fn test_session_failure_is_absorbed() {
        let subsystem = MockCaptureSubsystem::single_color_camera()
            .with_session_error(CaptureError::DeviceBusy("camera in use".into()));
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert_eq!(subsystem.sessions_opened(), 1);
        assert!(matches!(
            grabber.failure(),
            Some(InitError::SessionOpen(CaptureError::DeviceBusy(_)))
        ));
        assert!(subsystem.reader().is_none());
    }

    #[tokio::test]
    async fn test_reader_creation_failure_is_absorbed() {
        let subsystem = MockCaptureSubsystem::single_color_camera()
            .with_reader_error(CaptureError::NotFound("color#0".into()));
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert_eq!(
            grabber.failure().map(InitError::stage),
            Some(InitStage::CreatingReader)
        );
    }

    #[tokio::test]
    async fn test_start_failure_invalidates_forever() {
        let subsystem = MockCaptureSubsystem::single_color_camera()
            .with_start_status(ReaderStartStatus::DeviceNotAvailable);
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        assert!(!grabber.is_valid());
        assert_eq!(
            grabber.failure(),
            Some(&InitError::ReaderStart(ReaderStartStatus::DeviceNotAvailable))
        );

        let reader = subsystem.reader().unwrap();
        assert!(!reader.has_subscriber());
        reader.push(Arc::new(MockFrame::new(1)));
        reader.notify();
        assert!(grabber.latest_frame().is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_latest_frame() {
        let subsystem = MockCaptureSubsystem::single_color_camera();
        let clock = Arc::new(ManualClock::new(0));
        let grabber =
            FrameGrabber::create_with_clock(&subsystem, &GrabberConfig::default(), clock.clone())
                .await;
        assert!(grabber.is_valid());
        assert!(grabber.latest_frame().is_none());

        let reader = subsystem.reader().unwrap();
        assert!(reader.has_subscriber());

        clock.set(100);
        reader.deliver(Arc::new(MockFrame::new(1)));
        let first = grabber.latest_frame().unwrap();
        assert_eq!(first.timestamp_ms(), 100);
        assert_eq!(first.frame().sequence(), 1);

        clock.set(150);
        reader.deliver(Arc::new(MockFrame::new(2).without_pose()));
        let still = grabber.latest_frame().unwrap();
        assert!(Arc::ptr_eq(&first, &still));
        assert_eq!(still.timestamp_ms(), 100);

        let stats = grabber.stats();
        assert_eq!(stats.frames_arrived, 2);
        assert_eq!(stats.frames_cached, 1);
        assert_eq!(stats.frames_discarded, 1);
    }

    #[tokio::test]
    async fn test_reads_from_other_threads() {
        let subsystem = MockCaptureSubsystem::single_color_camera();
        let grabber = Arc::new(FrameGrabber::create(&subsystem, &GrabberConfig::default()).await);
        let reader = subsystem.reader().unwrap();
        reader.deliver(Arc::new(MockFrame::new(7)));

        let g = Arc::clone(&grabber);
        let seq = std::thread::spawn(move || g.latest_frame().map(|s| s.frame().sequence()))
            .join()
            .unwrap();
        assert_eq!(seq, Some(7));
    }

    #[tokio::test]
    async fn test_drop_stops_reader_and_unsubscribes() {
        let subsystem = MockCaptureSubsystem::single_color_camera();
        let grabber = FrameGrabber::create(&subsystem, &GrabberConfig::default()).await;
        let reader = subsystem.reader().unwrap();
        assert!(reader.is_running());
        drop(grabber);
        assert!(!reader.is_running());
        assert!(!reader.has_subscriber());
    }
}
