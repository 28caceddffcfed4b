//! In-process capture subsystem for tests, demos and hosts without a camera.

use crate::{
    CameraIntrinsics, CaptureError, CaptureSession, CaptureSubsystem, FrameArrivedCallback,
    FrameHandle, FrameReader, ReaderStartStatus, Result, SessionConfig, SourceDescriptor,
    SourceGroup, SourceKind, SpatialCoordinateSystem,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A synthetic frame whose metadata is derived from its sequence number.
#[derive(Debug, Clone)]
pub struct MockFrame {
    sequence: u64,
    width: u32,
    height: u32,
    coordinate_system: Option<SpatialCoordinateSystem>,
    intrinsics: CameraIntrinsics,
}

impl MockFrame {
    pub fn new(sequence: u64) -> Self {
        let width = 1280;
        let height = 720;
        let focal = 1000.0 + sequence as f64;
        Self {
            sequence,
            width,
            height,
            coordinate_system: Some(
                SpatialCoordinateSystem::identity(Uuid::from_u128(u128::from(sequence)))
                    .with_translation([sequence as f64 * 0.01, 0.0, 0.0]),
            ),
            intrinsics: CameraIntrinsics::pinhole(
                width,
                height,
                focal,
                focal,
                f64::from(width) / 2.0,
                f64::from(height) / 2.0,
            ),
        }
    }

    /// Same frame as if the device had lost tracking.
    pub fn without_pose(mut self) -> Self {
        self.coordinate_system = None;
        self
    }
}

impl FrameHandle for MockFrame {
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn coordinate_system(&self) -> Option<SpatialCoordinateSystem> {
        self.coordinate_system.clone()
    }

    fn camera_intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics.clone()
    }
}

/// A reader whose frames are pushed by the test or demo driving it.
pub struct MockFrameReader {
    source: SourceDescriptor,
    start_status: ReaderStartStatus,
    running: AtomicBool,
    pending: Mutex<Option<Arc<dyn FrameHandle>>>,
    callback: Mutex<Option<FrameArrivedCallback>>,
}

impl MockFrameReader {
    pub fn new(source: SourceDescriptor, start_status: ReaderStartStatus) -> Self {
        Self {
            source,
            start_status,
            running: AtomicBool::new(false),
            pending: Mutex::new(None),
            callback: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn has_subscriber(&self) -> bool {
        self.callback
            .lock()
            .map(|cb| cb.is_some())
            .unwrap_or(false)
    }

    /// Make `frame` the latest one without notifying anyone.
    pub fn push(&self, frame: Arc<dyn FrameHandle>) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(frame);
        }
    }

    /// Make `frame` the latest one and fire the frame-arrived handler.
    ///
    /// Callable from any thread. Frames are dropped when the reader is not
    /// running, as a stopped device would.
    pub fn deliver(&self, frame: Arc<dyn FrameHandle>) {
        if !self.is_running() {
            return;
        }
        self.push(frame);
        self.notify();
    }

    /// Fire the frame-arrived handler without providing a frame.
    pub fn notify(&self) {
        let callback = self.callback.lock().ok().and_then(|cb| cb.clone());
        if let Some(callback) = callback {
            callback.as_ref()(self);
        }
    }
}

#[async_trait]
impl FrameReader for MockFrameReader {
    async fn start(&self) -> ReaderStartStatus {
        if self.start_status.is_success() {
            self.running.store(true, Ordering::SeqCst);
        }
        self.start_status
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_frame_arrived(&self, callback: Option<FrameArrivedCallback>) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = callback;
        }
    }

    fn try_acquire_latest_frame(&self) -> Option<Arc<dyn FrameHandle>> {
        self.pending.lock().ok().and_then(|mut p| p.take())
    }
}

pub struct MockSession {
    group: SourceGroup,
    start_status: ReaderStartStatus,
    reader_error: Option<CaptureError>,
    readers: Mutex<Vec<Arc<MockFrameReader>>>,
}

impl MockSession {
    pub fn group(&self) -> &SourceGroup {
        &self.group
    }
}

#[async_trait]
impl CaptureSession for MockSession {
    async fn create_reader(&self, source: &SourceDescriptor) -> Result<Arc<dyn FrameReader>> {
        if let Some(err) = &self.reader_error {
            return Err(err.clone());
        }
        if !self.group.sources.iter().any(|s| s.id == source.id) {
            return Err(CaptureError::NotFound(format!(
                "source {} not in group {}",
                source.id, self.group.id
            )));
        }
        let reader = Arc::new(MockFrameReader::new(source.clone(), self.start_status));
        if let Ok(mut readers) = self.readers.lock() {
            readers.push(Arc::clone(&reader));
        }
        Ok(reader)
    }
}

/// Scripted capture subsystem.
///
/// Every failure point of the initialization sequence can be triggered,
/// and the readers it hands out stay reachable through [`Self::reader`]
/// so frames can be delivered after the grabber is built.
pub struct MockCaptureSubsystem {
    groups: Vec<SourceGroup>,
    enumerate_error: Option<CaptureError>,
    session_error: Option<CaptureError>,
    reader_error: Option<CaptureError>,
    start_status: ReaderStartStatus,
    sessions_opened: AtomicUsize,
    opened_with: Mutex<Option<(SourceGroup, SessionConfig)>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockCaptureSubsystem {
    pub fn new(groups: Vec<SourceGroup>) -> Self {
        Self {
            groups,
            enumerate_error: None,
            session_error: None,
            reader_error: None,
            start_status: ReaderStartStatus::Success,
            sessions_opened: AtomicUsize::new(0),
            opened_with: Mutex::new(None),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// A device with a single color camera plus a depth group.
    pub fn single_color_camera() -> Self {
        Self::new(vec![
            SourceGroup {
                id: "mock-depth".to_string(),
                display_name: "Mock depth sensor".to_string(),
                sources: vec![SourceDescriptor::new("depth#0", SourceKind::Depth)],
            },
            SourceGroup {
                id: "mock-pv".to_string(),
                display_name: "Mock PV camera".to_string(),
                sources: vec![SourceDescriptor::new("color#0", SourceKind::Color)],
            },
        ])
    }

    pub fn with_enumerate_error(mut self, err: CaptureError) -> Self {
        self.enumerate_error = Some(err);
        self
    }

    pub fn with_session_error(mut self, err: CaptureError) -> Self {
        self.session_error = Some(err);
        self
    }

    pub fn with_reader_error(mut self, err: CaptureError) -> Self {
        self.reader_error = Some(err);
        self
    }

    pub fn with_start_status(mut self, status: ReaderStartStatus) -> Self {
        self.start_status = status;
        self
    }

    pub fn groups(&self) -> &[SourceGroup] {
        &self.groups
    }

    /// Number of `open_session` calls, successful or not.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Group and settings of the last `open_session` call.
    pub fn opened_with(&self) -> Option<(SourceGroup, SessionConfig)> {
        self.opened_with.lock().ok().and_then(|o| o.clone())
    }

    /// The most recently created reader.
    pub fn reader(&self) -> Option<Arc<MockFrameReader>> {
        let sessions = self.sessions.lock().ok()?;
        sessions
            .iter()
            .rev()
            .find_map(|s| s.readers.lock().ok().and_then(|r| r.last().cloned()))
    }
}

#[async_trait]
impl CaptureSubsystem for MockCaptureSubsystem {
    async fn enumerate_source_groups(&self) -> Result<Vec<SourceGroup>> {
        match &self.enumerate_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.groups.clone()),
        }
    }

    async fn open_session(
        &self,
        group: &SourceGroup,
        config: &SessionConfig,
    ) -> Result<Arc<dyn CaptureSession>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut opened) = self.opened_with.lock() {
            *opened = Some((group.clone(), *config));
        }
        if let Some(err) = &self.session_error {
            return Err(err.clone());
        }
        let session = Arc::new(MockSession {
            group: group.clone(),
            start_status: self.start_status,
            reader_error: self.reader_error.clone(),
            readers: Mutex::new(Vec::new()),
        });
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(Arc::clone(&session));
        }
        Ok(session)
    }
}
