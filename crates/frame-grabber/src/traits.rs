use crate::{
    CameraIntrinsics, ReaderStartStatus, Result, SessionConfig, SourceDescriptor, SourceGroup,
    SpatialCoordinateSystem,
};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Notification fired by a reader whenever a new frame may be available.
pub type FrameArrivedCallback = Arc<dyn Fn(&dyn FrameReader) + Send + Sync>;

/// Device-level camera API: source enumeration and session setup.
#[async_trait]
pub trait CaptureSubsystem: Send + Sync {
    /// List the frame source groups the device exposes.
    async fn enumerate_source_groups(&self) -> Result<Vec<SourceGroup>>;

    /// Open a capture session bound to `group`.
    async fn open_session(
        &self,
        group: &SourceGroup,
        config: &SessionConfig,
    ) -> Result<Arc<dyn CaptureSession>>;
}

#[async_trait]
pub trait CaptureSession: Send + Sync {
    /// Create a reader for one source of the session's group.
    async fn create_reader(&self, source: &SourceDescriptor) -> Result<Arc<dyn FrameReader>>;
}

#[async_trait]
pub trait FrameReader: Send + Sync {
    async fn start(&self) -> ReaderStartStatus;

    /// Stop delivering frames. Safe to call more than once.
    fn stop(&self);

    /// Register (or with `None`, remove) the frame-arrived handler.
    fn set_frame_arrived(&self, callback: Option<FrameArrivedCallback>);

    /// Most recent frame not yet acquired, if any. Never blocks.
    fn try_acquire_latest_frame(&self) -> Option<Arc<dyn FrameHandle>>;
}

/// One delivered image buffer with its per-frame properties.
pub trait FrameHandle: Debug + Send + Sync {
    /// Monotonic frame number assigned by the subsystem.
    fn sequence(&self) -> u64;

    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Coordinate system attached at capture time, `None` when the device
    /// could not locate the camera.
    fn coordinate_system(&self) -> Option<SpatialCoordinateSystem>;

    fn camera_intrinsics(&self) -> CameraIntrinsics;
}
