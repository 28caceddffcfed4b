//! frame-grabber: latest-frame acquisition for head-mounted color cameras
//!
//! Selects the device's color camera, opens a shared read-only capture
//! session on it and keeps the most recent frame, together with the
//! coordinate system and intrinsics the device attached to it, available
//! for polling from any thread. The camera driver sits behind the
//! [`CaptureSubsystem`] traits; the default build enables a `mock`
//! backend so that binaries and tests run on any host.

mod types;
pub use types::{
    InitStage, MemoryPreference, ReaderStartStatus, SessionConfig, SharingMode, SourceDescriptor,
    SourceGroup, SourceKind, StreamingMode,
};

mod error;
pub use error::{CaptureError, InitError, Result};

mod spatial;
pub use spatial::{CameraIntrinsics, SpatialCoordinateSystem};

mod traits;
pub use traits::{
    CaptureSession, CaptureSubsystem, FrameArrivedCallback, FrameHandle, FrameReader,
};

mod selector;
pub use selector::{select_color_source, SelectedSource, SelectionPolicy};

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod cache;
pub use cache::{FrameCache, FrameSnapshot};

mod metrics;
pub use metrics::{GrabberMetrics, GrabberStats, MetricsHub};

mod handler;
pub use handler::FrameArrivalHandler;

mod config;
pub use config::{load_config_file, GrabberConfig};

mod grabber;
pub use grabber::FrameGrabber;

#[cfg(feature = "mock")]
pub mod mock;
