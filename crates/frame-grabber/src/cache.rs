//! The latest-frame slot shared between the arrival handler and consumers.

use crate::spatial::normalize;
use crate::{CameraIntrinsics, FrameHandle, SpatialCoordinateSystem};
use std::sync::{Arc, Mutex};

/// One observation: a frame and the pose metadata read from that same frame.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    frame: Arc<dyn FrameHandle>,
    coordinate_system: SpatialCoordinateSystem,
    intrinsics: CameraIntrinsics,
    timestamp_ms: u64,
}

impl FrameSnapshot {
    /// Build a snapshot from a single frame handle.
    ///
    /// Returns `None` when the frame carries no coordinate system and so
    /// cannot be located in space.
    pub fn from_frame(frame: Arc<dyn FrameHandle>, timestamp_ms: u64) -> Option<Self> {
        let coordinate_system = frame.coordinate_system()?;
        let intrinsics = frame.camera_intrinsics();
        Some(Self {
            frame,
            coordinate_system,
            intrinsics,
            timestamp_ms,
        })
    }

    pub fn frame(&self) -> &Arc<dyn FrameHandle> {
        &self.frame
    }

    pub fn coordinate_system(&self) -> &SpatialCoordinateSystem {
        &self.coordinate_system
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Time the snapshot was taken, not the hardware exposure time.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// World-space origin and unit direction of the ray through pixel `(u, v)`.
    pub fn pixel_ray_in_world(&self, u: f64, v: f64) -> ([f64; 3], [f64; 3]) {
        let ray = self.intrinsics.unproject(u, v);
        let origin = self.coordinate_system.transform_point([0.0, 0.0, 0.0]);
        let direction = normalize(self.coordinate_system.transform_direction(ray));
        (origin, direction)
    }
}

/// Single-slot holder of the most recent snapshot.
///
/// The slot is only ever replaced as a whole, so readers see one complete
/// snapshot or none at all.
#[derive(Debug, Default)]
pub struct FrameCache {
    slot: Mutex<Option<Arc<FrameSnapshot>>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: FrameSnapshot) -> Option<Arc<FrameSnapshot>> {
        let next = Arc::new(snapshot);
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.replace(next)
    }

    /// Current snapshot, `None` before the first accepted frame.
    pub fn latest(&self) -> Option<Arc<FrameSnapshot>> {
        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.latest().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFrame;

    #[test]
    fn test_snapshot_requires_coordinate_system() {
        let frame: Arc<dyn FrameHandle> = Arc::new(MockFrame::new(1).without_pose());
        assert!(FrameSnapshot::from_frame(frame, 10).is_none());
    }

    #[test]
    fn test_snapshot_reads_metadata_from_its_frame() {
        let mock = MockFrame::new(42);
        let expected_cs = mock.coordinate_system().unwrap();
        let expected_intr = mock.camera_intrinsics();
        let snap = FrameSnapshot::from_frame(Arc::new(mock), 100).unwrap();
        assert_eq!(snap.frame().sequence(), 42);
        assert_eq!(snap.coordinate_system(), &expected_cs);
        assert_eq!(snap.intrinsics(), &expected_intr);
        assert_eq!(snap.timestamp_ms(), 100);
    }

    #[test]
    fn test_empty_cache_has_no_snapshot() {
        let cache = FrameCache::new();
        assert!(cache.is_empty());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_replace_returns_previous_snapshot() {
        let cache = FrameCache::new();
        let first = FrameSnapshot::from_frame(Arc::new(MockFrame::new(1)), 1).unwrap();
        let second = FrameSnapshot::from_frame(Arc::new(MockFrame::new(2)), 2).unwrap();
        assert!(cache.replace(first).is_none());
        let prev = cache.replace(second).unwrap();
        assert_eq!(prev.frame().sequence(), 1);
        assert_eq!(cache.latest().unwrap().frame().sequence(), 2);
    }

    #[test]
    fn test_repeated_reads_return_same_snapshot() {
        let cache = FrameCache::new();
        cache.replace(FrameSnapshot::from_frame(Arc::new(MockFrame::new(5)), 77).unwrap());
        let a = cache.latest().unwrap();
        let b = cache.latest().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.timestamp_ms(), b.timestamp_ms());
    }

    #[test]
    fn test_pixel_ray_in_world_follows_camera_pose() {
        let snap = FrameSnapshot::from_frame(Arc::new(MockFrame::new(3)), 0).unwrap();
        let intr = snap.intrinsics().clone();
        let (origin, dir) = snap.pixel_ray_in_world(intr.cx, intr.cy);
        let expected_origin = snap.coordinate_system().transform_point([0.0, 0.0, 0.0]);
        assert_eq!(origin, expected_origin);
        assert!((dir[2] - 1.0).abs() < 1e-9);
    }
}
