//! Optical and spatial metadata attached to captured frames.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const UNDISTORT_ITERATIONS: usize = 8;

/// Pinhole intrinsics with Brown–Conrady distortion (k1, k2, p1, p2, k3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub distortion: [f64; 5],
}

impl CameraIntrinsics {
    /// Distortion-free intrinsics.
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; 5],
        }
    }

    pub fn with_distortion(mut self, distortion: [f64; 5]) -> Self {
        self.distortion = distortion;
        self
    }

    fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (xd, yd)
    }

    /// Ray through pixel `(u, v)` in camera space, scaled to z = 1.
    pub fn unproject(&self, u: f64, v: f64) -> [f64; 3] {
        let xd = (u - self.cx) / self.fx;
        let yd = (v - self.cy) / self.fy;
        if self.distortion.iter().all(|c| *c == 0.0) {
            return [xd, yd, 1.0];
        }
        // Fixed-point inversion of the distortion model.
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERATIONS {
            let (dx, dy) = self.distort(x, y);
            x += xd - dx;
            y += yd - dy;
        }
        [x, y, 1.0]
    }

    /// Pixel coordinates of a camera-space point, `None` behind the camera.
    pub fn project(&self, p: [f64; 3]) -> Option<[f64; 2]> {
        if p[2] <= 0.0 {
            return None;
        }
        let (x, y) = self.distort(p[0] / p[2], p[1] / p[2]);
        Some([self.fx * x + self.cx, self.fy * y + self.cy])
    }
}

/// Coordinate frame the device attached to an image at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialCoordinateSystem {
    pub id: Uuid,
    /// Row-major camera-to-world transform.
    pub to_world: [[f64; 4]; 4],
}

impl SpatialCoordinateSystem {
    pub fn identity(id: Uuid) -> Self {
        Self {
            id,
            to_world: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn with_translation(mut self, t: [f64; 3]) -> Self {
        for (row, v) in self.to_world.iter_mut().zip(t) {
            row[3] = v;
        }
        self
    }

    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let m = &self.to_world;
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = m[i][0] * p[0] + m[i][1] * p[1] + m[i][2] * p[2] + m[i][3];
        }
        out
    }

    pub fn transform_direction(&self, d: [f64; 3]) -> [f64; 3] {
        let m = &self.to_world;
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = m[i][0] * d[0] + m[i][1] * d[1] + m[i][2] * d[2];
        }
        out
    }
}

pub(crate) fn normalize(v: [f64; 3]) -> [f64; 3] {
    let n = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if n == 0.0 {
        return v;
    }
    [v[0] / n, v[1] / n, v[2] / n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_principal_point_unprojects_to_optical_axis() {
        let intr = CameraIntrinsics::pinhole(1280, 720, 1000.0, 1000.0, 640.0, 360.0);
        assert_eq!(intr.unproject(640.0, 360.0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_project_inverts_unproject_with_distortion() {
        let intr = CameraIntrinsics::pinhole(1280, 720, 1000.0, 1000.0, 640.0, 360.0)
            .with_distortion([-0.05, 0.01, 0.001, -0.0005, 0.0]);
        let ray = intr.unproject(900.0, 500.0);
        let px = intr.project(ray).unwrap();
        assert!(approx(px[0], 900.0), "u = {}", px[0]);
        assert!(approx(px[1], 500.0), "v = {}", px[1]);
    }

    #[test]
    fn test_point_behind_camera_does_not_project() {
        let intr = CameraIntrinsics::pinhole(640, 480, 500.0, 500.0, 320.0, 240.0);
        assert!(intr.project([0.0, 0.0, -1.0]).is_none());
    }

    #[test]
    fn test_translation_moves_points_not_directions() {
        let cs = SpatialCoordinateSystem::identity(Uuid::nil()).with_translation([1.0, 2.0, 3.0]);
        assert_eq!(cs.transform_point([0.0, 0.0, 1.0]), [1.0, 2.0, 4.0]);
        assert_eq!(cs.transform_direction([0.0, 0.0, 1.0]), [0.0, 0.0, 1.0]);
    }
}
