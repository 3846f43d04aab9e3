//! Planar projection from image pixels onto a world reference plane.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Below this magnitude a determinant or homogeneous scale counts as zero.
const SINGULAR_EPS: f64 = 1e-12;

/// Relative tolerance when checking a solved homography against its
/// calibration points.
const REPROJECTION_TOLERANCE: f64 = 1e-4;

/// A point on the world plane, in world units (meters in the reference
/// deployment).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

/// Fixed 3x3 projective transform from the image plane to the world plane.
///
/// Validated on construction, so projecting never fails for points off the
/// horizon line.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Create from row-major rows.
    pub fn new(rows: [[f64; 3]; 3]) -> Result<Self, ConfigError> {
        Self::from_matrix(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    /// Create from nine row-major values.
    pub fn from_row_slice(values: &[f64]) -> Result<Self, ConfigError> {
        if values.len() != 9 {
            return Err(ConfigError::HomographyShape(values.len()));
        }
        Self::from_matrix(Matrix3::from_row_slice(values))
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, ConfigError> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFiniteHomography);
        }
        let determinant = matrix.determinant();
        if !determinant.is_finite() || determinant.abs() < SINGULAR_EPS {
            return Err(ConfigError::SingularHomography { determinant });
        }
        Ok(Self { matrix })
    }

    /// Solve the homography mapping four image points onto four world points.
    ///
    /// Fixes h33 = 1 and solves the remaining eight unknowns directly. No
    /// three of the source points may be collinear.
    pub fn from_correspondences(
        source: &[[f64; 2]; 4],
        target: &[[f64; 2]; 4],
    ) -> Result<Self, ConfigError> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (src, dst)) in source.iter().zip(target.iter()).enumerate() {
            let [x, y] = *src;
            let [u, v] = *dst;
            let r = 2 * i;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or(ConfigError::DegenerateCorrespondences)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        let homography =
            Self::from_matrix(matrix).map_err(|_| ConfigError::DegenerateCorrespondences)?;

        for (src, dst) in source.iter().zip(target.iter()) {
            let projected = homography
                .project(src[0], src[1])
                .ok_or(ConfigError::DegenerateCorrespondences)?;
            let scale = 1.0 + dst[0].abs().max(dst[1].abs());
            let err = (projected.x - dst[0]).abs().max((projected.y - dst[1]).abs());
            if err > REPROJECTION_TOLERANCE * scale {
                return Err(ConfigError::DegenerateCorrespondences);
            }
        }

        Ok(homography)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Project an image point onto the world plane.
    ///
    /// Returns `None` for points on the horizon line, which have no finite
    /// world position.
    pub fn project(&self, x: f64, y: f64) -> Option<WorldPoint> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if !p.z.is_finite() || p.z.abs() < SINGULAR_EPS {
            return None;
        }
        let point = WorldPoint {
            x: p.x / p.z,
            y: p.y / p.z,
        };
        (point.x.is_finite() && point.y.is_finite()).then_some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_identity_projection() {
        let h = Homography::identity();
        let p = h.project(12.5, -3.0).unwrap();
        assert_close(p.x, 12.5);
        assert_close(p.y, -3.0);
    }

    #[test]
    fn test_scale_and_translate() {
        let h = Homography::new([[0.5, 0.0, 10.0], [0.0, 0.25, -4.0], [0.0, 0.0, 1.0]]).unwrap();
        let p = h.project(100.0, 200.0).unwrap();
        assert_close(p.x, 60.0);
        assert_close(p.y, 46.0);
    }

    #[test]
    fn test_projective_divide() {
        let h = Homography::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.001, 1.0]]).unwrap();
        let p = h.project(10.0, 1000.0).unwrap();
        assert_close(p.x, 5.0);
        assert_close(p.y, 500.0);
    }

    #[test]
    fn test_deterministic() {
        let h = Homography::new([[1.2, 0.1, 3.0], [-0.2, 0.9, 1.0], [0.0001, 0.0002, 1.0]])
            .unwrap();
        assert_eq!(h.project(320.0, 240.0), h.project(320.0, 240.0));
    }

    #[test]
    fn test_horizon_line_has_no_projection() {
        let h = Homography::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.01, 1.0]]).unwrap();
        assert!(h.project(0.0, -100.0).is_none());
    }

    #[test]
    fn test_singular_rejected() {
        let err = Homography::new([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, ConfigError::SingularHomography { .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = Homography::from_row_slice(&[1.0, 0.0, 0.0, 0.0, f64::NAN, 0.0, 0.0, 0.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteHomography));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = Homography::from_row_slice(&[1.0; 8]).unwrap_err();
        assert!(matches!(err, ConfigError::HomographyShape(8)));
    }

    #[test]
    fn test_from_correspondences_scale() {
        let source = [[0.0, 0.0], [100.0, 0.0], [100.0, 200.0], [0.0, 200.0]];
        let target = [[0.0, 0.0], [10.0, 0.0], [10.0, 20.0], [0.0, 20.0]];
        let h = Homography::from_correspondences(&source, &target).unwrap();
        let p = h.project(50.0, 100.0).unwrap();
        assert!((p.x - 5.0).abs() < 1e-6);
        assert!((p.y - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_correspondences_trapezoid() {
        // Road section seen in perspective, mapped to a 25 x 250 m rectangle.
        let source = [[1252.0, 787.0], [2298.0, 803.0], [5039.0, 2159.0], [-550.0, 2159.0]];
        let target = [[0.0, 0.0], [24.0, 0.0], [24.0, 249.0], [0.0, 249.0]];
        let h = Homography::from_correspondences(&source, &target).unwrap();
        for (src, dst) in source.iter().zip(target.iter()) {
            let p = h.project(src[0], src[1]).unwrap();
            assert!((p.x - dst[0]).abs() < 1e-3);
            assert!((p.y - dst[1]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_collinear_correspondences_rejected() {
        let source = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let target = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let err = Homography::from_correspondences(&source, &target).unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateCorrespondences));
    }
}
