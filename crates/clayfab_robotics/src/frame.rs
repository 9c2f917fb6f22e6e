//! Oriented frames.
//!
//! A frame is a point plus two in-plane axes. The normal is `xaxis × yaxis`
//! and the tool approach direction is its negation, so a frame lying on top
//! of an element with its normal pointing up is approached from above.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::conversion::{quaternion_from_wxyz, quaternion_to_wxyz};
use crate::error::GeometryError;

const AXIS_EPSILON: f64 = 1e-9;

/// Oriented frame in millimetres.
///
/// The axes are orthonormal for every value: the fields are only set by
/// [`Frame::new`], [`Frame::from_quaternion`] and deserialization, and
/// [`Frame::translated`] keeps them untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FrameData", into = "FrameData")]
pub struct Frame {
    point: Point3<f64>,
    xaxis: Vector3<f64>,
    yaxis: Vector3<f64>,
}

/// Plain form used on disk: `{"point": [..], "xaxis": [..], "yaxis": [..]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct FrameData {
    point: [f64; 3],
    xaxis: [f64; 3],
    yaxis: [f64; 3],
}

impl TryFrom<FrameData> for Frame {
    type Error = GeometryError;

    fn try_from(data: FrameData) -> Result<Self, Self::Error> {
        Frame::new(
            Point3::from(data.point),
            Vector3::from(data.xaxis),
            Vector3::from(data.yaxis),
        )
    }
}

impl From<Frame> for FrameData {
    fn from(frame: Frame) -> Self {
        Self {
            point: frame.point.coords.into(),
            xaxis: frame.xaxis.into(),
            yaxis: frame.yaxis.into(),
        }
    }
}

impl Frame {
    /// Build a frame, orthonormalizing the axes.
    ///
    /// `xaxis` is normalized, then `yaxis` is made orthogonal to it
    /// (Gram-Schmidt) and normalized. Zero-length or parallel axes fail.
    pub fn new(
        point: Point3<f64>,
        xaxis: Vector3<f64>,
        yaxis: Vector3<f64>,
    ) -> Result<Self, GeometryError> {
        if !point.coords.iter().chain(xaxis.iter()).chain(yaxis.iter()).all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite("frame"));
        }
        let x_norm = xaxis.norm();
        if x_norm < AXIS_EPSILON {
            return Err(GeometryError::DegenerateFrame("xaxis has zero length"));
        }
        let x = xaxis / x_norm;
        let y_orth = yaxis - x * yaxis.dot(&x);
        let y_norm = y_orth.norm();
        if y_norm < AXIS_EPSILON {
            return Err(GeometryError::DegenerateFrame("yaxis is zero or parallel to xaxis"));
        }
        Ok(Self {
            point,
            xaxis: x,
            yaxis: y_orth / y_norm,
        })
    }

    /// World XY frame at the origin.
    pub fn worldxy() -> Self {
        Self {
            point: Point3::origin(),
            xaxis: Vector3::x(),
            yaxis: Vector3::y(),
        }
    }

    /// Frame from a point and a rotation.
    pub fn from_quaternion(point: Point3<f64>, rotation: &UnitQuaternion<f64>) -> Self {
        Self {
            point,
            xaxis: rotation * Vector3::x(),
            yaxis: rotation * Vector3::y(),
        }
    }

    /// Frame from the controller's `[x, y, z, qw, qx, qy, qz]` layout.
    pub fn from_wire(values: &[f64]) -> Result<Self, GeometryError> {
        if values.len() < 7 {
            return Err(GeometryError::WireLength { expected: 7, actual: values.len() });
        }
        let rotation = quaternion_from_wxyz([values[3], values[4], values[5], values[6]])
            .ok_or(GeometryError::DegenerateFrame("zero quaternion"))?;
        let point = Point3::new(values[0], values[1], values[2]);
        if !point.coords.iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite("frame wire values"));
        }
        Ok(Self::from_quaternion(point, &rotation))
    }

    /// `[x, y, z, qw, qx, qy, qz]` as sent to the controller.
    pub fn to_wire(&self) -> [f64; 7] {
        let [w, x, y, z] = quaternion_to_wxyz(&self.quaternion());
        [self.point.x, self.point.y, self.point.z, w, x, y, z]
    }

    pub fn point(&self) -> &Point3<f64> {
        &self.point
    }

    /// Unit x axis.
    pub fn xaxis(&self) -> &Vector3<f64> {
        &self.xaxis
    }

    /// Unit y axis, orthogonal to [`Frame::xaxis`].
    pub fn yaxis(&self) -> &Vector3<f64> {
        &self.yaxis
    }

    /// `xaxis × yaxis`.
    pub fn normal(&self) -> Vector3<f64> {
        self.xaxis.cross(&self.yaxis)
    }

    /// Direction the tool travels into the element: `-normal`.
    pub fn approach(&self) -> Vector3<f64> {
        -self.normal()
    }

    /// Copy of this frame moved `distance` along `direction`.
    ///
    /// `direction` is expected to be a unit vector; the axes are unchanged.
    pub fn translated(&self, direction: &Vector3<f64>, distance: f64) -> Self {
        Self {
            point: self.point + direction * distance,
            xaxis: self.xaxis,
            yaxis: self.yaxis,
        }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
            self.xaxis,
            self.yaxis,
            self.normal(),
        ]))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.rotation())
    }

    /// Point and axes equal within `tol`.
    pub fn approx_eq(&self, other: &Frame, tol: f64) -> bool {
        (self.point - other.point).norm() <= tol
            && (self.xaxis - other.xaxis).norm() <= tol
            && (self.yaxis - other.yaxis).norm() <= tol
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::worldxy()
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame(point=[{:.3}, {:.3}, {:.3}], xaxis=[{:.3}, {:.3}, {:.3}], yaxis=[{:.3}, {:.3}, {:.3}])",
            self.point.x, self.point.y, self.point.z,
            self.xaxis.x, self.xaxis.y, self.xaxis.z,
            self.yaxis.x, self.yaxis.y, self.yaxis.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vector(rng: &mut StdRng, scale: f64) -> Vector3<f64> {
        Vector3::new(
            rng.random_range(-scale..scale),
            rng.random_range(-scale..scale),
            rng.random_range(-scale..scale),
        )
    }

    fn random_frame(rng: &mut StdRng) -> Frame {
        loop {
            let point = Point3::from(random_vector(rng, 1000.0));
            if let Ok(frame) = Frame::new(point, random_vector(rng, 1.0), random_vector(rng, 1.0)) {
                return frame;
            }
        }
    }

    #[test]
    fn test_worldxy_approach_points_down() {
        let frame = Frame::worldxy();
        assert_eq!(frame.normal(), Vector3::z());
        assert_eq!(frame.approach(), -Vector3::z());
    }

    #[test]
    fn test_new_orthonormalizes() {
        let frame = Frame::new(Point3::origin(), Vector3::new(2.0, 0.0, 0.0), Vector3::new(1.0, 3.0, 0.0)).unwrap();
        assert!(frame.approx_eq(&Frame::worldxy(), 1e-12));
    }

    #[test]
    fn test_degenerate_axes_rejected() {
        assert!(matches!(
            Frame::new(Point3::origin(), Vector3::zeros(), Vector3::y()),
            Err(GeometryError::DegenerateFrame(_))
        ));
        assert!(matches!(
            Frame::new(Point3::origin(), Vector3::x(), Vector3::new(-4.0, 0.0, 0.0)),
            Err(GeometryError::DegenerateFrame(_))
        ));
        assert!(matches!(
            Frame::new(Point3::new(f64::NAN, 0.0, 0.0), Vector3::x(), Vector3::y()),
            Err(GeometryError::NonFinite(_))
        ));
    }

    #[test]
    fn test_random_frames_stay_orthonormal() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let frame = random_frame(&mut rng);
            let moved = frame.translated(&frame.approach(), rng.random_range(0.0..500.0));
            for f in [&frame, &moved] {
                assert!((f.xaxis().norm() - 1.0).abs() < 1e-9);
                assert!((f.yaxis().norm() - 1.0).abs() < 1e-9);
                assert!(f.xaxis().dot(f.yaxis()).abs() < 1e-9);
                assert!((f.normal().norm() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_skewed_axes_are_orthonormalized() {
        let frame = Frame::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(2.0, 0.0, 0.0), Vector3::new(1.0, 3.0, 0.0)).unwrap();
        assert_eq!(frame.point(), &Point3::new(1.0, 2.0, 3.0));
        assert_eq!(frame.xaxis(), &Vector3::x());
        assert!((frame.yaxis() - Vector3::y()).norm() < 1e-12);
        assert!((frame.normal() - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_quaternion_roundtrip() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let frame = random_frame(&mut rng);
            let back = Frame::from_wire(&frame.to_wire()).unwrap();
            assert!(frame.approx_eq(&back, 1e-9), "{} != {}", frame, back);
        }
    }

    #[test]
    fn test_json_shape() {
        let frame = Frame::worldxy().translated(&Vector3::z(), 10.0);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"point": [0.0, 0.0, 10.0], "xaxis": [1.0, 0.0, 0.0], "yaxis": [0.0, 1.0, 0.0]})
        );

        let bad = serde_json::json!({"point": [0, 0, 0], "xaxis": [1, 0, 0], "yaxis": [2, 0, 0]});
        assert!(serde_json::from_value::<Frame>(bad).is_err());
    }
}
