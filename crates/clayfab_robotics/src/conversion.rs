//! Quaternion conversion utilities.
//!
//! The controller expects orientations as `w, x, y, z` quaternions, while
//! nalgebra stores the vector part first.

use nalgebra::{Quaternion, UnitQuaternion};

/// Split a unit quaternion into `[w, x, y, z]`.
pub fn quaternion_to_wxyz(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Build a unit quaternion from `[w, x, y, z]`, renormalizing.
///
/// Returns `None` for a zero-norm input.
pub fn quaternion_from_wxyz(wxyz: [f64; 4]) -> Option<UnitQuaternion<f64>> {
    let [w, x, y, z] = wxyz;
    let q = Quaternion::new(w, x, y, z);
    if q.norm() <= f64::EPSILON || !q.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    Some(UnitQuaternion::from_quaternion(q))
}
