//! Frames, joint configurations and minimal trajectories.
//!
//! Every pose in clayfab is a [`Frame`]: a point plus two orthonormal
//! in-plane axes, with the normal derived as their cross product. Frames are
//! the neutral representation produced by the modelling side and consumed by
//! the robot client, which converts them to `(x, y, z, qw, qx, qy, qz)` on the
//! wire.
//!
//! # Example
//!
//! ```rust
//! use clayfab_robotics::{Frame, MinimalTrajectory};
//! use nalgebra::{Point3, Vector3};
//!
//! let location = Frame::new(
//!     Point3::new(100.0, 0.0, 0.0),
//!     Vector3::x(),
//!     Vector3::y(),
//! ).unwrap();
//! let top = location.translated(&location.approach(), 150.0);
//! assert!((top.point().z + 150.0).abs() < 1e-9);
//!
//! let traj = MinimalTrajectory::frames(vec![location, top]).unwrap();
//! assert_eq!(traj.reversed().reversed(), traj);
//! ```

pub mod conversion;
pub mod error;
pub mod frame;
pub mod joints;
pub mod trajectory;

pub use conversion::{quaternion_from_wxyz, quaternion_to_wxyz};
pub use error::GeometryError;
pub use frame::Frame;
pub use joints::JointConfiguration;
pub use trajectory::{MinimalTrajectories, MinimalTrajectory, TrajectoryKind, TrajectoryPoint};
