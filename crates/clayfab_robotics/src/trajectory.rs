//! Minimal trajectories: short ordered runs of either frames or joint
//! configurations.
//!
//! A trajectory never mixes the two kinds. The kind is decided by the first
//! point and every later point must agree with it.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::frame::Frame;
use crate::joints::JointConfiguration;

/// One point of a trajectory as it appears on disk.
///
/// Frames carry `point`/`xaxis`/`yaxis` keys and joint configurations carry
/// `joint_values`, so the untagged form is unambiguous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrajectoryPoint {
    Frame(Frame),
    Joints(JointConfiguration),
}

impl TrajectoryPoint {
    pub fn kind(&self) -> TrajectoryKind {
        match self {
            TrajectoryPoint::Frame(_) => TrajectoryKind::Frames,
            TrajectoryPoint::Joints(_) => TrajectoryKind::Joints,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrajectoryKind {
    Frames,
    Joints,
}

impl std::fmt::Display for TrajectoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrajectoryKind::Frames => write!(f, "frames"),
            TrajectoryKind::Joints => write!(f, "joints"),
        }
    }
}

/// Non-empty trajectory of a single kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrajectoryPoint>", into = "Vec<TrajectoryPoint>")]
pub enum MinimalTrajectory {
    Frames(Vec<Frame>),
    Joints(Vec<JointConfiguration>),
}

impl MinimalTrajectory {
    pub fn frames(frames: Vec<Frame>) -> Result<Self, GeometryError> {
        if frames.is_empty() {
            return Err(GeometryError::EmptyTrajectory);
        }
        Ok(Self::Frames(frames))
    }

    pub fn joints(joints: Vec<JointConfiguration>) -> Result<Self, GeometryError> {
        if joints.is_empty() {
            return Err(GeometryError::EmptyTrajectory);
        }
        Ok(Self::Joints(joints))
    }

    /// Build from loosely typed points. The first point decides the kind.
    pub fn from_points(points: Vec<TrajectoryPoint>) -> Result<Self, GeometryError> {
        let kind = points.first().ok_or(GeometryError::EmptyTrajectory)?.kind();
        match kind {
            TrajectoryKind::Frames => {
                let mut frames = Vec::with_capacity(points.len());
                for (index, point) in points.into_iter().enumerate() {
                    match point {
                        TrajectoryPoint::Frame(frame) => frames.push(frame),
                        TrajectoryPoint::Joints(_) => return Err(GeometryError::MixedTrajectory { index }),
                    }
                }
                Ok(Self::Frames(frames))
            }
            TrajectoryKind::Joints => {
                let mut joints = Vec::with_capacity(points.len());
                for (index, point) in points.into_iter().enumerate() {
                    match point {
                        TrajectoryPoint::Joints(config) => joints.push(config),
                        TrajectoryPoint::Frame(_) => return Err(GeometryError::MixedTrajectory { index }),
                    }
                }
                Ok(Self::Joints(joints))
            }
        }
    }

    pub fn kind(&self) -> TrajectoryKind {
        match self {
            MinimalTrajectory::Frames(_) => TrajectoryKind::Frames,
            MinimalTrajectory::Joints(_) => TrajectoryKind::Joints,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MinimalTrajectory::Frames(f) => f.len(),
            MinimalTrajectory::Joints(j) => j.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> Vec<TrajectoryPoint> {
        match self {
            MinimalTrajectory::Frames(f) => f.iter().cloned().map(TrajectoryPoint::Frame).collect(),
            MinimalTrajectory::Joints(j) => j.iter().copied().map(TrajectoryPoint::Joints).collect(),
        }
    }

    /// Same kind, opposite order.
    pub fn reversed(&self) -> Self {
        match self {
            MinimalTrajectory::Frames(f) => MinimalTrajectory::Frames(f.iter().rev().cloned().collect()),
            MinimalTrajectory::Joints(j) => MinimalTrajectory::Joints(j.iter().rev().copied().collect()),
        }
    }
}

impl TryFrom<Vec<TrajectoryPoint>> for MinimalTrajectory {
    type Error = GeometryError;

    fn try_from(points: Vec<TrajectoryPoint>) -> Result<Self, Self::Error> {
        Self::from_points(points)
    }
}

impl From<MinimalTrajectory> for Vec<TrajectoryPoint> {
    fn from(traj: MinimalTrajectory) -> Self {
        traj.points()
    }
}

/// Ordered list of trajectories, e.g. a travel or a place approach.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinimalTrajectories(Vec<MinimalTrajectory>);

impl MinimalTrajectories {
    pub fn new(trajectories: Vec<MinimalTrajectory>) -> Self {
        Self(trajectories)
    }

    /// Two-level reversal: the list order and every trajectory's order.
    ///
    /// This is how a return path is derived from its forward path.
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().map(MinimalTrajectory::reversed).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&MinimalTrajectory> {
        self.0.first()
    }

    pub fn split_first(&self) -> Option<(&MinimalTrajectory, &[MinimalTrajectory])> {
        self.0.split_first()
    }

    pub fn split_last(&self) -> Option<(&MinimalTrajectory, &[MinimalTrajectory])> {
        self.0.split_last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MinimalTrajectory> {
        self.0.iter()
    }
}

impl From<Vec<MinimalTrajectory>> for MinimalTrajectories {
    fn from(trajectories: Vec<MinimalTrajectory>) -> Self {
        Self(trajectories)
    }
}

impl<'a> IntoIterator for &'a MinimalTrajectories {
    type Item = &'a MinimalTrajectory;
    type IntoIter = std::slice::Iter<'a, MinimalTrajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn frame_at(z: f64) -> Frame {
        Frame::worldxy().translated(&Vector3::z(), z)
    }

    fn joints(j1: f64) -> JointConfiguration {
        JointConfiguration::from_radians(&[j1, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_kind_from_first_point() {
        let traj = MinimalTrajectory::from_points(vec![TrajectoryPoint::Joints(joints(0.1))]).unwrap();
        assert_eq!(traj.kind(), TrajectoryKind::Joints);
        let traj = MinimalTrajectory::from_points(vec![TrajectoryPoint::Frame(frame_at(1.0))]).unwrap();
        assert_eq!(traj.kind(), TrajectoryKind::Frames);
    }

    #[test]
    fn test_mixed_rejected() {
        let points = vec![
            TrajectoryPoint::Frame(frame_at(0.0)),
            TrajectoryPoint::Frame(frame_at(1.0)),
            TrajectoryPoint::Joints(joints(0.0)),
        ];
        assert_eq!(
            MinimalTrajectory::from_points(points),
            Err(GeometryError::MixedTrajectory { index: 2 })
        );
        assert_eq!(MinimalTrajectory::from_points(vec![]), Err(GeometryError::EmptyTrajectory));
    }

    #[test]
    fn test_mixed_rejected_from_json() {
        let json = serde_json::json!([
            {"point": [0, 0, 0], "xaxis": [1, 0, 0], "yaxis": [0, 1, 0]},
            {"joint_values": [0, 0, 0, 0, 0, 0]}
        ]);
        let err = serde_json::from_value::<MinimalTrajectory>(json).unwrap_err();
        assert!(err.to_string().contains("mixes"), "{}", err);
    }

    #[test]
    fn test_reversal_is_involution() {
        let traj = MinimalTrajectory::frames(vec![frame_at(0.0), frame_at(1.0), frame_at(2.0)]).unwrap();
        let rev = traj.reversed();
        assert_eq!(rev.kind(), TrajectoryKind::Frames);
        assert_eq!(rev.points()[0], TrajectoryPoint::Frame(frame_at(2.0)));
        assert_eq!(rev.reversed(), traj);
    }

    #[test]
    fn test_two_level_reversal() {
        let list = MinimalTrajectories::new(vec![
            MinimalTrajectory::joints(vec![joints(0.0), joints(0.5)]).unwrap(),
            MinimalTrajectory::frames(vec![frame_at(5.0), frame_at(6.0), frame_at(7.0)]).unwrap(),
        ]);
        let rev = list.reversed();
        assert_eq!(rev.len(), 2);
        assert_eq!(rev.first().map(|t| t.kind()), Some(TrajectoryKind::Frames));
        assert_eq!(rev.first().map(|t| t.points()[0].clone()), Some(TrajectoryPoint::Frame(frame_at(7.0))));
        assert_eq!(rev.reversed(), list);
    }

    #[test]
    fn test_json_list_of_lists() {
        let list = MinimalTrajectories::new(vec![MinimalTrajectory::frames(vec![Frame::new(
            Point3::new(1.0, 2.0, 3.0),
            Vector3::y(),
            -Vector3::x(),
        )
        .unwrap()])
        .unwrap()]);
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.is_array());
        assert!(json[0].is_array());
        let back: MinimalTrajectories = serde_json::from_value(json).unwrap();
        assert_eq!(back, list);
    }
}
