//! Joint configurations for six-axis arms.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

pub const JOINT_COUNT: usize = 6;

/// Six revolute joint values, stored in radians.
///
/// On disk this is `{"joint_values": [..]}` in radians (an older `values`
/// key is accepted). The controller speaks degrees, see
/// [`JointConfiguration::degrees`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JointData", into = "JointData")]
pub struct JointConfiguration {
    values: [f64; JOINT_COUNT],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct JointData {
    #[serde(alias = "values")]
    joint_values: Vec<f64>,
}

impl TryFrom<JointData> for JointConfiguration {
    type Error = GeometryError;

    fn try_from(data: JointData) -> Result<Self, Self::Error> {
        Self::from_radians(&data.joint_values)
    }
}

impl From<JointConfiguration> for JointData {
    fn from(config: JointConfiguration) -> Self {
        Self {
            joint_values: config.values.to_vec(),
        }
    }
}

impl JointConfiguration {
    pub fn from_radians(values: &[f64]) -> Result<Self, GeometryError> {
        let values: [f64; JOINT_COUNT] = values.try_into().map_err(|_| GeometryError::JointCount {
            expected: JOINT_COUNT,
            actual: values.len(),
        })?;
        if !values.iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite("joint configuration"));
        }
        Ok(Self { values })
    }

    pub fn from_degrees(values: &[f64]) -> Result<Self, GeometryError> {
        let radians: Vec<f64> = values.iter().map(|d| d.to_radians()).collect();
        Self::from_radians(&radians)
    }

    pub fn radians(&self) -> [f64; JOINT_COUNT] {
        self.values
    }

    pub fn degrees(&self) -> [f64; JOINT_COUNT] {
        self.values.map(f64::to_degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_roundtrip() {
        let config = JointConfiguration::from_degrees(&[0.0, 90.0, -45.0, 180.0, 30.0, 0.0]).unwrap();
        assert!((config.radians()[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        let deg = config.degrees();
        assert!((deg[3] - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_joint_count_enforced() {
        assert_eq!(
            JointConfiguration::from_radians(&[0.0; 5]),
            Err(GeometryError::JointCount { expected: 6, actual: 5 })
        );
        let json = serde_json::json!({"joint_values": [0, 0, 0, 0, 0, 0, 0]});
        assert!(serde_json::from_value::<JointConfiguration>(json).is_err());
    }

    #[test]
    fn test_values_alias() {
        let json = serde_json::json!({"values": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]});
        let config: JointConfiguration = serde_json::from_value(json).unwrap();
        assert_eq!(config.radians(), [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let out = serde_json::to_value(config).unwrap();
        assert!(out.get("joint_values").is_some());
    }
}
