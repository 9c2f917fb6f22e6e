//! Operator configuration: tools, work objects, speeds, zones and joint
//! positions.
//!
//! Loaded from YAML. Every option has a default, so a partial file (or none
//! at all) is valid. Unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clayfab_robotics::JointConfiguration;
use clayfab_rrc::{ConnectionPolicy, Controller, RosBridgeSettings, Zone};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FabError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub robot_client: RobotClientConfig,
    pub log_dir: Option<PathBuf>,
    /// Pick station file used when the run data names none
    pub pick_conf: Option<PathBuf>,
    /// Run data used when none is given on the command line
    pub run_data_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotClientConfig {
    pub controller: Controller,
    pub ros: RosConfig,
    pub wobjs: WobjsConfig,
    pub tools: ToolsConfig,
    pub robot_movement: MovementConfig,
    pub docker: DockerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosConfig {
    pub host: String,
    pub port: u16,
    pub namespace: String,
}

impl Default for RosConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9090,
            namespace: "/rob1".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WobjsConfig {
    pub pick: String,
    pub place: String,
}

impl Default for WobjsConfig {
    fn default() -> Self {
        Self {
            pick: "ob_RCF_Pick".to_string(),
            place: "ob_RCF_Place".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub pick_place: PickPlaceToolConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickPlaceToolConfig {
    pub name: String,
    pub io_pin_needles: String,
    pub extend_signal: f64,
    pub retract_signal: f64,
    /// Seconds to wait after switching the needles
    pub needles_pause: f64,
}

impl Default for PickPlaceToolConfig {
    fn default() -> Self {
        Self {
            name: "t_RCF_PickPlace".to_string(),
            io_pin_needles: "doNeedles".to_string(),
            extend_signal: 1.0,
            retract_signal: 0.0,
            needles_pause: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub global_speed_accel: SpeedAccelConfig,
    pub speed: SpeedConfig,
    pub zone: ZoneConfig,
    pub joint_positions: JointPositionsConfig,
    /// Sleep tick of the cycle-time poll loop, seconds
    pub watch_poll_interval: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            global_speed_accel: SpeedAccelConfig::default(),
            speed: SpeedConfig::default(),
            zone: ZoneConfig::default(),
            joint_positions: JointPositionsConfig::default(),
            watch_poll_interval: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedAccelConfig {
    /// Percent of programmed speed
    pub speed_override: f64,
    /// mm/s
    pub speed_max_tcp: f64,
    /// Percent of maximum acceleration
    pub accel: f64,
    pub accel_ramp: f64,
}

impl Default for SpeedAccelConfig {
    fn default() -> Self {
        Self {
            speed_override: 100.0,
            speed_max_tcp: 1000.0,
            accel: 100.0,
            accel_ramp: 100.0,
        }
    }
}

/// Speeds in mm/s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub pick: f64,
    pub place: f64,
    pub travel: f64,
    /// Compression stroke and the move back out of it
    pub pick_place: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            pick: 150.0,
            place: 150.0,
            travel: 500.0,
            pick_place: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub pick: Zone,
    pub place: Zone,
    pub travel: Zone,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            pick: Zone::Z10,
            place: Zone::Z5,
            travel: Zone::Z50,
        }
    }
}

/// Named joint positions, six values in degrees each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointPositionsConfig {
    pub start: [f64; 6],
    pub end: [f64; 6],
    pub travel_trajectory: [f64; 6],
}

impl Default for JointPositionsConfig {
    fn default() -> Self {
        let home = [0.0, 0.0, 0.0, 0.0, 90.0, 0.0];
        Self {
            start: home,
            end: home,
            travel_trajectory: home,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Seconds before a ping counts as lost
    pub timeout_ping: f64,
    /// Seconds to settle after bring-up or restart
    pub sleep_after_up: f64,
    pub compose_file: PathBuf,
    pub bridge_container: String,
    pub ping_attempts: u32,
    /// Bring up and restart the bridge with docker. Off when the bridge is
    /// run by someone else.
    pub manage: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            timeout_ping: 10.0,
            sleep_after_up: 5.0,
            compose_file: PathBuf::from("docker-compose.yml"),
            bridge_container: "abb-driver".to_string(),
            ping_attempts: 3,
            manage: true,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self, FabError> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|source| FabError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, FabError> {
        let content = std::fs::read_to_string(path).map_err(|source| FabError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, FabError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), FabError> {
        let movement = &self.robot_client.robot_movement;
        let speeds = [
            ("speed.pick", movement.speed.pick),
            ("speed.place", movement.speed.place),
            ("speed.travel", movement.speed.travel),
            ("speed.pick_place", movement.speed.pick_place),
            ("global_speed_accel.speed_max_tcp", movement.global_speed_accel.speed_max_tcp),
        ];
        for (name, value) in speeds {
            if !(value.is_finite() && value > 0.0) {
                return Err(FabError::Validation(format!("{} must be positive, got {}", name, value)));
            }
        }
        let seconds = [
            ("watch_poll_interval", movement.watch_poll_interval),
            ("needles_pause", self.robot_client.tools.pick_place.needles_pause),
            ("docker.timeout_ping", self.robot_client.docker.timeout_ping),
            ("docker.sleep_after_up", self.robot_client.docker.sleep_after_up),
        ];
        for (name, value) in seconds {
            if !(value.is_finite() && value >= 0.0) {
                return Err(FabError::Validation(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        if movement.watch_poll_interval == 0.0 {
            return Err(FabError::Validation("watch_poll_interval must be positive".to_string()));
        }
        for (name, joints) in [
            ("start", &movement.joint_positions.start),
            ("end", &movement.joint_positions.end),
            ("travel_trajectory", &movement.joint_positions.travel_trajectory),
        ] {
            JointConfiguration::from_degrees(joints)
                .map_err(|e| FabError::Validation(format!("joint_positions.{}: {}", name, e)))?;
        }
        Ok(())
    }
}

impl RobotClientConfig {
    pub fn bridge_settings(&self) -> RosBridgeSettings {
        RosBridgeSettings {
            host: self.ros.host.clone(),
            port: self.ros.port,
            namespace: self.ros.namespace.clone(),
            ..Default::default()
        }
    }

    pub fn connection_policy(&self) -> ConnectionPolicy {
        ConnectionPolicy {
            attempts: self.docker.ping_attempts.max(1),
            ping_timeout: Duration::from_secs_f64(self.docker.timeout_ping),
            grace_period: Duration::from_secs_f64(self.docker.sleep_after_up),
            bridge_name: self.docker.bridge_container.clone(),
        }
    }
}

impl MovementConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.watch_poll_interval)
    }
}

impl JointPositionsConfig {
    pub fn start(&self) -> Result<JointConfiguration, FabError> {
        Ok(JointConfiguration::from_degrees(&self.start)?)
    }

    pub fn end(&self) -> Result<JointConfiguration, FabError> {
        Ok(JointConfiguration::from_degrees(&self.end)?)
    }

    pub fn travel(&self) -> Result<JointConfiguration, FabError> {
        Ok(JointConfiguration::from_degrees(&self.travel_trajectory)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("{}", Path::new("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
robot_client:
  controller: real
  wobjs:
    pick: ob_Pick2
  tools:
    pick_place:
      needles_pause: 1.5
  robot_movement:
    zone:
      travel: Z100
      place: 3
    joint_positions:
      start: [10, 0, 0, 0, 90, 0]
compress_at_pick: true
log_dir: logs
"#;
        let config = Config::from_yaml(yaml, Path::new("config.yaml")).unwrap();
        let rc = &config.robot_client;
        assert_eq!(rc.controller, Controller::Real);
        assert_eq!(rc.wobjs.pick, "ob_Pick2");
        assert_eq!(rc.wobjs.place, "ob_RCF_Place");
        assert_eq!(rc.tools.pick_place.needles_pause, 1.5);
        assert_eq!(rc.robot_movement.zone.travel, Zone::Z100);
        assert_eq!(rc.robot_movement.zone.place.value(), 3.0);
        assert_eq!(rc.robot_movement.zone.pick, Zone::Z10);
        assert_eq!(rc.robot_movement.joint_positions.start[0], 10.0);
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert!(rc.docker.manage);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_zone = "robot_client:\n  robot_movement:\n    zone:\n      pick: Z7\n";
        assert!(matches!(
            Config::from_yaml(bad_zone, Path::new("c.yaml")),
            Err(FabError::Yaml { .. })
        ));

        let bad_speed = "robot_client:\n  robot_movement:\n    speed:\n      travel: 0\n";
        assert!(matches!(
            Config::from_yaml(bad_speed, Path::new("c.yaml")),
            Err(FabError::Validation(_))
        ));
    }

    #[test]
    fn test_connection_policy_from_docker() {
        let mut config = RobotClientConfig::default();
        config.docker.timeout_ping = 2.5;
        config.docker.ping_attempts = 0;
        let policy = config.connection_policy();
        assert_eq!(policy.ping_timeout, Duration::from_millis(2500));
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.bridge_name, "abb-driver");
    }
}
