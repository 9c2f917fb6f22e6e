//! Bring-up and restart of the driver bridge.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::RrcError;

/// Which controller the bridge talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Controller {
    Real,
    /// RobotStudio virtual controller on the docker host
    #[default]
    Virtual,
}

impl Controller {
    pub fn ip(self) -> &'static str {
        match self {
            Controller::Real => "192.168.125.1",
            Controller::Virtual => "host.docker.internal",
        }
    }
}

impl std::fmt::Display for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Controller::Real => write!(f, "real"),
            Controller::Virtual => write!(f, "virtual"),
        }
    }
}

impl FromStr for Controller {
    type Err = RrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Controller::Real),
            "virtual" => Ok(Controller::Virtual),
            other => Err(RrcError::Supervisor(format!("unknown controller '{}'", other))),
        }
    }
}

/// Keeps the driver bridge running.
///
/// Both operations are fatal on failure; the supervisor does not try to
/// diagnose the robot itself.
#[async_trait]
pub trait DriverSupervisor: Send + Sync {
    /// Make sure the bridge runs against `controller`.
    async fn ensure_up(&self, controller: Controller) -> Result<(), RrcError>;

    /// Force-restart a bridge container or process.
    async fn restart(&self, name: &str) -> Result<(), RrcError>;
}

/// Supervises the bridge as a docker compose project.
#[derive(Clone, Debug)]
pub struct DockerComposeSupervisor {
    pub compose_file: PathBuf,
    /// Settling time after `up -d`
    pub sleep_after_up: Duration,
}

impl DockerComposeSupervisor {
    pub fn new(compose_file: impl Into<PathBuf>, sleep_after_up: Duration) -> Self {
        Self {
            compose_file: compose_file.into(),
            sleep_after_up,
        }
    }

    /// `docker compose -f <file> up -d` with `ROBOT_IP` set for `controller`.
    pub async fn compose_up(&self, controller: Controller) -> Result<(), RrcError> {
        info!(
            "Starting driver bridge from {} for {} controller ({})",
            self.compose_file.display(),
            controller,
            controller.ip()
        );
        let mut command = Command::new("docker");
        command
            .arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .args(["up", "-d"])
            .env("ROBOT_IP", controller.ip());
        run(command, "docker compose up").await?;
        tokio::time::sleep(self.sleep_after_up).await;
        Ok(())
    }
}

#[async_trait]
impl DriverSupervisor for DockerComposeSupervisor {
    async fn ensure_up(&self, controller: Controller) -> Result<(), RrcError> {
        self.compose_up(controller).await
    }

    async fn restart(&self, name: &str) -> Result<(), RrcError> {
        warn!("Restarting driver bridge container {}", name);
        let mut command = Command::new("docker");
        command.args(["restart", name]);
        run(command, "docker restart").await
    }
}

async fn run(mut command: Command, what: &str) -> Result<(), RrcError> {
    let output = command
        .output()
        .await
        .map_err(|e| RrcError::Supervisor(format!("{} could not start: {}", what, e)))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(RrcError::Supervisor(format!(
            "{} exited with {}: {}",
            what,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Supervisor for bridges managed elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSupervisor;

#[async_trait]
impl DriverSupervisor for NoopSupervisor {
    async fn ensure_up(&self, controller: Controller) -> Result<(), RrcError> {
        info!("Assuming driver bridge is already up for {} controller", controller);
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), RrcError> {
        warn!("Restart of {} requested but bridge is externally managed", name);
        Ok(())
    }
}
