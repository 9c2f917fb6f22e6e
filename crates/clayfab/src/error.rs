//! Error type for the fabrication runner.

use std::path::PathBuf;

use clayfab_robotics::GeometryError;
use clayfab_rrc::RrcError;
use thiserror::Error;

use crate::fs_safe::FsSafeError;

#[derive(Debug, Error)]
pub enum FabError {
    /// Bad input caught before any motion
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Robot(#[from] RrcError),

    #[error("Could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid run data in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Progress could not be written
    #[error("Could not persist progress: {0}")]
    Persist(#[from] FsSafeError),

    #[error("Run cancelled by operator")]
    Cancelled,
}

impl FabError {
    /// Startup errors caused by bad inputs rather than the robot or disk.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FabError::Validation(_) | FabError::Geometry(_) | FabError::Json { .. } | FabError::Yaml { .. }
        ) || matches!(self, FabError::Robot(RrcError::InvalidZone(_) | RrcError::Geometry(_)))
    }

    /// One sentence for the teach pendant.
    pub fn pendant_message(&self) -> String {
        match self {
            FabError::Robot(e) if e.is_connection_error() => "Stopped: lost connection to the controller.".to_string(),
            FabError::Robot(RrcError::Controller { instruction, .. }) => {
                format!("Stopped: controller rejected {}.", instruction)
            }
            FabError::Robot(_) => "Stopped: robot communication error.".to_string(),
            FabError::Persist(_) => "Stopped: progress could not be saved.".to_string(),
            FabError::Cancelled => "Stopped by operator.".to_string(),
            _ => "Stopped: invalid fabrication data.".to_string(),
        }
    }
}
