//! Process exit codes.
//!
//! - **0**: Success
//! - **1**: Anything not listed below
//! - **2**: Controller unreachable after all retries, or lost mid-run
//! - **3**: Cancelled by the operator
//! - **4**: Protocol or controller-reported error
//! - **5**: Invalid configuration or run data

use clayfab::FabError;
use clayfab_rrc::RrcError;

pub mod codes {
    pub const SUCCESS: u8 = 0;
    pub const GENERIC_ERROR: u8 = 1;
    pub const CONNECTION_ERROR: u8 = 2;
    pub const CANCELLED: u8 = 3;
    pub const PROTOCOL_ERROR: u8 = 4;
    pub const VALIDATION_ERROR: u8 = 5;
}

fn map_rrc_error(err: &RrcError) -> u8 {
    match err {
        e if e.is_connection_error() => codes::CONNECTION_ERROR,
        RrcError::Controller { .. } | RrcError::Protocol(_) | RrcError::ChannelClosed => codes::PROTOCOL_ERROR,
        RrcError::InvalidZone(_) | RrcError::Geometry(_) => codes::VALIDATION_ERROR,
        _ => codes::GENERIC_ERROR,
    }
}

fn map_fab_error(err: &FabError) -> u8 {
    match err {
        FabError::Cancelled => codes::CANCELLED,
        FabError::Robot(e) => map_rrc_error(e),
        e if e.is_validation() => codes::VALIDATION_ERROR,
        _ => codes::GENERIC_ERROR,
    }
}

/// Exit code for an error from any command.
pub fn map_error(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<FabError>() {
            return map_fab_error(e);
        }
        if let Some(e) = cause.downcast_ref::<RrcError>() {
            return map_rrc_error(e);
        }
    }
    codes::GENERIC_ERROR
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Context;

    use super::*;

    #[test]
    fn test_mapping() {
        let cancelled = anyhow::Error::new(FabError::Cancelled).context("running fabrication");
        assert_eq!(map_error(&cancelled), codes::CANCELLED);

        let exhausted = anyhow::Error::new(FabError::Robot(RrcError::ConnectionFailed { attempts: 3 }));
        assert_eq!(map_error(&exhausted), codes::CONNECTION_ERROR);

        let timeout = anyhow::Error::new(RrcError::Timeout(Duration::from_secs(10)));
        assert_eq!(map_error(&timeout), codes::CONNECTION_ERROR);

        let rejected = anyhow::Error::new(FabError::Robot(RrcError::Controller {
            instruction: "r_RRC_MoveToFrame".to_string(),
            message: "ERROR: unreachable".to_string(),
        }));
        assert_eq!(map_error(&rejected), codes::PROTOCOL_ERROR);

        let invalid = anyhow::Error::new(FabError::Validation("bad".to_string()));
        assert_eq!(map_error(&invalid), codes::VALIDATION_ERROR);

        let plain: anyhow::Result<()> = Err(std::io::Error::other("disk")).context("writing");
        assert_eq!(map_error(&plain.unwrap_err()), codes::GENERIC_ERROR);
    }
}
