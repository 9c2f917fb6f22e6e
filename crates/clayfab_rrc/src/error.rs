//! Error type for the robot client.

use std::time::Duration;

use clayfab_robotics::GeometryError;
use thiserror::Error;

/// Errors raised while talking to the controller or supervising its driver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RrcError {
    /// `send_and_wait` did not see feedback in time
    #[error("Timed out after {0:?} waiting for controller feedback")]
    Timeout(Duration),

    /// The socket dropped while the request was in flight
    #[error("Connection to the robot bridge was lost")]
    Disconnected,

    /// The channel was closed before the command could be queued
    #[error("Instruction channel is closed")]
    ChannelClosed,

    /// The transport went away without answering
    #[error("Feedback for sequence {0} was dropped")]
    FeedbackDropped(u64),

    /// The controller answered with an `ERROR...` feedback string
    #[error("Controller rejected {instruction}: {message}")]
    Controller { instruction: String, message: String },

    /// Malformed or unexpected message on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Websocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Driver bring-up or restart failed
    #[error("Driver supervisor failed: {0}")]
    Supervisor(String),

    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    /// `ensure_connection` exhausted its retries
    #[error("Controller did not answer after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl RrcError {
    /// Transport-level failures that a driver restart may cure.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RrcError::Timeout(_)
                | RrcError::Disconnected
                | RrcError::FeedbackDropped(_)
                | RrcError::WebSocket(_)
                | RrcError::ConnectionFailed { .. }
        )
    }
}
