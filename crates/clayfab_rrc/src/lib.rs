//! Robot client for ABB controllers running the RRC driver behind a
//! rosbridge websocket.
//!
//! The [`InstructionChannel`] trait is the only seam the fabrication runner
//! talks through. [`RosBridgeClient`] implements it over a websocket; tests
//! substitute an in-memory channel.
//!
//! Commands are fire-and-forget by default: [`InstructionChannel::send`]
//! returns a [`FeedbackHandle`] that resolves when the controller reports
//! completion, while dispatch order is always the order of `send` calls.

pub mod channel;
pub mod connection;
pub mod error;
pub mod instruction;
pub mod messages;
pub mod rosbridge;
pub mod supervisor;
pub mod zone;

pub use channel::{FeedbackHandle, FeedbackResult, FeedbackSender, InstructionChannel};
pub use connection::{ConnectionPolicy, ensure_connection};
pub use error::RrcError;
pub use instruction::{
    FeedbackLevel, Instruction, InstructionKind, MotionKind, RobotCommand, wire_form,
};
pub use messages::{Feedback, RobotMessage};
pub use rosbridge::{RosBridgeClient, RosBridgeSettings};
pub use supervisor::{Controller, DockerComposeSupervisor, DriverSupervisor, NoopSupervisor};
pub use zone::Zone;
