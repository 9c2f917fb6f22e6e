//! Pick-and-place fabrication of compressed clay cylinders.
//!
//! A run reads a list of [`FabricationElement`]s, picks fresh cylinders off
//! a [`PickStation`] and places them one by one through an
//! [`InstructionChannel`](clayfab_rrc::InstructionChannel), persisting
//! progress after every placement so an interrupted run can resume.

pub mod config;
pub mod edit;
pub mod element;
pub mod error;
pub mod fs_safe;
pub mod motion;
pub mod pick_station;
pub mod progress;
pub mod run_data;
pub mod runner;

pub use config::{Config, RobotClientConfig};
pub use edit::{EditSequence, Operator, parse_selection};
pub use element::{ElementId, FabricationElement};
pub use error::FabError;
pub use fs_safe::{FsSafeError, atomic_write, atomic_write_json};
pub use motion::{TrajectoryParams, execute_trajectory, pick_sequence, place_sequence};
pub use pick_station::PickStation;
pub use progress::ProgressStore;
pub use run_data::RunData;
pub use runner::{CancelFlag, RunState, RunSummary, Runner, preflight};
