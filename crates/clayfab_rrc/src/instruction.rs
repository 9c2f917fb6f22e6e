//! Instruction set understood by the RRC driver on the controller.
//!
//! Every instruction encodes to a pair of value lists (`string_values`,
//! `float_values`) carried by a [`RobotMessage`](crate::messages::RobotMessage).
//! The controller-side program name is `r_RRC_` followed by the instruction
//! name.

use clayfab_robotics::{Frame, JointConfiguration, MinimalTrajectory, TrajectoryPoint};
use serde::{Deserialize, Serialize};

use crate::zone::Zone;

/// Controller-side instruction name prefix.
pub const INSTRUCTION_PREFIX: &str = "r_RRC_";

/// Longest text the pendant shows on one line.
pub const PRINT_TEXT_LIMIT: usize = 80;

/// External axes padded after the six arm joints in `MoveToJoints`.
const EXTERNAL_AXES: usize = 6;

/// Interpolation of a move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionKind {
    /// Straight line in Cartesian space (`L`)
    Linear,
    /// Joint interpolation (`J`)
    #[default]
    Joint,
}

impl MotionKind {
    pub fn wire_code(self) -> &'static str {
        match self {
            MotionKind::Linear => "L",
            MotionKind::Joint => "J",
        }
    }
}

/// Whether the controller reports completion back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeedbackLevel {
    #[default]
    None = 0,
    Done = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Noop,
    SetTool,
    SetWorkObject,
    SetAcceleration,
    SetMaxSpeed,
    SetDigital,
    WaitTime,
    StartWatch,
    StopWatch,
    ReadWatch,
    MoveToFrame,
    MoveToJoints,
    PrintText,
    Stop,
    GetFrame,
    GetJoints,
}

impl InstructionKind {
    pub fn name(self) -> &'static str {
        match self {
            InstructionKind::Noop => "Noop",
            InstructionKind::SetTool => "SetTool",
            InstructionKind::SetWorkObject => "SetWorkObject",
            InstructionKind::SetAcceleration => "SetAcceleration",
            InstructionKind::SetMaxSpeed => "SetMaxSpeed",
            InstructionKind::SetDigital => "SetDigital",
            InstructionKind::WaitTime => "WaitTime",
            InstructionKind::StartWatch => "StartWatch",
            InstructionKind::StopWatch => "StopWatch",
            InstructionKind::ReadWatch => "ReadWatch",
            InstructionKind::MoveToFrame => "MoveToFrame",
            InstructionKind::MoveToJoints => "MoveToJoints",
            InstructionKind::PrintText => "PrintText",
            InstructionKind::Stop => "Stop",
            InstructionKind::GetFrame => "GetFrame",
            InstructionKind::GetJoints => "GetJoints",
        }
    }

    /// Name of the RAPID routine on the controller.
    pub fn wire_name(self) -> String {
        format!("{}{}", INSTRUCTION_PREFIX, self.name())
    }

    /// Reads that are useless without an answer.
    pub fn always_needs_feedback(self) -> bool {
        matches!(
            self,
            InstructionKind::ReadWatch | InstructionKind::GetFrame | InstructionKind::GetJoints
        )
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Noop,
    SetTool(String),
    SetWorkObject(String),
    SetAcceleration { acc: f64, ramp: f64 },
    SetMaxSpeed { override_pct: f64, max_tcp: f64 },
    SetDigital { io: String, value: f64 },
    /// Seconds
    WaitTime(f64),
    StartWatch,
    StopWatch,
    ReadWatch,
    MoveToFrame {
        frame: Frame,
        speed: f64,
        zone: Zone,
        motion: MotionKind,
    },
    MoveToJoints {
        joints: JointConfiguration,
        speed: f64,
        zone: Zone,
    },
    PrintText(String),
    /// Pause the program until the operator presses Play
    Stop,
    GetFrame,
    GetJoints,
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Noop => InstructionKind::Noop,
            Instruction::SetTool(_) => InstructionKind::SetTool,
            Instruction::SetWorkObject(_) => InstructionKind::SetWorkObject,
            Instruction::SetAcceleration { .. } => InstructionKind::SetAcceleration,
            Instruction::SetMaxSpeed { .. } => InstructionKind::SetMaxSpeed,
            Instruction::SetDigital { .. } => InstructionKind::SetDigital,
            Instruction::WaitTime(_) => InstructionKind::WaitTime,
            Instruction::StartWatch => InstructionKind::StartWatch,
            Instruction::StopWatch => InstructionKind::StopWatch,
            Instruction::ReadWatch => InstructionKind::ReadWatch,
            Instruction::MoveToFrame { .. } => InstructionKind::MoveToFrame,
            Instruction::MoveToJoints { .. } => InstructionKind::MoveToJoints,
            Instruction::PrintText(_) => InstructionKind::PrintText,
            Instruction::Stop => InstructionKind::Stop,
            Instruction::GetFrame => InstructionKind::GetFrame,
            Instruction::GetJoints => InstructionKind::GetJoints,
        }
    }

    /// Move to a trajectory point, picking `MoveToFrame` or `MoveToJoints`
    /// by the point's type. `motion` only applies to frames.
    pub fn move_to(point: &TrajectoryPoint, speed: f64, zone: Zone, motion: MotionKind) -> Self {
        match point {
            TrajectoryPoint::Frame(frame) => Instruction::MoveToFrame {
                frame: frame.clone(),
                speed,
                zone,
                motion,
            },
            TrajectoryPoint::Joints(joints) => Instruction::MoveToJoints {
                joints: *joints,
                speed,
                zone,
            },
        }
    }

    /// `(string_values, float_values)` as sent on the wire.
    pub fn encode(&self) -> (Vec<String>, Vec<f64>) {
        match self {
            Instruction::Noop
            | Instruction::StartWatch
            | Instruction::StopWatch
            | Instruction::ReadWatch
            | Instruction::Stop
            | Instruction::GetFrame
            | Instruction::GetJoints => (vec![], vec![]),
            Instruction::SetTool(name) | Instruction::SetWorkObject(name) => (vec![name.clone()], vec![]),
            Instruction::SetAcceleration { acc, ramp } => (vec![], vec![*acc, *ramp]),
            Instruction::SetMaxSpeed { override_pct, max_tcp } => (vec![], vec![*override_pct, *max_tcp]),
            Instruction::SetDigital { io, value } => (vec![io.clone()], vec![*value]),
            Instruction::WaitTime(seconds) => (vec![], vec![*seconds]),
            Instruction::MoveToFrame { frame, speed, zone, motion } => {
                let mut floats = frame.to_wire().to_vec();
                floats.push(*speed);
                floats.push(zone.value());
                (vec![motion.wire_code().to_string()], floats)
            }
            Instruction::MoveToJoints { joints, speed, zone } => {
                let mut floats = joints.degrees().to_vec();
                floats.extend(std::iter::repeat_n(0.0, EXTERNAL_AXES));
                floats.push(*speed);
                floats.push(zone.value());
                (vec![], floats)
            }
            Instruction::PrintText(text) => (vec![text.chars().take(PRINT_TEXT_LIMIT).collect()], vec![]),
        }
    }
}

/// An instruction plus the feedback level it is sent with.
#[derive(Clone, Debug, PartialEq)]
pub struct RobotCommand {
    pub instruction: Instruction,
    pub feedback_level: FeedbackLevel,
}

impl RobotCommand {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            instruction,
            feedback_level: FeedbackLevel::None,
        }
    }

    pub fn with_feedback(mut self, level: FeedbackLevel) -> Self {
        self.feedback_level = level;
        self
    }

    /// Feedback actually requested on the wire. Reads always ask for it.
    pub fn effective_feedback(&self) -> FeedbackLevel {
        if self.instruction.kind().always_needs_feedback() {
            FeedbackLevel::Done
        } else {
            self.feedback_level
        }
    }
}

impl From<Instruction> for RobotCommand {
    fn from(instruction: Instruction) -> Self {
        Self::new(instruction)
    }
}

/// Wire form of a trajectory: the move instruction it needs and its points
/// in order.
pub fn wire_form(trajectory: &MinimalTrajectory) -> (InstructionKind, Vec<TrajectoryPoint>) {
    let kind = match trajectory {
        MinimalTrajectory::Frames(_) => InstructionKind::MoveToFrame,
        MinimalTrajectory::Joints(_) => InstructionKind::MoveToJoints,
    };
    (kind, trajectory.points())
}
