//! Wire messages: the `RobotMessage` payload and the rosbridge v2 envelope
//! it travels in.

use clayfab_robotics::{Frame, JointConfiguration};
use serde::{Deserialize, Serialize};

use crate::error::RrcError;
use crate::instruction::{FeedbackLevel, RobotCommand};

/// ROS message type of both the command and the response topic.
pub const ROBOT_MESSAGE_TYPE: &str = "compas_rrc_driver/RobotMessage";

/// Execution level: run on the robot task.
const EXEC_LEVEL_ROBOT: u8 = 0;

/// `compas_rrc_driver/RobotMessage`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotMessage {
    pub sequence_id: u64,
    #[serde(default)]
    pub exec_level: u8,
    #[serde(default)]
    pub feedback_level: u8,
    pub instruction: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub feedback_id: u64,
    #[serde(default)]
    pub string_values: Vec<String>,
    #[serde(default)]
    pub float_values: Vec<f64>,
}

impl RobotMessage {
    pub fn request(sequence_id: u64, command: &RobotCommand) -> Self {
        let (string_values, float_values) = command.instruction.encode();
        Self {
            sequence_id,
            exec_level: EXEC_LEVEL_ROBOT,
            feedback_level: command.effective_feedback() as u8,
            instruction: command.instruction.kind().wire_name(),
            feedback: String::new(),
            feedback_id: 0,
            string_values,
            float_values,
        }
    }

    pub fn wants_feedback(&self) -> bool {
        self.feedback_level >= FeedbackLevel::Done as u8
    }

    /// Interpret a response. `ERROR...` feedback becomes a controller error.
    pub fn into_feedback(self) -> Result<Feedback, RrcError> {
        if self.feedback.starts_with("ERROR") {
            return Err(RrcError::Controller {
                instruction: self.instruction,
                message: self.feedback,
            });
        }
        Ok(Feedback {
            sequence_id: self.feedback_id,
            instruction: self.instruction,
            feedback: self.feedback,
            string_values: self.string_values,
            float_values: self.float_values,
        })
    }
}

/// Completed instruction as reported by the controller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feedback {
    /// Sequence id of the request this answers
    pub sequence_id: u64,
    pub instruction: String,
    pub feedback: String,
    pub string_values: Vec<String>,
    pub float_values: Vec<f64>,
}

impl Feedback {
    /// Placeholder for commands sent without feedback.
    pub fn empty(sequence_id: u64) -> Self {
        Self {
            sequence_id,
            ..Default::default()
        }
    }

    /// Stopwatch reading in seconds (`ReadWatch`).
    pub fn watch_seconds(&self) -> Result<f64, RrcError> {
        self.float_values
            .first()
            .copied()
            .ok_or_else(|| RrcError::Protocol(format!("{} returned no watch value", self.instruction)))
    }

    /// Current TCP frame (`GetFrame`).
    pub fn frame(&self) -> Result<Frame, RrcError> {
        Ok(Frame::from_wire(&self.float_values)?)
    }

    /// Current joints in degrees (`GetJoints`).
    pub fn joints(&self) -> Result<JointConfiguration, RrcError> {
        let values = self.float_values.get(..6).ok_or_else(|| {
            RrcError::Protocol(format!("{} returned {} values", self.instruction, self.float_values.len()))
        })?;
        Ok(JointConfiguration::from_degrees(values)?)
    }
}

/// Outgoing rosbridge operations.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BridgeRequest<'a> {
    Advertise {
        topic: &'a str,
        #[serde(rename = "type")]
        msg_type: &'a str,
    },
    Subscribe {
        topic: &'a str,
        #[serde(rename = "type")]
        msg_type: &'a str,
    },
    Publish {
        topic: &'a str,
        msg: &'a RobotMessage,
    },
}

/// Incoming rosbridge operations. Only `publish` carries robot responses.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BridgeEvent {
    Publish {
        topic: String,
        msg: serde_json::Value,
    },
    Status {
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        msg: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn test_request_shape() {
        let command = RobotCommand::from(Instruction::SetTool("t_RCF_PickPlace".into())).with_feedback(FeedbackLevel::Done);
        let msg = RobotMessage::request(42, &command);
        let json = serde_json::to_value(BridgeRequest::Publish {
            topic: "/rob1/robot_command",
            msg: &msg,
        })
        .unwrap();
        assert_eq!(json["op"], "publish");
        assert_eq!(json["msg"]["instruction"], "r_RRC_SetTool");
        assert_eq!(json["msg"]["sequence_id"], 42);
        assert_eq!(json["msg"]["feedback_level"], 1);
        assert_eq!(json["msg"]["string_values"][0], "t_RCF_PickPlace");
    }

    #[test]
    fn test_advertise_shape() {
        let json = serde_json::to_value(BridgeRequest::Advertise {
            topic: "/rob1/robot_command",
            msg_type: ROBOT_MESSAGE_TYPE,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"op": "advertise", "topic": "/rob1/robot_command", "type": ROBOT_MESSAGE_TYPE})
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"op":"publish","topic":"/rob1/robot_response","msg":{"sequence_id":9,"instruction":"r_RRC_ReadWatch","feedback":"Done","feedback_id":7,"float_values":[12.5]}}"#;
        let BridgeEvent::Publish { msg, .. } = serde_json::from_str(raw).unwrap() else {
            panic!("expected publish");
        };
        let feedback = serde_json::from_value::<RobotMessage>(msg).unwrap().into_feedback().unwrap();
        assert_eq!(feedback.sequence_id, 7);
        assert_eq!(feedback.watch_seconds().unwrap(), 12.5);

        let other: BridgeEvent = serde_json::from_str(r#"{"op":"service_response","id":"x"}"#).unwrap();
        assert!(matches!(other, BridgeEvent::Other));
    }

    #[test]
    fn test_controller_error() {
        let msg = RobotMessage {
            instruction: "r_RRC_MoveToFrame".into(),
            feedback: "ERROR: unreachable".into(),
            ..Default::default()
        };
        assert!(matches!(msg.into_feedback(), Err(RrcError::Controller { .. })));
    }

    #[test]
    fn test_joint_feedback() {
        let feedback = Feedback {
            instruction: "r_RRC_GetJoints".into(),
            float_values: vec![0.0, 90.0, -45.0, 0.0, 30.0, 180.0, 0.0, 0.0],
            ..Feedback::empty(4)
        };
        let joints = feedback.joints().unwrap();
        let degrees = joints.degrees();
        assert!((degrees[1] - 90.0).abs() < 1e-9);
        assert!((degrees[5] - 180.0).abs() < 1e-9);

        let short = Feedback {
            float_values: vec![1.0, 2.0],
            ..Feedback::empty(5)
        };
        assert!(matches!(short.joints(), Err(RrcError::Protocol(_))));
    }
}
