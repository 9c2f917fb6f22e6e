//! Trajectory execution and the pick and place sequences.
//!
//! Everything here only queues instructions. The controller runs them in
//! order; only `blocking` trajectories wait for completion.

use clayfab_robotics::MinimalTrajectory;
use clayfab_rrc::{Instruction, InstructionChannel, MotionKind, Zone, wire_form};
use tracing::trace;

use crate::config::RobotClientConfig;
use crate::element::FabricationElement;
use crate::error::FabError;

/// Motion parameters for one trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryParams {
    pub speed: f64,
    pub zone: Zone,
    pub motion: MotionKind,
    /// Force `FINE` on the last point
    pub stop_at_last: bool,
    /// Wait for the last point to complete
    pub blocking: bool,
}

impl TrajectoryParams {
    pub fn new(speed: f64, zone: Zone) -> Self {
        Self {
            speed,
            zone,
            motion: MotionKind::Joint,
            stop_at_last: false,
            blocking: false,
        }
    }

    pub fn linear(mut self) -> Self {
        self.motion = MotionKind::Linear;
        self
    }

    pub fn stop_at_last(mut self) -> Self {
        self.stop_at_last = true;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }
}

/// Emit one move per trajectory point.
///
/// All points but the last use `params.zone`. The last one gets `FINE`
/// when `stop_at_last` is set and is awaited when `blocking` is set.
pub async fn execute_trajectory<C>(
    channel: &C,
    trajectory: &MinimalTrajectory,
    params: TrajectoryParams,
) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    let (kind, points) = wire_form(trajectory);
    let Some((last, rest)) = points.split_last() else {
        return Ok(());
    };
    trace!(%kind, points = points.len(), "Executing trajectory");

    for point in rest {
        channel.send(Instruction::move_to(point, params.speed, params.zone, params.motion).into())?;
    }

    let last_zone = if params.stop_at_last { Zone::FINE } else { params.zone };
    let last_move = Instruction::move_to(last, params.speed, last_zone, params.motion);
    if params.blocking {
        channel.send_and_wait(last_move.into(), None).await?;
    } else {
        channel.send(last_move.into())?;
    }
    Ok(())
}

pub fn extend_needles<C>(channel: &C, config: &RobotClientConfig) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    let tool = &config.tools.pick_place;
    channel.send(
        Instruction::SetDigital {
            io: tool.io_pin_needles.clone(),
            value: tool.extend_signal,
        }
        .into(),
    )?;
    Ok(())
}

pub fn retract_needles<C>(channel: &C, config: &RobotClientConfig) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    let tool = &config.tools.pick_place;
    channel.send(
        Instruction::SetDigital {
            io: tool.io_pin_needles.clone(),
            value: tool.retract_signal,
        }
        .into(),
    )?;
    Ok(())
}

fn needles_pause<C>(channel: &C, config: &RobotClientConfig) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    channel.send(Instruction::WaitTime(config.tools.pick_place.needles_pause).into())?;
    Ok(())
}

/// Pick `pick` off the station: over it, down onto it, needles in, back out.
pub fn pick_sequence<C>(channel: &C, config: &RobotClientConfig, pick: &FabricationElement) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    let movement = &config.robot_movement;
    let speed = movement.speed.travel;

    channel.send(Instruction::SetTool(config.tools.pick_place.name.clone()).into())?;
    channel.send(Instruction::SetWorkObject(config.wobjs.pick.clone()).into())?;

    let egress = pick.egress_frame();
    channel.send(
        Instruction::MoveToFrame {
            frame: egress.clone(),
            speed,
            zone: movement.zone.pick,
            motion: MotionKind::Joint,
        }
        .into(),
    )?;
    channel.send(
        Instruction::MoveToFrame {
            frame: pick.top_frame(),
            speed,
            zone: Zone::FINE,
            motion: MotionKind::Joint,
        }
        .into(),
    )?;

    extend_needles(channel, config)?;
    needles_pause(channel, config)?;

    channel.send(
        Instruction::MoveToFrame {
            frame: egress,
            speed,
            zone: movement.zone.pick,
            motion: MotionKind::Linear,
        }
        .into(),
    )?;
    Ok(())
}

/// Travel to `elem`, approach, release, compress and return.
pub async fn place_sequence<C>(channel: &C, config: &RobotClientConfig, elem: &FabricationElement) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
{
    let movement = &config.robot_movement;
    let travel = TrajectoryParams::new(movement.speed.travel, movement.zone.travel);
    let compress = TrajectoryParams::new(movement.speed.pick_place, movement.zone.place);

    channel.send(Instruction::SetTool(config.tools.pick_place.name.clone()).into())?;
    channel.send(Instruction::SetWorkObject(config.wobjs.place.clone()).into())?;

    for trajectory in elem.travel_trajectories().iter() {
        execute_trajectory(channel, trajectory, travel).await?;
    }

    let place = elem.place_trajectories();
    let (compression, approach) = place
        .split_last()
        .ok_or_else(|| FabError::Validation(format!("element {} has no place trajectories", elem.id)))?;
    for trajectory in approach {
        execute_trajectory(channel, trajectory, travel.stop_at_last()).await?;
    }

    retract_needles(channel, config)?;
    needles_pause(channel, config)?;

    execute_trajectory(channel, compression, compress.linear()).await?;

    let return_place = elem.return_place_trajectories();
    let (out_of_compression, leave) = return_place
        .split_first()
        .ok_or_else(|| FabError::Validation(format!("element {} has no return place trajectories", elem.id)))?;
    execute_trajectory(channel, out_of_compression, compress).await?;
    for trajectory in leave {
        execute_trajectory(channel, trajectory, travel).await?;
    }

    for trajectory in elem.return_travel_trajectories().iter() {
        execute_trajectory(channel, trajectory, travel).await?;
    }
    Ok(())
}
