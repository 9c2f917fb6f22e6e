//! The fabrication run.
//!
//! ```text
//! INIT -> PREFLIGHT -> EDIT_SEQUENCE -> WARMUP -> FAB_LOOP -> TEARDOWN -> DONE
//!                                                   |            ^
//!                                                   +-- error / cancel
//! ```
//!
//! Inside the loop the previous element's cycle time is harvested between
//! the current element's pick and place sends, so the controller always has
//! motion queued while the runner does its bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use clayfab_robotics::JointConfiguration;
use clayfab_rrc::{
    ConnectionPolicy, Controller, DriverSupervisor, Feedback, FeedbackHandle, FeedbackLevel, Instruction,
    InstructionChannel, RobotCommand, Zone, ensure_connection,
};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::edit::{EditSequence, Operator};
use crate::error::FabError;
use crate::motion::{pick_sequence, place_sequence, retract_needles};
use crate::pick_station::PickStation;
use crate::progress::ProgressStore;
use crate::run_data::{RunData, resolve_path};

/// Operator interrupt, shared between the signal handler and the runner.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Init,
    Preflight,
    EditSequence,
    Warmup,
    FabLoop,
    Teardown,
    Done,
}

/// What a completed run reports.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub placed: usize,
    pub total: usize,
    /// Seconds, over elements with a recorded cycle time
    pub mean_cycle_time: Option<f64>,
    /// Only when some placed element carries a density
    pub total_weight_kg: Option<f64>,
    pub done_path: PathBuf,
}

/// Bring the driver up and make sure it answers.
pub async fn preflight<C, S>(
    channel: &C,
    supervisor: &S,
    controller: Controller,
    policy: &ConnectionPolicy,
) -> Result<(), FabError>
where
    C: InstructionChannel + ?Sized,
    S: DriverSupervisor + ?Sized,
{
    info!("🔌 Bringing up driver for {} controller ({})", controller, controller.ip());
    supervisor.ensure_up(controller).await?;
    ensure_connection(channel, supervisor, policy).await?;
    info!("✅ Controller is responding");
    Ok(())
}

/// Wait for `handle`, checking `cancel` every `tick`.
async fn wait_cancellable(handle: &mut FeedbackHandle, cancel: &CancelFlag, tick: Duration) -> Result<Feedback, FabError> {
    loop {
        if cancel.is_cancelled() {
            return Err(FabError::Cancelled);
        }
        if let Ok(result) = tokio::time::timeout(tick, &mut *handle).await {
            return Ok(result?);
        }
    }
}

pub struct Runner {
    input_path: PathBuf,
    run_data: RunData,
    pick_station: PickStation,
    config: Config,
    progress: ProgressStore,
    start_joints: JointConfiguration,
    end_joints: JointConfiguration,
    /// Previous element's stopwatch reading, not yet harvested
    pending: Option<(usize, FeedbackHandle)>,
    state: RunState,
}

impl Runner {
    /// INIT: load and validate everything before any motion.
    ///
    /// A `conf_path` in the run data replaces `config`. Relative paths in
    /// the run data resolve against its own directory.
    pub fn load(input: &Path, config: Config) -> Result<Self, FabError> {
        let run_data = RunData::load(input)?;
        let base_dir = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let config = match &run_data.conf_path {
            Some(conf) => {
                let path = resolve_path(&base_dir, conf);
                info!("📋 Using configuration {} named by run data", path.display());
                Config::load(&path)?
            }
            None => config,
        };
        let pick_station = run_data.resolve_pick_station(&base_dir, config.pick_conf.as_deref())?;
        let joints = &config.robot_client.robot_movement.joint_positions;
        let start_joints = joints.start()?;
        let end_joints = joints.end()?;
        let progress = ProgressStore::for_input(input)?;

        info!(
            "📋 {} elements ({} already placed), {} pick frames",
            run_data.fab_data.len(),
            run_data.placed_count(),
            pick_station.pick_frames().len()
        );

        Ok(Self {
            input_path: input.to_path_buf(),
            run_data,
            pick_station,
            config,
            progress,
            start_joints,
            end_joints,
            pending: None,
            state: RunState::Init,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_data(&self) -> &RunData {
        &self.run_data
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn progress_path(&self) -> &Path {
        self.progress.in_progress_path()
    }

    pub fn set_controller(&mut self, controller: Controller) {
        self.config.robot_client.controller = controller;
    }

    /// Log directory from the run data, else from the configuration.
    pub fn log_dir(&self) -> Option<PathBuf> {
        match &self.run_data.log_dir {
            Some(dir) => {
                let base = self.input_path.parent().unwrap_or(Path::new("."));
                Some(resolve_path(base, dir))
            }
            None => self.config.log_dir.clone(),
        }
    }

    /// Drive the run from PREFLIGHT to DONE. The channel is closed on
    /// every exit path.
    pub async fn run<C, S, O>(
        &mut self,
        channel: &C,
        supervisor: &S,
        operator: &mut O,
        cancel: &CancelFlag,
    ) -> Result<RunSummary, FabError>
    where
        C: InstructionChannel + ?Sized,
        S: DriverSupervisor + ?Sized,
        O: Operator + ?Sized,
    {
        let result = self.drive(channel, supervisor, operator, cancel).await;
        match &result {
            Ok(_) => {}
            Err(FabError::Cancelled) => warn!("🛑 Run cancelled, progress is in {}", self.progress_path().display()),
            Err(e) => error!("❌ Fabrication failed in {:?}: {}", self.state, e),
        }
        channel.close().await;
        result
    }

    async fn drive<C, S, O>(
        &mut self,
        channel: &C,
        supervisor: &S,
        operator: &mut O,
        cancel: &CancelFlag,
    ) -> Result<RunSummary, FabError>
    where
        C: InstructionChannel + ?Sized,
        S: DriverSupervisor + ?Sized,
        O: Operator + ?Sized,
    {
        self.state = RunState::Preflight;
        let rc = &self.config.robot_client;
        preflight(channel, supervisor, rc.controller, &rc.connection_policy()).await?;

        self.state = RunState::EditSequence;
        self.edit_sequence(operator)?;

        self.state = RunState::Warmup;
        let mut result = self.warmup(channel, cancel).await;
        if result.is_ok() {
            self.state = RunState::FabLoop;
            result = self.fab_loop(channel, cancel).await;
        }

        self.state = RunState::Teardown;
        if let Err(e) = result {
            self.abort(channel, &e).await;
            return Err(e);
        }

        self.teardown(channel, None, "Finished").await?;
        let done_path = self.progress.finish(&self.run_data)?;
        let summary = self.summarize(done_path);
        self.state = RunState::Done;
        Ok(summary)
    }

    /// EDIT_SEQUENCE: settle which elements still need placing, then
    /// persist once.
    fn edit_sequence<O>(&mut self, operator: &mut O) -> Result<(), FabError>
    where
        O: Operator + ?Sized,
    {
        let sequence = if self.run_data.placed_count() == 0 {
            EditSequence::PlaceAll
        } else {
            operator.choose_sequence(&self.run_data.fab_data)?
        };
        sequence.apply(&mut self.run_data.fab_data, Utc::now());
        info!(
            "📝 Edit sequence {:?}: {} of {} elements left to place",
            sequence,
            self.run_data.fab_data.len() - self.run_data.placed_count(),
            self.run_data.fab_data.len()
        );
        self.progress.write(&self.run_data)?;
        Ok(())
    }

    /// WARMUP: tool, work object and speed caps, a blocking move to the
    /// start position, then wait for Play.
    async fn warmup<C>(&self, channel: &C, cancel: &CancelFlag) -> Result<(), FabError>
    where
        C: InstructionChannel + ?Sized,
    {
        let rc = &self.config.robot_client;
        let movement = &rc.robot_movement;
        let caps = &movement.global_speed_accel;
        let tick = movement.poll_interval();

        channel.send(Instruction::SetTool(rc.tools.pick_place.name.clone()).into())?;
        channel.send(Instruction::SetWorkObject(rc.wobjs.place.clone()).into())?;
        channel.send(
            Instruction::SetAcceleration {
                acc: caps.accel,
                ramp: caps.accel_ramp,
            }
            .into(),
        )?;
        channel.send(
            Instruction::SetMaxSpeed {
                override_pct: caps.speed_override,
                max_tcp: caps.speed_max_tcp,
            }
            .into(),
        )?;

        let start = Instruction::MoveToJoints {
            joints: self.start_joints,
            speed: movement.speed.travel,
            zone: Zone::FINE,
        };
        let mut moved = channel.send(RobotCommand::new(start).with_feedback(FeedbackLevel::Done))?;
        wait_cancellable(&mut moved, cancel, tick).await?;

        channel.send(Instruction::PrintText("Press Play to start fabrication".to_string()).into())?;
        info!("⏸️ Waiting for the operator to press Play");
        let mut play = channel.send(RobotCommand::new(Instruction::Stop).with_feedback(FeedbackLevel::Done))?;
        wait_cancellable(&mut play, cancel, tick).await?;
        Ok(())
    }

    /// FAB_LOOP: pick, harvest the previous cycle time, place, persist.
    async fn fab_loop<C>(&mut self, channel: &C, cancel: &CancelFlag) -> Result<(), FabError>
    where
        C: InstructionChannel + ?Sized,
    {
        let rc = self.config.robot_client.clone();
        let tick = rc.robot_movement.poll_interval();
        let total = self.run_data.fab_data.len();
        let todo: Vec<usize> = (0..total).filter(|&i| !self.run_data.fab_data[i].placed).collect();
        let mut persist_failed = false;

        for index in todo {
            if cancel.is_cancelled() {
                return Err(FabError::Cancelled);
            }

            let id = self.run_data.fab_data[index].id.clone();
            info!(index, id = %id, "🧱 Element {}/{}", index + 1, total);
            channel.send(Instruction::PrintText(format!("Element {} ({}/{})", id, index + 1, total)).into())?;
            channel.send(Instruction::StartWatch.into())?;

            let pick = self.pick_station.next_pick_element();
            pick_sequence(channel, &rc, &pick)?;

            self.harvest(cancel, tick).await?;

            place_sequence(channel, &rc, &self.run_data.fab_data[index]).await?;
            channel.send(Instruction::StopWatch.into())?;
            let watch = channel.read_watch()?;
            self.pending = Some((index, watch));

            self.run_data.fab_data[index].mark_placed(Utc::now());
            self.persist_step(&mut persist_failed)?;
        }

        self.harvest(cancel, tick).await?;
        self.persist_step(&mut persist_failed)?;
        Ok(())
    }

    /// Wait out the pending stopwatch reading and record it.
    async fn harvest(&mut self, cancel: &CancelFlag, tick: Duration) -> Result<(), FabError> {
        let Some((index, mut handle)) = self.pending.take() else {
            return Ok(());
        };
        match wait_cancellable(&mut handle, cancel, tick).await {
            Ok(feedback) => self.record_cycle_time(index, &feedback),
            Err(e) => {
                self.pending = Some((index, handle));
                Err(e)
            }
        }
    }

    fn record_cycle_time(&mut self, index: usize, feedback: &Feedback) -> Result<(), FabError> {
        let seconds = feedback.watch_seconds()?;
        let elem = &mut self.run_data.fab_data[index];
        elem.cycle_time = Some(seconds);
        elem.time_placed = Some(Utc::now());
        debug!(index, id = %elem.id, "⏱️ Cycle time {:.2} s", seconds);
        Ok(())
    }

    /// One failed write is tolerated, a second one in a row is fatal.
    fn persist_step(&self, failed_before: &mut bool) -> Result<(), FabError> {
        match self.progress.write(&self.run_data) {
            Ok(()) => {
                *failed_before = false;
                Ok(())
            }
            Err(e) if !*failed_before => {
                warn!("⚠️ Could not persist progress, continuing one more step: {}", e);
                *failed_before = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// TEARDOWN: retract, go to the end position and say `message`.
    async fn teardown<C>(&self, channel: &C, bound: Option<Duration>, message: &str) -> Result<(), FabError>
    where
        C: InstructionChannel + ?Sized,
    {
        let rc = &self.config.robot_client;
        retract_needles(channel, rc)?;
        let end = Instruction::MoveToJoints {
            joints: self.end_joints,
            speed: rc.robot_movement.speed.travel,
            zone: Zone::FINE,
        };
        channel.send_and_wait(end.into(), bound).await?;
        channel.send(Instruction::PrintText(message.to_string()).into())?;
        Ok(())
    }

    /// Error and cancel path: keep what we know, then a bounded teardown.
    async fn abort<C>(&mut self, channel: &C, reason: &FabError)
    where
        C: InstructionChannel + ?Sized,
    {
        if let Some((index, mut handle)) = self.pending.take()
            && let Ok(Ok(feedback)) = tokio::time::timeout(Duration::ZERO, &mut handle).await
            && let Err(e) = self.record_cycle_time(index, &feedback)
        {
            debug!("Dropping last cycle time: {}", e);
        }

        if let Err(e) = self.progress.write(&self.run_data) {
            error!("❌ Could not persist progress to {}: {}", self.progress_path().display(), e);
        }

        let bound = self.config.robot_client.connection_policy().ping_timeout;
        if let Err(e) = self.teardown(channel, Some(bound), &reason.pendant_message()).await {
            warn!("Teardown did not complete: {}", e);
        }
    }

    fn summarize(&self, done_path: PathBuf) -> RunSummary {
        let placed: Vec<_> = self.run_data.fab_data.iter().filter(|e| e.placed).collect();
        let cycle_times: Vec<f64> = placed.iter().filter_map(|e| e.cycle_time).collect();
        let mean_cycle_time = (!cycle_times.is_empty()).then(|| cycle_times.iter().sum::<f64>() / cycle_times.len() as f64);
        let weights: Vec<f64> = placed.iter().filter_map(|e| e.weight_kg()).collect();
        let total_weight_kg = (!weights.is_empty()).then(|| weights.iter().sum::<f64>());

        let summary = RunSummary {
            placed: placed.len(),
            total: self.run_data.fab_data.len(),
            mean_cycle_time,
            total_weight_kg,
            done_path,
        };
        info!(
            "📊 Placed {}/{} elements, mean cycle time {}, weight {}",
            summary.placed,
            summary.total,
            summary.mean_cycle_time.map_or("n/a".to_string(), |t| format!("{:.1} s", t)),
            summary.total_weight_kg.map_or("n/a".to_string(), |w| format!("{:.1} kg", w)),
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancellable_observes_cancel() {
        let (_tx, mut handle) = FeedbackHandle::channel(3);
        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            flag.cancel();
        });
        let result = wait_cancellable(&mut handle, &cancel, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(FabError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancellable_resolves() {
        let (tx, mut handle) = FeedbackHandle::channel(4);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = tx.send(Ok(Feedback::empty(4)));
        });
        let feedback = wait_cancellable(&mut handle, &CancelFlag::new(), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(feedback.sequence_id, 4);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
