//! Simulated controller and fixtures shared by the runner tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use clayfab::CancelFlag;
use clayfab_rrc::{
    Controller, DriverSupervisor, Feedback, FeedbackHandle, FeedbackSender, InstructionChannel, InstructionKind,
    RobotCommand, RrcError,
};
use serde_json::{Value, json};

type Hook = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct SimState {
    sent: Vec<RobotCommand>,
    next_seq: u64,
    cycle_times: VecDeque<f64>,
    silent_pings: usize,
    parked: Vec<FeedbackSender>,
    reads: usize,
    cancel_on_read: Option<(usize, CancelFlag)>,
    on_start_watch: Option<Hook>,
    starts: usize,
    lose_at_start: Option<usize>,
    lost: bool,
    closed: bool,
}

/// In-memory controller. Every command completes immediately except
/// silent pings, which never answer.
#[derive(Default)]
pub struct SimChannel {
    state: Mutex<SimState>,
}

impl SimChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stopwatch readings handed out by successive `ReadWatch`es.
    pub fn with_cycle_times(self, times: &[f64]) -> Self {
        self.state.lock().unwrap().cycle_times = times.iter().copied().collect();
        self
    }

    /// Leave the first `n` pings unanswered.
    pub fn with_silent_pings(self, n: usize) -> Self {
        self.state.lock().unwrap().silent_pings = n;
        self
    }

    /// Trip `flag` when the `nth` (1-based) `ReadWatch` is sent.
    pub fn cancel_on_read(self, nth: usize, flag: CancelFlag) -> Self {
        self.state.lock().unwrap().cancel_on_read = Some((nth, flag));
        self
    }

    /// Lose the connection right after the `nth` (1-based) `StartWatch`.
    pub fn lose_connection_at_start(self, nth: usize) -> Self {
        self.state.lock().unwrap().lose_at_start = Some(nth);
        self
    }

    pub fn on_start_watch(&self, hook: impl FnMut() + Send + 'static) {
        self.state.lock().unwrap().on_start_watch = Some(Box::new(hook));
    }

    pub fn sent(&self) -> Vec<RobotCommand> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn kinds(&self) -> Vec<InstructionKind> {
        self.sent().iter().map(|c| c.instruction.kind()).collect()
    }

    pub fn count(&self, kind: InstructionKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl InstructionChannel for SimChannel {
    fn send(&self, command: RobotCommand) -> Result<FeedbackHandle, RrcError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(RrcError::ChannelClosed);
        }
        if state.lost {
            return Err(RrcError::Disconnected);
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        let kind = command.instruction.kind();
        state.sent.push(command);

        match kind {
            InstructionKind::Noop if state.silent_pings > 0 => {
                state.silent_pings -= 1;
                let (tx, handle) = FeedbackHandle::channel(seq);
                state.parked.push(tx);
                Ok(handle)
            }
            InstructionKind::ReadWatch => {
                state.reads += 1;
                let seconds = state.cycle_times.pop_front().unwrap_or(1.0);
                if let Some((nth, flag)) = &state.cancel_on_read
                    && *nth == state.reads
                {
                    flag.cancel();
                }
                let feedback = Feedback {
                    float_values: vec![seconds],
                    ..Feedback::empty(seq)
                };
                Ok(FeedbackHandle::resolved(seq, Ok(feedback)))
            }
            kind => {
                if kind == InstructionKind::StartWatch {
                    state.starts += 1;
                    state.lost = state.lose_at_start == Some(state.starts);
                    if let Some(hook) = state.on_start_watch.as_mut() {
                        hook();
                    }
                }
                Ok(FeedbackHandle::resolved(seq, Ok(Feedback::empty(seq))))
            }
        }
    }

    async fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// Counts calls instead of touching docker.
#[derive(Default)]
pub struct RecordingSupervisor {
    pub ups: AtomicUsize,
    pub restarts: AtomicUsize,
}

impl RecordingSupervisor {
    pub fn ups(&self) -> usize {
        self.ups.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverSupervisor for RecordingSupervisor {
    async fn ensure_up(&self, _controller: Controller) -> Result<(), RrcError> {
        self.ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restart(&self, _name: &str) -> Result<(), RrcError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn frame_json(x: f64, y: f64, z: f64) -> Value {
    json!({ "point": [x, y, z], "xaxis": [1.0, 0.0, 0.0], "yaxis": [0.0, 1.0, 0.0] })
}

pub fn element_json(id: i64, x: f64) -> Value {
    json!({
        "id": id,
        "location": frame_json(x, 0.0, 0.0),
        "radius": 45.0,
        "height": 150.0,
        "compression_ratio": 0.5,
        "egress_distance": 200.0,
    })
}

pub fn pick_station_json() -> Value {
    json!({
        "pick_frames": [frame_json(0.0, 500.0, 0.0), frame_json(100.0, 500.0, 0.0)],
        "elem_height": 150.0,
        "elem_egress_distance": 200.0,
    })
}

/// Write a run-data file with an inline pick station into `dir`.
pub fn write_run_data(dir: &Path, name: &str, elements: Vec<Value>) -> PathBuf {
    let path = dir.join(name);
    let doc = json!({ "fab_data": elements, "pick_station": pick_station_json() });
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    path
}

/// `placed` flags from a progress file on disk.
pub fn placed_flags(path: &Path) -> Vec<bool> {
    let doc: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    doc["fab_data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["placed"].as_bool().unwrap())
        .collect()
}
