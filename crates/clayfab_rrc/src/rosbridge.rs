//! Instruction channel over a rosbridge v2 websocket.
//!
//! One background task owns the socket. It connects, advertises the command
//! topic, subscribes to the response topic, writes queued commands in FIFO
//! order and routes responses to pending handles by `feedback_id`.
//!
//! Until the first connect succeeds the task keeps retrying and commands
//! wait in the queue. Once connected, a dropped socket loses the session:
//! queued commands are discarded, pending handles fail and every later
//! `send` returns [`RrcError::Disconnected`] until [`InstructionChannel::reconnect`]
//! opens a new session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use async_tungstenite::tungstenite::Message;
use dashmap::DashMap;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::channel::{FeedbackHandle, FeedbackSender, InstructionChannel};
use crate::error::RrcError;
use crate::instruction::RobotCommand;
use crate::messages::{BridgeEvent, BridgeRequest, Feedback, RobotMessage, ROBOT_MESSAGE_TYPE};

/// Sequence ids run from 1 to this value and then wrap.
pub const SEQUENCE_ID_ROLLOVER: u64 = 1_000_000;

/// How long `close` waits for the transport task to flush.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<DashMap<u64, FeedbackSender>>;

/// Where the bridge lives and how to talk to it.
#[derive(Clone, Debug)]
pub struct RosBridgeSettings {
    pub host: String,
    pub port: u16,
    /// Robot namespace, e.g. `/rob1`
    pub namespace: String,
    /// Pause between connect attempts
    pub reconnect_interval: Duration,
}

impl Default for RosBridgeSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9090,
            namespace: "/rob1".to_string(),
            reconnect_interval: Duration::from_secs(1),
        }
    }
}

impl RosBridgeSettings {
    pub fn url(&self) -> Result<Url, RrcError> {
        Url::parse(&format!("ws://{}:{}", self.host, self.port))
            .map_err(|e| RrcError::WebSocket(format!("invalid bridge address: {}", e)))
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.namespace.trim_end_matches('/'), suffix)
    }

    pub fn command_topic(&self) -> String {
        self.topic("robot_command")
    }

    pub fn response_topic(&self) -> String {
        self.topic("robot_response")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Session {
    /// No socket yet, commands queue until the connect succeeds
    Connecting,
    Connected,
    /// The socket dropped after connecting
    Lost,
    Closed,
}

enum Outbound {
    Publish(RobotMessage),
    Close,
}

#[derive(Debug, PartialEq, Eq)]
enum PumpOutcome {
    Closed,
    Dropped,
}

/// Websocket-backed [`InstructionChannel`].
pub struct RosBridgeClient {
    outbound: Sender<Outbound>,
    pending: PendingMap,
    sequence: AtomicU64,
    session: watch::Receiver<Session>,
    reopen: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RosBridgeClient {
    /// Start the transport task. Must be called inside a tokio runtime.
    ///
    /// Returns immediately; use `ensure_connection` to wait for the
    /// controller to answer.
    pub fn connect(settings: RosBridgeSettings) -> Result<Self, RrcError> {
        let url = settings.url()?;
        let (outbound, outbound_rx) = async_channel::unbounded();
        let pending: PendingMap = Arc::new(DashMap::new());
        let (session_tx, session) = watch::channel(Session::Connecting);
        let reopen = Arc::new(Notify::new());

        let task = tokio::spawn(run_transport(
            url,
            settings,
            outbound_rx,
            pending.clone(),
            session_tx,
            reopen.clone(),
        ));

        Ok(Self {
            outbound,
            pending,
            sequence: AtomicU64::new(0),
            session,
            reopen,
            task: Mutex::new(Some(task)),
        })
    }

    fn next_sequence_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) % SEQUENCE_ID_ROLLOVER + 1
    }

    fn session(&self) -> Session {
        *self.session.borrow()
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().ok().and_then(|mut guard| guard.take())
    }
}

#[async_trait]
impl InstructionChannel for RosBridgeClient {
    fn send(&self, command: RobotCommand) -> Result<FeedbackHandle, RrcError> {
        match self.session() {
            Session::Closed => return Err(RrcError::ChannelClosed),
            Session::Lost => return Err(RrcError::Disconnected),
            Session::Connecting | Session::Connected => {}
        }

        let sequence_id = self.next_sequence_id();
        let message = RobotMessage::request(sequence_id, &command);
        trace!(sequence_id, instruction = %message.instruction, "Queueing command");

        if !message.wants_feedback() {
            self.outbound
                .try_send(Outbound::Publish(message))
                .map_err(|_| RrcError::ChannelClosed)?;
            return Ok(FeedbackHandle::resolved(sequence_id, Ok(Feedback::empty(sequence_id))));
        }

        // Register before queueing so a fast answer always finds its sender
        let (tx, handle) = FeedbackHandle::channel(sequence_id);
        self.pending.insert(sequence_id, tx);
        if self.outbound.try_send(Outbound::Publish(message)).is_err() {
            self.pending.remove(&sequence_id);
            return Err(RrcError::ChannelClosed);
        }
        Ok(handle)
    }

    async fn reconnect(&self) -> Result<(), RrcError> {
        if self.session() != Session::Lost {
            return Ok(());
        }
        info!("Reopening bridge session");
        self.reopen.notify_one();
        let mut session = self.session.clone();
        session
            .wait_for(|s| *s != Session::Lost)
            .await
            .map(|_| ())
            .map_err(|_| RrcError::ChannelClosed)
    }

    async fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
        self.outbound.close();
        let Some(mut task) = self.take_task() else {
            return;
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
            Ok(_) => debug!("Bridge transport stopped"),
            Err(_) => {
                warn!("Bridge transport did not stop in {:?}, aborting", CLOSE_TIMEOUT);
                task.abort();
            }
        }
        fail_pending(&self.pending, || RrcError::Disconnected);
    }

    fn is_connected(&self) -> bool {
        self.session() == Session::Connected
    }
}

impl Drop for RosBridgeClient {
    fn drop(&mut self) {
        self.outbound.close();
        if let Some(task) = self.take_task() {
            task.abort();
        }
    }
}

fn fail_pending(pending: &PendingMap, error: impl Fn() -> RrcError) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    if !ids.is_empty() {
        warn!("Failing {} pending commands", ids.len());
    }
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(error()));
        }
    }
}

fn shut_down(pending: &PendingMap, session: &watch::Sender<Session>) {
    session.send_replace(Session::Closed);
    fail_pending(pending, || RrcError::Disconnected);
}

/// Drop everything still queued. Returns true when a close was among it.
fn discard_queued(outbound: &Receiver<Outbound>) -> bool {
    let mut discarded = 0;
    let mut closing = false;
    while let Ok(next) = outbound.try_recv() {
        match next {
            Outbound::Publish(_) => discarded += 1,
            Outbound::Close => closing = true,
        }
    }
    if discarded > 0 {
        warn!(discarded, "Discarded queued commands of a lost session");
    }
    closing || outbound.is_closed()
}

/// Refuse new commands, drop queued ones and fail every pending handle.
/// Returns true when the client closed meanwhile.
fn lose_session(outbound: &Receiver<Outbound>, pending: &PendingMap, session: &watch::Sender<Session>) -> bool {
    session.send_replace(Session::Lost);
    let closing = discard_queued(outbound);
    fail_pending(pending, || RrcError::Disconnected);
    closing
}

/// Park a lost session until a reopen is requested. False once the client
/// closes instead.
async fn await_reopen(outbound: &Receiver<Outbound>, pending: &PendingMap, reopen: &Notify) -> bool {
    loop {
        tokio::select! {
            _ = reopen.notified() => return true,
            next = outbound.recv() => match next {
                Ok(Outbound::Publish(message)) => {
                    warn!(sequence_id = message.sequence_id, "Discarding command sent to a lost session");
                    fail_pending(pending, || RrcError::Disconnected);
                }
                Ok(Outbound::Close) | Err(_) => return false,
            },
        }
    }
}

async fn run_transport(
    url: Url,
    settings: RosBridgeSettings,
    outbound: Receiver<Outbound>,
    pending: PendingMap,
    session: watch::Sender<Session>,
    reopen: Arc<Notify>,
) {
    let command_topic = settings.command_topic();
    let response_topic = settings.response_topic();
    loop {
        if outbound.is_closed() {
            shut_down(&pending, &session);
            return;
        }

        info!("Connecting to robot bridge at {}", url);
        let socket = match async_tungstenite::tokio::connect_async(url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                warn!("Bridge connection failed: {}", e);
                if outbound.is_closed() {
                    shut_down(&pending, &session);
                    return;
                }
                tokio::time::sleep(settings.reconnect_interval).await;
                continue;
            }
        };
        let (mut sink, mut stream) = socket.split();

        if let Err(e) = handshake(&mut sink, &settings).await {
            error!("Bridge handshake failed: {}", e);
            tokio::time::sleep(settings.reconnect_interval).await;
            continue;
        }
        session.send_replace(Session::Connected);
        info!("Connected to robot bridge, namespace {}", settings.namespace);

        match pump(&mut sink, &mut stream, &outbound, &pending, &command_topic, &response_topic).await {
            PumpOutcome::Closed => {
                let _ = sink.close().await;
                shut_down(&pending, &session);
                info!("Bridge connection closed");
                return;
            }
            PumpOutcome::Dropped => {
                error!("🔌 Bridge connection lost, refusing commands until the session is reopened");
                if lose_session(&outbound, &pending, &session) || !await_reopen(&outbound, &pending, &reopen).await {
                    shut_down(&pending, &session);
                    return;
                }
                if discard_queued(&outbound) {
                    shut_down(&pending, &session);
                    return;
                }
                session.send_replace(Session::Connecting);
            }
        }
    }
}

async fn send_json<S>(sink: &mut S, request: &BridgeRequest<'_>) -> Result<(), RrcError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(request).map_err(|e| RrcError::Protocol(e.to_string()))?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| RrcError::WebSocket(e.to_string()))
}

async fn handshake<S>(sink: &mut S, settings: &RosBridgeSettings) -> Result<(), RrcError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let command_topic = settings.command_topic();
    let response_topic = settings.response_topic();
    send_json(
        sink,
        &BridgeRequest::Advertise {
            topic: &command_topic,
            msg_type: ROBOT_MESSAGE_TYPE,
        },
    )
    .await?;
    send_json(
        sink,
        &BridgeRequest::Subscribe {
            topic: &response_topic,
            msg_type: ROBOT_MESSAGE_TYPE,
        },
    )
    .await
}

async fn pump<S, R, E>(
    sink: &mut S,
    stream: &mut R,
    outbound: &Receiver<Outbound>,
    pending: &PendingMap,
    command_topic: &str,
    response_topic: &str,
) -> PumpOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Ok(Outbound::Publish(message)) => {
                    let sequence_id = message.sequence_id;
                    let request = BridgeRequest::Publish { topic: command_topic, msg: &message };
                    if let Err(e) = send_json(sink, &request).await {
                        error!(sequence_id, instruction = %message.instruction, "Could not send command: {}", e);
                        return PumpOutcome::Dropped;
                    }
                    trace!(sequence_id, "Command written");
                }
                Ok(Outbound::Close) | Err(_) => return PumpOutcome::Closed,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_incoming(text.as_str(), pending, response_topic),
                Some(Ok(Message::Close(frame))) => {
                    info!("Bridge sent close: {:?}", frame);
                    return PumpOutcome::Dropped;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Bridge read failed: {}", e);
                    return PumpOutcome::Dropped;
                }
                None => return PumpOutcome::Dropped,
            },
        }
    }
}

fn handle_incoming(text: &str, pending: &PendingMap, response_topic: &str) {
    let event = match serde_json::from_str::<BridgeEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Ignoring unparseable bridge frame: {}", e);
            return;
        }
    };
    match event {
        BridgeEvent::Publish { topic, msg } if topic == response_topic => {
            match serde_json::from_value::<RobotMessage>(msg) {
                Ok(response) => {
                    let id = response.feedback_id;
                    match pending.remove(&id) {
                        Some((_, tx)) => {
                            debug!(feedback_id = id, feedback = %response.feedback, "Feedback received");
                            let _ = tx.send(response.into_feedback());
                        }
                        None => trace!(feedback_id = id, "Feedback with no waiting handle"),
                    }
                }
                Err(e) => {
                    error!("Malformed robot response: {}", e);
                    fail_pending(pending, || RrcError::Protocol(format!("malformed robot response: {}", e)));
                }
            }
        }
        BridgeEvent::Publish { topic, .. } => trace!("Ignoring message on {}", topic),
        BridgeEvent::Status { level, msg } => {
            warn!("Bridge status {}: {}", level.unwrap_or_default(), msg.unwrap_or_default());
        }
        BridgeEvent::Other => {}
    }
}
