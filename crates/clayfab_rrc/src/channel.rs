//! The instruction channel abstraction and its completion futures.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::RrcError;
use crate::instruction::{FeedbackLevel, Instruction, RobotCommand};
use crate::messages::Feedback;

pub type FeedbackResult = Result<Feedback, RrcError>;

/// Sender half held by the transport until the controller answers.
pub type FeedbackSender = oneshot::Sender<FeedbackResult>;

/// Resolves when the controller reports completion of one command.
///
/// Commands sent without feedback get an already-resolved handle. Handles
/// are independent: awaiting them out of order does not affect dispatch.
#[derive(Debug)]
pub struct FeedbackHandle {
    sequence_id: u64,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Pending(oneshot::Receiver<FeedbackResult>),
    Ready(Option<FeedbackResult>),
}

impl FeedbackHandle {
    /// A pending handle and the sender that completes it.
    pub fn channel(sequence_id: u64) -> (FeedbackSender, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                sequence_id,
                state: HandleState::Pending(rx),
            },
        )
    }

    pub fn resolved(sequence_id: u64, result: FeedbackResult) -> Self {
        Self {
            sequence_id,
            state: HandleState::Ready(Some(result)),
        }
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }
}

impl Future for FeedbackHandle {
    type Output = FeedbackResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let sequence_id = this.sequence_id;
        match &mut this.state {
            HandleState::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(RrcError::FeedbackDropped(sequence_id))),
                Poll::Pending => Poll::Pending,
            },
            HandleState::Ready(slot) => {
                Poll::Ready(slot.take().unwrap_or(Err(RrcError::FeedbackDropped(sequence_id))))
            }
        }
    }
}

/// Ordered command pipe to the controller.
///
/// `send` never waits for the robot. Commands are dispatched in the order
/// they were sent and `send_and_wait` acts as a barrier.
#[async_trait]
pub trait InstructionChannel: Send + Sync {
    /// Queue a command and return its completion handle.
    fn send(&self, command: RobotCommand) -> Result<FeedbackHandle, RrcError>;

    /// Drain queued commands, close the transport and stop background tasks.
    async fn close(&self);

    fn is_connected(&self) -> bool {
        true
    }

    /// Open a new session after the transport lost its socket. Until then
    /// `send` fails with `Disconnected`.
    async fn reconnect(&self) -> Result<(), RrcError> {
        Ok(())
    }

    /// Send with feedback and wait for it, optionally bounded by `timeout`.
    async fn send_and_wait(&self, command: RobotCommand, timeout: Option<Duration>) -> FeedbackResult {
        let handle = self.send(command.with_feedback(FeedbackLevel::Done))?;
        match timeout {
            Some(limit) => tokio::time::timeout(limit, handle)
                .await
                .map_err(|_| RrcError::Timeout(limit))?,
            None => handle.await,
        }
    }

    /// Controller stopwatch reading since the last `StartWatch`.
    fn read_watch(&self) -> Result<FeedbackHandle, RrcError> {
        self.send(Instruction::ReadWatch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_resolves_from_sender() {
        let (tx, handle) = FeedbackHandle::channel(5);
        assert_eq!(handle.sequence_id(), 5);
        tx.send(Ok(Feedback::empty(5))).unwrap();
        assert_eq!(handle.await.unwrap().sequence_id, 5);
    }

    #[tokio::test]
    async fn test_dropped_sender_fails_handle() {
        let (tx, handle) = FeedbackHandle::channel(11);
        drop(tx);
        assert_eq!(handle.await, Err(RrcError::FeedbackDropped(11)));
    }

    #[tokio::test]
    async fn test_resolved_handle_is_ready() {
        let handle = FeedbackHandle::resolved(1, Ok(Feedback::empty(1)));
        assert!(handle.await.is_ok());
    }
}
