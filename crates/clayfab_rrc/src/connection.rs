//! Connection checks with bounded retries.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::channel::InstructionChannel;
use crate::error::RrcError;
use crate::instruction::Instruction;
use crate::supervisor::DriverSupervisor;

#[derive(Clone, Debug)]
pub struct ConnectionPolicy {
    pub attempts: u32,
    /// Per-ping deadline
    pub ping_timeout: Duration,
    /// Sleep after a bridge restart before pinging again
    pub grace_period: Duration,
    /// Container or process restarted between attempts
    pub bridge_name: String,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            ping_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(5),
            bridge_name: "abb-driver".to_string(),
        }
    }
}

/// Ping the controller with `Noop` until it answers.
///
/// A ping that times out or loses the socket triggers a bridge restart, a
/// fresh channel session and a grace sleep before the next attempt. Other
/// errors are returned as is.
pub async fn ensure_connection<C, S>(
    channel: &C,
    supervisor: &S,
    policy: &ConnectionPolicy,
) -> Result<(), RrcError>
where
    C: InstructionChannel + ?Sized,
    S: DriverSupervisor + ?Sized,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match channel
            .send_and_wait(Instruction::Noop.into(), Some(policy.ping_timeout))
            .await
        {
            Ok(_) => {
                info!(attempt, "🤖 Controller answered ping");
                return Ok(());
            }
            Err(err) if err.is_connection_error() => {
                warn!(attempt, attempts, "Ping failed: {}", err);
                if attempt < attempts {
                    supervisor.restart(&policy.bridge_name).await?;
                    channel.reconnect().await?;
                    sleep(policy.grace_period).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(RrcError::ConnectionFailed { attempts })
}
