//! Damage resolver worker
//!
//! The only work that leaves the orchestrating task. Requests go out over an
//! mpsc queue as owned snapshots, answers come back on a per-request oneshot,
//! and the orchestrator applies them itself. Each round trip is bounded by a
//! timeout; there are no retries.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::battle::constants::DEFAULT_RESOLVER_TIMEOUT_MS;
use crate::battle::damage::{resolve_damage, DamageRequest, DamageResponse, ResolverMessage};
use crate::core::error::{BattleError, Result};

/// One queued message plus where to send the answer
#[derive(Debug)]
pub struct ResolverEnvelope {
    pub message: ResolverMessage,
    pub reply: oneshot::Sender<ResolverMessage>,
}

/// Orchestrator-side end of the resolver channel
#[derive(Debug, Clone)]
pub struct ResolverHandle {
    sender: mpsc::Sender<ResolverEnvelope>,
    timeout: Duration,
}

impl ResolverHandle {
    /// Wrap an existing queue (custom workers, tests)
    pub fn new(sender: mpsc::Sender<ResolverEnvelope>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one CALCULATE_DAMAGE request and wait for DAMAGE_CALCULATED
    pub async fn request(&self, request: DamageRequest) -> Result<DamageResponse> {
        let (reply, answer) = oneshot::channel();
        let envelope = ResolverEnvelope {
            message: ResolverMessage::CalculateDamage { payload: request },
            reply,
        };

        let exchange = async {
            self.sender
                .send(envelope)
                .await
                .map_err(|_| BattleError::ResolverUnavailable("worker has stopped".into()))?;
            answer
                .await
                .map_err(|_| BattleError::ResolverUnavailable("worker dropped the request".into()))
        };

        let message = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| BattleError::ResolverTimeout(self.timeout))??;

        match message {
            ResolverMessage::DamageCalculated(response) => Ok(response),
            other => Err(BattleError::ResolverUnavailable(format!(
                "unexpected reply {:?}",
                other
            ))),
        }
    }
}

/// Answer one message; None for messages the worker does not accept
pub fn handle_message(message: ResolverMessage) -> Option<ResolverMessage> {
    match message {
        ResolverMessage::CalculateDamage { payload } => {
            let response = resolve_damage(&payload);
            tracing::debug!(
                "Resolved {} -> {}: {} barrier, {} hp",
                payload.attacker.id,
                payload.target.id,
                response.barrier_damage_dealt,
                response.hp_damage_dealt
            );
            Some(ResolverMessage::DamageCalculated(response))
        }
        ResolverMessage::DamageCalculated(_) => None,
    }
}

/// Start the resolver worker on the current tokio runtime
///
/// The worker exits once every handle has been dropped. The handle starts
/// with the default round-trip bound; the engine applies its configured one.
pub fn spawn_resolver(queue: usize) -> (ResolverHandle, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<ResolverEnvelope>(queue.max(1));

    let worker = tokio::spawn(async move {
        while let Some(envelope) = receiver.recv().await {
            match handle_message(envelope.message) {
                Some(answer) => {
                    if envelope.reply.send(answer).is_err() {
                        tracing::debug!("Resolver reply dropped by requester");
                    }
                }
                None => tracing::warn!("Resolver received a message it cannot answer"),
            }
        }
        tracing::debug!("Damage resolver stopped");
    });

    (
        ResolverHandle::new(sender, Duration::from_millis(DEFAULT_RESOLVER_TIMEOUT_MS)),
        worker,
    )
}
