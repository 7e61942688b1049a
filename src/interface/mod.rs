//! C10 — External Interaction Interface.
//!
//! Receives messages from outside (chat, RPC, a file drop — whatever the
//! embedding application wires in) and turns each into a
//! `CognitiveEvent{kind: SocialInteraction, priority: high}` pushed onto
//! C2. Purely reactive: this adapter never advances the cognitive loop
//! itself, so request traffic cannot change cadence (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{CognitiveEvent, EventKind};
use crate::queue::{EventQueue, QueueError};

/// Priority assigned to every inbound interaction (§4.8 — "priority:
/// high"). Kept well above the default internally generated priorities
/// so human input is served ahead of routine cognition.
pub const INBOUND_PRIORITY: i32 = 1000;

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("queue rejected the inbound event: {0}")]
    Queue(#[from] QueueError),
}

/// A message received from outside the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub source: String,
    pub body: serde_json::Value,
}

/// Reports whether the interface can currently reach the rest of the
/// system at full fidelity, surfaced to callers so a degraded state
/// (e.g. the queue near capacity) is visible without polling internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub degraded: bool,
}

/// The reactive boundary between the outside world and C2. Holds no
/// cadence state of its own.
pub struct ExternalInterface {
    queue: std::sync::Arc<EventQueue>,
    degraded: AtomicBool,
}

impl ExternalInterface {
    #[must_use]
    pub fn new(queue: std::sync::Arc<EventQueue>) -> Self {
        Self {
            queue,
            degraded: AtomicBool::new(false),
        }
    }

    /// Enqueues `message` as a high-priority `SocialInteraction` event
    /// due immediately. Never touches cognitive state directly; the
    /// response, if any, arrives later as events the engines emit.
    pub async fn receive(&self, message: InboundMessage) -> Result<(), InterfaceError> {
        let event = CognitiveEvent::new(
            EventKind::SocialInteraction,
            INBOUND_PRIORITY,
            serde_json::json!({ "source": message.source, "body": message.body }),
        );
        match self.queue.schedule(event).await {
            Ok(()) => {
                self.degraded.store(false, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}
