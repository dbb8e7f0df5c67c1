//! Events pushed to whatever front end is attached to the kiosk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    hardware::HardwareOperation,
    targets::{ReactionEvent, TargetOutcome},
    trial::{TrialPhase, TrialResult},
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TrialEvent {
    StateChanged {
        session_id: Option<String>,
        phase: TrialPhase,
    },
    CountdownTick {
        session_id: String,
        value: u8,
    },
    TargetSpawned {
        session_id: String,
        target: ReactionEvent,
        at_ms: u64,
    },
    TargetResolved {
        session_id: String,
        index: u32,
        outcome: TargetOutcome,
        reaction_ms: Option<u64>,
        resolved: u32,
    },
    /// Cosmetic reaction-time readout; never part of the score.
    ReactionTimeShown {
        popup_id: u64,
        index: u32,
        reaction_ms: u64,
    },
    ReactionTimeCleared {
        popup_id: u64,
    },
    HardwareWarning {
        operation: HardwareOperation,
        message: String,
    },
    TrialRecorded {
        result: TrialResult,
        played_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrialEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrialEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget: having no subscribers is not an error.
    pub fn emit(&self, event: TrialEvent) {
        let _ = self.tx.send(event);
    }
}
