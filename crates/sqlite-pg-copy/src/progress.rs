//! Run phases and progress reporting.
//!
//! A run moves through `Idle → Reflecting → (Counting → Copying → Done)* →
//! Finished`, or to `Failed` from any non-terminal phase. [`ProgressTracker`]
//! owns the current phase and forwards every change, plus per-batch progress,
//! to an optional [`ProgressObserver`].

use std::io::Write;

use serde::Serialize;
use tracing::{debug, warn};

use crate::transfer::CopyProgress;

/// Phase of a copy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Reflecting,
    Counting { table: String },
    Copying { table: String },
    Done { table: String, rows: u64 },
    Finished,
    Failed { reason: String },
}

impl RunPhase {
    /// Whether the run may move from `self` to `next`.
    pub fn can_transition_to(&self, next: &RunPhase) -> bool {
        use RunPhase::*;

        match (self, next) {
            (Finished | Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Idle, Reflecting) => true,
            (Reflecting, Counting { .. } | Finished) => true,
            (Counting { table: a }, Copying { table: b }) => a == b,
            (Copying { table: a }, Done { table: b, .. }) => a == b,
            (Done { .. }, Counting { .. } | Finished) => true,
            _ => false,
        }
    }

    /// `Finished` and `Failed` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Finished | RunPhase::Failed { .. })
    }

    /// Short lowercase name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Reflecting => "reflecting",
            RunPhase::Counting { .. } => "counting",
            RunPhase::Copying { .. } => "copying",
            RunPhase::Done { .. } => "done",
            RunPhase::Finished => "finished",
            RunPhase::Failed { .. } => "failed",
        }
    }
}

/// Receives phase changes and batch progress from a run.
pub trait ProgressObserver: Send {
    fn on_phase(&mut self, _phase: &RunPhase) {}

    fn on_batch(&mut self, _progress: &CopyProgress) {}
}

/// Writes one JSON object per event to stderr.
#[derive(Debug, Default)]
pub struct JsonLinesObserver;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProgressEvent<'a> {
    Phase(&'a RunPhase),
    Batch {
        table: &'a str,
        copied: i64,
        total: i64,
        batches: u64,
    },
}

impl JsonLinesObserver {
    fn emit(&self, event: &ProgressEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr().lock(), "{}", json);
        }
    }
}

impl ProgressObserver for JsonLinesObserver {
    fn on_phase(&mut self, phase: &RunPhase) {
        self.emit(&ProgressEvent::Phase(phase));
    }

    fn on_batch(&mut self, progress: &CopyProgress) {
        self.emit(&ProgressEvent::Batch {
            table: &progress.table,
            copied: progress.copied(),
            total: progress.total,
            batches: progress.batches,
        });
    }
}

/// Tracks the current phase of a run.
pub struct ProgressTracker {
    phase: RunPhase,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ProgressTracker {
    pub fn new(observer: Option<Box<dyn ProgressObserver>>) -> Self {
        Self {
            phase: RunPhase::Idle,
            observer,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Move to `next` and notify the observer.
    ///
    /// An illegal transition is logged and ignored; the phase and the
    /// observer are left untouched. Returns whether the phase changed.
    pub fn advance(&mut self, next: RunPhase) -> bool {
        if !self.phase.can_transition_to(&next) {
            warn!(
                "Ignoring phase change {} -> {}",
                self.phase.name(),
                next.name()
            );
            return false;
        }
        debug!("Phase {} -> {}", self.phase.name(), next.name());

        if let Some(observer) = self.observer.as_mut() {
            observer.on_phase(&next);
        }
        self.phase = next;
        true
    }

    /// Report a committed batch.
    pub fn batch(&mut self, progress: &CopyProgress) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_batch(progress);
        }
    }

    /// Move to `Failed` unless the run already ended.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.phase.is_terminal() {
            self.advance(RunPhase::Failed {
                reason: reason.into(),
            });
        }
    }
}
