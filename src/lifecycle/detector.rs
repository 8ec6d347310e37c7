//! Counts explicit lifecycle notifications.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::PrintEvent;
use crate::metrics::PrinterMetrics;
use crate::shutdown;

/// Where the printer is in its job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintPhase {
    /// No job observed yet.
    #[default]
    Idle,
    /// A job is running.
    Printing,
    /// The last job finished.
    Completed,
    /// The last job was cancelled.
    Cancelled,
    /// The last job failed.
    Failed,
}

impl PrintPhase {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            PrintPhase::Completed | PrintPhase::Cancelled | PrintPhase::Failed
        )
    }

    /// The phase reached on `event`, or `None` if the event repeats an
    /// edge that was already taken.
    ///
    /// Terminal events are accepted from `Idle` since the exporter may
    /// come up in the middle of a job.
    fn after(self, event: PrintEvent) -> Option<PrintPhase> {
        match event {
            PrintEvent::Started if self == PrintPhase::Printing => None,
            PrintEvent::Started => Some(PrintPhase::Printing),
            _ if self.is_terminal() => None,
            PrintEvent::Finished => Some(PrintPhase::Completed),
            PrintEvent::Cancelled => Some(PrintPhase::Cancelled),
            PrintEvent::Failed => Some(PrintPhase::Failed),
        }
    }
}

/// Fans lifecycle notifications into `prints_total{result}`.
///
/// Tracks the job phase so overlapping notifications for one edge are
/// counted once.
pub struct LifecycleDetector {
    metrics: Arc<PrinterMetrics>,
    phase: PrintPhase,
}

impl LifecycleDetector {
    /// Creates a detector in the [`PrintPhase::Idle`] phase.
    pub fn new(metrics: Arc<PrinterMetrics>) -> Self {
        Self {
            metrics,
            phase: PrintPhase::default(),
        }
    }

    /// Current job phase.
    pub fn phase(&self) -> PrintPhase {
        self.phase
    }

    /// Applies one notification; returns true if it was counted.
    pub fn observe(&mut self, event: PrintEvent) -> bool {
        match self.phase.after(event) {
            Some(next) => {
                tracing::info!(event = %event, from = ?self.phase, to = ?next, "Print lifecycle edge");
                self.phase = next;
                self.metrics.record_print_event(event);
                true
            }
            None => {
                tracing::debug!(event = %event, phase = ?self.phase, "Repeated lifecycle event ignored");
                false
            }
        }
    }

    /// Consumes notifications until shutdown or until the source closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PrintEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Lifecycle listener started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut shutdown) => {
                    tracing::info!("Lifecycle listener shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.observe(event);
                    }
                    None => {
                        tracing::info!("Lifecycle event stream closed");
                        break;
                    }
                },
            }
        }
    }
}
