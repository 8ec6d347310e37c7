//! Print lifecycle edges.
//!
//! Two ways of counting finished prints are supported:
//!
//! - [`LifecycleDetector`] consumes explicit start/finish/cancel/fail
//!   notifications and counts each edge once. This is the default.
//! - [`CompletionHeuristic`] infers a finish from the completion percent
//!   reaching 100. It cannot see cancellations or failures and may
//!   miscount when the printer briefly reports 100 during another job.

mod detector;
mod heuristic;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use detector::{LifecycleDetector, PrintPhase};
pub use heuristic::CompletionHeuristic;

/// A discrete print lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintEvent {
    /// A job began printing.
    Started,
    /// A job ran to completion.
    Finished,
    /// A job was stopped by the user.
    Cancelled,
    /// A job stopped on a printer error.
    Failed,
}

impl PrintEvent {
    /// All events, in label order of the `prints_total` vector.
    pub const ALL: [PrintEvent; 4] = [
        PrintEvent::Started,
        PrintEvent::Finished,
        PrintEvent::Cancelled,
        PrintEvent::Failed,
    ];

    /// The `result` label value for this event.
    pub fn label(self) -> &'static str {
        match self {
            PrintEvent::Started => "start",
            PrintEvent::Finished => "finish",
            PrintEvent::Cancelled => "cancel",
            PrintEvent::Failed => "fail",
        }
    }
}

impl fmt::Display for PrintEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How finished prints are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleMode {
    /// Count explicit lifecycle notifications.
    #[default]
    Events,
    /// Infer finishes from the completion percent.
    Percent,
}

impl std::str::FromStr for LifecycleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(LifecycleMode::Events),
            "percent" => Ok(LifecycleMode::Percent),
            other => Err(format!("unknown lifecycle mode `{other}` (expected events or percent)")),
        }
    }
}
