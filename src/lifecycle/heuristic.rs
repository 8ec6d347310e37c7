//! Finish detection from completion percent.

/// Detects a finished print when the completion percent becomes 100.
///
/// Carries the last observed percent across updates. A finish is
/// reported once per transition into 100, so a job that stays at 100
/// for several updates counts once.
#[derive(Debug, Clone, Default)]
pub struct CompletionHeuristic {
    last_percent: Option<u32>,
}

impl CompletionHeuristic {
    /// Creates a heuristic that has seen no percent yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a percent and returns true if it marks a completion.
    pub fn observe(&mut self, percent: u32) -> bool {
        let completed = percent == 100 && self.last_percent != Some(100);
        self.last_percent = Some(percent);
        completed
    }

    /// The most recently observed percent.
    pub fn last_percent(&self) -> Option<u32> {
        self.last_percent
    }
}
