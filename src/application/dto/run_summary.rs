use crate::application::scheduler::TaskOutcome;

/// Tally of task outcomes for one CLI invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a TaskOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Succeeded { .. } => summary.succeeded += 1,
                TaskOutcome::Skipped { .. } => summary.skipped += 1,
                TaskOutcome::Duplicate => summary.duplicates += 1,
                TaskOutcome::Deferred => summary.deferred += 1,
                TaskOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.duplicates + self.deferred + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} task(s): {} succeeded, {} skipped, {} duplicate, {} deferred, {} failed",
            self.total(),
            self.succeeded,
            self.skipped,
            self.duplicates,
            self.deferred,
            self.failed
        )
    }
}
