use crate::application::dto::RunSummary;
use crate::application::scheduler::{Task, TaskOutcome, TaskScheduler};
use crate::ports::outbound::ProgressReporter;

/// RunTasksUseCase - submits a batch of tasks and waits for their follow-ups
///
/// # Type Parameters
/// * `PR` - ProgressReporter implementation
pub struct RunTasksUseCase<PR> {
    scheduler: TaskScheduler,
    progress_reporter: PR,
}

impl<PR: ProgressReporter> RunTasksUseCase<PR> {
    pub fn new(scheduler: TaskScheduler, progress_reporter: PR) -> Self {
        Self {
            scheduler,
            progress_reporter,
        }
    }

    /// Runs `tasks`, then every follow-up they queue.
    ///
    /// Task failures are counted in the summary rather than returned as
    /// errors, so one bad build does not hide the outcome of the others.
    pub async fn execute(&self, tasks: Vec<Task>) -> RunSummary {
        self.progress_reporter
            .report(&format!("🚀 Running {} task(s)...", tasks.len()));

        let labels: Vec<String> = tasks.iter().map(ToString::to_string).collect();
        let outcomes = self.scheduler.run_all(tasks).await;
        for (label, outcome) in labels.iter().zip(&outcomes) {
            self.report_outcome(label, outcome);
        }

        let follow_ups = self.scheduler.drain().await;
        if !follow_ups.is_empty() {
            for (index, outcome) in follow_ups.iter().enumerate() {
                self.progress_reporter
                    .report_progress(index + 1, follow_ups.len(), Some("follow-up tasks"));
                if outcome.is_failure() {
                    self.report_outcome("follow-up", outcome);
                }
            }
        }

        let summary = RunSummary::from_outcomes(outcomes.iter().chain(&follow_ups));
        if summary.has_failures() {
            self.progress_reporter.report_error(&format!("❌ {}", summary));
        } else {
            self.progress_reporter
                .report_completion(&format!("✅ {}", summary));
        }
        summary
    }

    fn report_outcome(&self, label: &str, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded { summary, attempts } if *attempts > 1 => {
                self.progress_reporter.report(&format!(
                    "✔️  {}: {} (after {} attempts)",
                    label, summary, attempts
                ))
            }
            TaskOutcome::Succeeded { summary, .. } => {
                self.progress_reporter
                    .report(&format!("✔️  {}: {}", label, summary))
            }
            TaskOutcome::Skipped { reason } => self
                .progress_reporter
                .report(&format!("⏭️  {}: {}", label, reason)),
            TaskOutcome::Duplicate => self
                .progress_reporter
                .report(&format!("🔁 {}: already running elsewhere", label)),
            TaskOutcome::Deferred => self
                .progress_reporter
                .report(&format!("⏳ {}: queued behind the running copy", label)),
            TaskOutcome::Failed { error, attempts } => {
                self.progress_reporter.report_error(&format!(
                    "❌ {} failed after {} attempt(s): {}",
                    label, attempts, error
                ))
            }
        }
    }
}
