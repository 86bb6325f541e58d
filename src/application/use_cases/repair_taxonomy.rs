use crate::ports::outbound::{ProgressReporter, RegistryStore};
use crate::shared::Result;
use crate::taxonomy::services::{RepairReport, TaxonomyMaterializer};

/// RepairTaxonomyUseCase - sweeps stored builds for missing stream links
///
/// # Type Parameters
/// * `S` - registry storage
/// * `PR` - ProgressReporter implementation
pub struct RepairTaxonomyUseCase<'a, S: RegistryStore + ?Sized, PR> {
    store: &'a S,
    progress_reporter: PR,
}

impl<'a, S: RegistryStore + ?Sized, PR: ProgressReporter> RepairTaxonomyUseCase<'a, S, PR> {
    pub fn new(store: &'a S, progress_reporter: PR) -> Self {
        Self {
            store,
            progress_reporter,
        }
    }

    /// # Arguments
    /// * `resume_after` - build id the previous sweep stopped at
    /// * `batch_size` - builds read per page
    pub fn execute(&self, resume_after: Option<i64>, batch_size: usize) -> Result<RepairReport> {
        self.progress_reporter.report(&match resume_after {
            Some(id) => format!("🔧 Resuming taxonomy repair after build {}...", id),
            None => "🔧 Repairing taxonomy...".to_string(),
        });

        let report = TaxonomyMaterializer::new(self.store).repair(resume_after, batch_size, |progress| {
            self.progress_reporter.report(&format!(
                "   checked {} build(s), repaired {}{}",
                progress.processed,
                progress.repaired,
                progress
                    .last_key
                    .map(|id| format!(" (last build id {})", id))
                    .unwrap_or_default()
            ));
        })?;

        self.progress_reporter.report_completion(&format!(
            "✅ Repair finished: {} of {} build(s) re-materialized",
            report.repaired, report.processed
        ));
        Ok(report)
    }
}
