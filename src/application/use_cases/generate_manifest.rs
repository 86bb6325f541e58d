use crate::ports::outbound::{ProgressReporter, RegistryStore};
use crate::shared::Result;
use crate::taxonomy::services::{ManifestBuilder, ManifestSubject};

/// GenerateManifestUseCase - renders the manifest document of a stream or component
///
/// # Type Parameters
/// * `S` - registry storage
/// * `PR` - ProgressReporter implementation
pub struct GenerateManifestUseCase<'a, S: RegistryStore + ?Sized, PR> {
    store: &'a S,
    progress_reporter: PR,
}

impl<'a, S: RegistryStore + ?Sized, PR: ProgressReporter> GenerateManifestUseCase<'a, S, PR> {
    pub fn new(store: &'a S, progress_reporter: PR) -> Self {
        Self {
            store,
            progress_reporter,
        }
    }

    /// Returns the pretty-printed JSON document
    pub fn execute(&self, subject: &ManifestSubject) -> Result<String> {
        self.progress_reporter
            .report(&format!("📝 Building manifest for {}...", subject));
        let manifest = ManifestBuilder::new(self.store).build(subject)?;
        let packages = manifest.document["packages"]
            .as_array()
            .map_or(0, Vec::len);
        self.progress_reporter.report(&format!(
            "✅ {} package(s), document {}",
            packages, manifest.record.document_id
        ));
        manifest.to_pretty_json()
    }
}
