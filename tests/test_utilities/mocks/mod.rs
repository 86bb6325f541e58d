/// Mock implementations for testing
mod mock_build_source;
mod mock_progress_reporter;

pub use mock_build_source::MockBuildSource;
pub use mock_progress_reporter::MockProgressReporter;
