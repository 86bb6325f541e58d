/// Data Transfer Objects for application layer
///
/// DTOs carry requests from the CLI into the use cases and summaries back
/// out, keeping the taxonomy layer free of presentation concerns.
mod latest_request;
mod output_format;
mod run_summary;

pub use latest_request::LatestRequest;
pub use output_format::OutputFormat;
pub use run_summary::RunSummary;
