/// Ports module defining interfaces for hexagonal architecture
///
/// Outbound (driven) ports only: the CLI and the scheduler drive the use
/// cases directly.
pub mod outbound;
