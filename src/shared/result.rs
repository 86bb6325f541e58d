/// Result type alias using anyhow::Error
pub type Result<T> = std::result::Result<T, anyhow::Error>;
