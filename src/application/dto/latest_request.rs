/// Request DTO for the latest-components listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRequest {
    /// Product stream name
    pub stream: String,
    /// List every component of the stream instead of only root components
    pub all_components: bool,
    /// Also list components of an inactive stream; only with `all_components`
    pub include_inactive: bool,
}

impl LatestRequest {
    pub fn roots(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            all_components: false,
            include_inactive: false,
        }
    }
}
