use crate::shared::Result;
use chrono::{DateTime, Utc};

/// Wrapper metadata kept per manifest subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub subject: String,
    pub document_id: String,
    pub created: DateTime<Utc>,
    pub content_hash: String,
}

/// ManifestRepository port for content-addressed manifest identities
pub trait ManifestRepository {
    fn find_manifest(&self, subject: &str) -> Result<Option<ManifestRecord>>;

    fn save_manifest(&self, record: &ManifestRecord) -> Result<()>;
}
