use super::SqliteRegistry;
use crate::ports::outbound::{ManifestRecord, ManifestRepository};
use crate::shared::Result;
use rusqlite::{params, OptionalExtension};

impl ManifestRepository for SqliteRegistry {
    fn find_manifest(&self, subject: &str) -> Result<Option<ManifestRecord>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT subject, document_id, created, content_hash FROM manifests WHERE subject = ?1",
                params![subject],
                |row| {
                    Ok(ManifestRecord {
                        subject: row.get(0)?,
                        document_id: row.get(1)?,
                        created: row.get(2)?,
                        content_hash: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn save_manifest(&self, record: &ManifestRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO manifests (subject, document_id, created, content_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (subject) DO UPDATE SET
                 document_id = excluded.document_id,
                 created = excluded.created,
                 content_hash = excluded.content_hash",
            params![
                record.subject,
                record.document_id,
                record.created,
                record.content_hash
            ],
        )?;
        Ok(())
    }
}
