use super::{conversion_error, meta_to_sql, parse_meta, parse_uuid, SqliteRegistry};
use crate::ports::outbound::ComponentRepository;
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, BuildType, Component, ComponentDraft, ComponentKey, ComponentType, Namespace,
    SoftwareBuild, SoftwareBuildDraft,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const BUILD_COLUMNS: &str = "id, build_id, build_type, name, source, completion_time, meta_attr";

const COMPONENT_COLUMNS: &str = "uuid, type, namespace, name, version, release, arch, epoch, \
     description, related_url, license_declared_raw, meta_attr, software_build, purl, nvr, nevra";

fn map_build(row: &Row<'_>) -> rusqlite::Result<SoftwareBuild> {
    let build_type: String = row.get(2)?;
    let build_type = build_type
        .parse::<BuildType>()
        .map_err(|e| conversion_error(2, e))?;
    let meta: String = row.get(6)?;
    Ok(SoftwareBuild {
        id: row.get(0)?,
        key: BuildKey::new(row.get::<_, String>(1)?, build_type),
        name: row.get(3)?,
        source: row.get(4)?,
        completion_time: row.get(5)?,
        meta_attr: parse_meta(6, &meta)?,
    })
}

fn map_component(row: &Row<'_>) -> rusqlite::Result<Component> {
    let uuid: String = row.get(0)?;
    let component_type: String = row.get(1)?;
    let namespace: String = row.get(2)?;
    let meta: String = row.get(11)?;
    let epoch: i64 = row.get(7)?;
    Ok(Component {
        uuid: parse_uuid(0, &uuid)?,
        key: ComponentKey::new(
            component_type
                .parse::<ComponentType>()
                .map_err(|e| conversion_error(1, e))?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ),
        namespace: namespace
            .parse::<Namespace>()
            .map_err(|e| conversion_error(2, e))?,
        epoch: epoch as u32,
        description: row.get(8)?,
        related_url: row.get(9)?,
        license_declared_raw: row.get(10)?,
        meta_attr: parse_meta(11, &meta)?,
        software_build: row.get(12)?,
        purl: row.get(13)?,
        nvr: row.get(14)?,
        nevra: row.get(15)?,
    })
}

fn find_component_in(conn: &Connection, key: &ComponentKey) -> rusqlite::Result<Option<Component>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM components
             WHERE type = ?1 AND name = ?2 AND version = ?3 AND release = ?4 AND arch = ?5",
            COMPONENT_COLUMNS
        ),
        params![
            key.component_type.as_str(),
            key.name,
            key.version,
            key.release,
            key.arch
        ],
        map_component,
    )
    .optional()
}

fn write_mutable_fields(conn: &Connection, component: &Component) -> Result<()> {
    conn.execute(
        "UPDATE components
         SET description = ?1, related_url = ?2, license_declared_raw = ?3,
             meta_attr = ?4, software_build = ?5
         WHERE uuid = ?6",
        params![
            component.description,
            component.related_url,
            component.license_declared_raw,
            meta_to_sql(&component.meta_attr)?,
            component.software_build,
            component.uuid.to_string()
        ],
    )?;
    Ok(())
}

impl ComponentRepository for SqliteRegistry {
    fn find_build(&self, key: &BuildKey) -> Result<Option<SoftwareBuild>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM software_builds WHERE build_id = ?1 AND build_type = ?2",
                    BUILD_COLUMNS
                ),
                params![key.build_id, key.build_type.as_str()],
                map_build,
            )
            .optional()?)
    }

    fn get_build(&self, id: i64) -> Result<Option<SoftwareBuild>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {} FROM software_builds WHERE id = ?1", BUILD_COLUMNS),
                params![id],
                map_build,
            )
            .optional()?)
    }

    fn save_build(&self, draft: &SoftwareBuildDraft) -> Result<(SoftwareBuild, bool)> {
        let tx = self.immediate()?;
        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM software_builds WHERE build_id = ?1 AND build_type = ?2",
                    BUILD_COLUMNS
                ),
                params![draft.key.build_id, draft.key.build_type.as_str()],
                map_build,
            )
            .optional()?;
        let id = match &existing {
            // Re-ingest keeps stored values the new metadata leaves empty
            Some(stored) => {
                let mut meta_attr = stored.meta_attr.clone();
                meta_attr.extend(draft.meta_attr.iter().map(|(k, v)| (k.clone(), v.clone())));
                tx.execute(
                    "UPDATE software_builds
                     SET name = CASE WHEN ?1 = '' THEN name ELSE ?1 END,
                         source = CASE WHEN ?2 = '' THEN source ELSE ?2 END,
                         completion_time = COALESCE(?3, completion_time), meta_attr = ?4
                     WHERE id = ?5",
                    params![
                        draft.name,
                        draft.source,
                        draft.completion_time,
                        meta_to_sql(&meta_attr)?,
                        stored.id
                    ],
                )?;
                stored.id
            }
            None => {
                let meta = meta_to_sql(&draft.meta_attr)?;
                tx.execute(
                    "INSERT INTO software_builds
                         (build_id, build_type, name, source, completion_time, meta_attr)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        draft.key.build_id,
                        draft.key.build_type.as_str(),
                        draft.name,
                        draft.source,
                        draft.completion_time,
                        meta
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        let build = tx.query_row(
            &format!("SELECT {} FROM software_builds WHERE id = ?1", BUILD_COLUMNS),
            params![id],
            map_build,
        )?;
        tx.commit()?;
        Ok((build, existing.is_none()))
    }

    fn builds_after(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<SoftwareBuild>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM software_builds WHERE id > ?1 ORDER BY id LIMIT ?2",
            BUILD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![after_id.unwrap_or(0), limit as i64], map_build)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_build(&self, id: i64) -> Result<()> {
        self.conn()
            .execute("DELETE FROM software_builds WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn find_component(&self, key: &ComponentKey) -> Result<Option<Component>> {
        Ok(find_component_in(self.conn(), key)?)
    }

    fn get_component(&self, uuid: Uuid) -> Result<Option<Component>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {} FROM components WHERE uuid = ?1", COMPONENT_COLUMNS),
                params![uuid.to_string()],
                map_component,
            )
            .optional()?)
    }

    fn find_component_by_purl(&self, purl: &str) -> Result<Option<Component>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM components WHERE purl = ?1 ORDER BY uuid LIMIT 1",
                    COMPONENT_COLUMNS
                ),
                params![purl],
                map_component,
            )
            .optional()?)
    }

    fn upsert_component(&self, draft: &ComponentDraft) -> Result<(Component, bool)> {
        let tx = self.immediate()?;
        if let Some(mut existing) = find_component_in(&tx, &draft.key)? {
            if existing.merge(draft) {
                write_mutable_fields(&tx, &existing)?;
            }
            tx.commit()?;
            return Ok((existing, false));
        }

        let component = draft.clone().into_component(Uuid::new_v4());
        tx.execute(
            &format!(
                "INSERT INTO components ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                COMPONENT_COLUMNS
            ),
            params![
                component.uuid.to_string(),
                component.key.component_type.as_str(),
                component.namespace.as_str(),
                component.key.name,
                component.key.version,
                component.key.release,
                component.key.arch,
                component.epoch,
                component.description,
                component.related_url,
                component.license_declared_raw,
                meta_to_sql(&component.meta_attr)?,
                component.software_build,
                component.purl,
                component.nvr,
                component.nevra
            ],
        )?;
        tx.commit()?;
        tracing::debug!(purl = %component.purl, "created component");
        Ok((component, true))
    }

    fn components_for_build(&self, build_id: i64) -> Result<Vec<Component>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM components WHERE software_build = ?1 ORDER BY purl",
            COMPONENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![build_id], map_component)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
