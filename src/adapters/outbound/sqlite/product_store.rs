use super::{conversion_error, meta_to_sql, parse_meta, parse_uuid, SqliteRegistry};
use crate::ports::outbound::ProductRepository;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::{
    Channel, ChannelDraft, ChannelType, Lineage, ProductLevel, ProductModel, ProductModelDraft,
    StreamDetails,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const MODEL_COLUMNS: &str = "uuid, name, description, version, ofuri, cpe, product_uuid, \
     product_version_uuid, product_stream_uuid, stream_details, meta_attr";

const CHANNEL_COLUMNS: &str = "uuid, name, type, relative_url, description, meta_attr";

fn model_table(level: ProductLevel) -> Result<&'static str> {
    match level {
        ProductLevel::Product => Ok("products"),
        ProductLevel::ProductVersion => Ok("product_versions"),
        ProductLevel::ProductStream => Ok("product_streams"),
        ProductLevel::ProductVariant => Ok("product_variants"),
        ProductLevel::Channel => Err(RegistryError::InvalidInput {
            message: "channels are not product models".to_string(),
        }
        .into()),
    }
}

fn optional_uuid(row: &Row<'_>, column: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|raw| parse_uuid(column, &raw))
        .transpose()
}

fn map_model(level: ProductLevel, row: &Row<'_>) -> rusqlite::Result<ProductModel> {
    let uuid: String = row.get(0)?;
    let stream = row
        .get::<_, Option<String>>(9)?
        .map(|raw| {
            serde_json::from_str::<StreamDetails>(&raw)
                .map_err(|e| conversion_error(9, format!("invalid stream details: {}", e)))
        })
        .transpose()?;
    let meta: String = row.get(10)?;
    Ok(ProductModel {
        uuid: parse_uuid(0, &uuid)?,
        level,
        name: row.get(1)?,
        description: row.get(2)?,
        version: row.get(3)?,
        ofuri: row.get(4)?,
        cpe: row.get(5)?,
        lineage: Lineage {
            product: optional_uuid(row, 6)?,
            product_version: optional_uuid(row, 7)?,
            product_stream: optional_uuid(row, 8)?,
        },
        stream,
        meta_attr: parse_meta(10, &meta)?,
    })
}

fn map_channel(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let uuid: String = row.get(0)?;
    let channel_type: String = row.get(2)?;
    let meta: String = row.get(5)?;
    Ok(Channel {
        uuid: parse_uuid(0, &uuid)?,
        name: row.get(1)?,
        channel_type: ChannelType::parse(&channel_type)
            .ok_or_else(|| conversion_error(2, format!("unknown channel type '{}'", channel_type)))?,
        relative_url: row.get(3)?,
        description: row.get(4)?,
        meta_attr: parse_meta(5, &meta)?,
    })
}

fn find_model_in(
    conn: &Connection,
    level: ProductLevel,
    name: &str,
) -> Result<Option<ProductModel>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE name = ?1", MODEL_COLUMNS, model_table(level)?),
            params![name],
            |row| map_model(level, row),
        )
        .optional()?)
}

fn find_channel_in(conn: &Connection, name: &str) -> rusqlite::Result<Option<Channel>> {
    conn.query_row(
        &format!("SELECT {} FROM channels WHERE name = ?1", CHANNEL_COLUMNS),
        params![name],
        map_channel,
    )
    .optional()
}

impl ProductRepository for SqliteRegistry {
    fn save_product_model(&self, draft: &ProductModelDraft) -> Result<(ProductModel, bool)> {
        let table = model_table(draft.level)?;
        let stream = draft
            .stream
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let meta = meta_to_sql(&draft.meta_attr)?;
        let lineage = &draft.lineage;
        let as_text = |uuid: Option<Uuid>| uuid.map(|u| u.to_string());

        let tx = self.immediate()?;
        let existing = find_model_in(&tx, draft.level, &draft.name)?;
        let created = existing.is_none();
        let uuid = match existing {
            Some(model) => {
                tx.execute(
                    &format!(
                        "UPDATE {} SET description = ?1, version = ?2, ofuri = ?3, cpe = ?4,
                             product_uuid = ?5, product_version_uuid = ?6, product_stream_uuid = ?7,
                             stream_details = ?8, meta_attr = ?9
                         WHERE uuid = ?10",
                        table
                    ),
                    params![
                        draft.description,
                        draft.version,
                        draft.ofuri,
                        draft.cpe,
                        as_text(lineage.product),
                        as_text(lineage.product_version),
                        as_text(lineage.product_stream),
                        stream,
                        meta,
                        model.uuid.to_string()
                    ],
                )?;
                model.uuid
            }
            None => {
                let uuid = Uuid::new_v4();
                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        table, MODEL_COLUMNS
                    ),
                    params![
                        uuid.to_string(),
                        draft.name,
                        draft.description,
                        draft.version,
                        draft.ofuri,
                        draft.cpe,
                        as_text(lineage.product),
                        as_text(lineage.product_version),
                        as_text(lineage.product_stream),
                        stream,
                        meta
                    ],
                )?;
                uuid
            }
        };
        let model = find_model_in(&tx, draft.level, &draft.name)?.ok_or_else(|| {
            RegistryError::NotFound {
                entity: "Product model",
                key: uuid.to_string(),
                hint: "The row vanished inside its own transaction".to_string(),
            }
        })?;
        tx.commit()?;
        Ok((model, created))
    }

    fn find_product_model(&self, level: ProductLevel, name: &str) -> Result<Option<ProductModel>> {
        find_model_in(self.conn(), level, name)
    }

    fn get_product_model(&self, level: ProductLevel, uuid: Uuid) -> Result<Option<ProductModel>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {} FROM {} WHERE uuid = ?1", MODEL_COLUMNS, model_table(level)?),
                params![uuid.to_string()],
                |row| map_model(level, row),
            )
            .optional()?)
    }

    fn find_by_ofuri(&self, ofuri: &str) -> Result<Option<ProductModel>> {
        for level in ProductLevel::MODEL_LEVELS {
            let found = self
                .conn()
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE ofuri = ?1 ORDER BY name LIMIT 1",
                        MODEL_COLUMNS,
                        model_table(level)?
                    ),
                    params![ofuri],
                    |row| map_model(level, row),
                )
                .optional()?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn list_product_models(&self, level: ProductLevel) -> Result<Vec<ProductModel>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM {} ORDER BY name",
            MODEL_COLUMNS,
            model_table(level)?
        ))?;
        let rows = stmt.query_map([], |row| map_model(level, row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn save_channel(&self, draft: &ChannelDraft) -> Result<(Channel, bool)> {
        let meta = meta_to_sql(&draft.meta_attr)?;
        let tx = self.immediate()?;
        let existing = find_channel_in(&tx, &draft.name)?;
        let created = existing.is_none();
        match existing {
            Some(channel) => {
                tx.execute(
                    "UPDATE channels SET type = ?1, relative_url = ?2, description = ?3, meta_attr = ?4
                     WHERE uuid = ?5",
                    params![
                        draft.channel_type.as_str(),
                        draft.relative_url,
                        draft.description,
                        meta,
                        channel.uuid.to_string()
                    ],
                )?;
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO channels ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        CHANNEL_COLUMNS
                    ),
                    params![
                        Uuid::new_v4().to_string(),
                        draft.name,
                        draft.channel_type.as_str(),
                        draft.relative_url,
                        draft.description,
                        meta
                    ],
                )?;
            }
        }
        let channel = find_channel_in(&tx, &draft.name)?.ok_or_else(|| RegistryError::NotFound {
            entity: "Channel",
            key: draft.name.clone(),
            hint: "The row vanished inside its own transaction".to_string(),
        })?;
        tx.commit()?;
        Ok((channel, created))
    }

    fn find_channel(&self, name: &str) -> Result<Option<Channel>> {
        Ok(find_channel_in(self.conn(), name)?)
    }

    fn get_channel(&self, uuid: Uuid) -> Result<Option<Channel>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {} FROM channels WHERE uuid = ?1", CHANNEL_COLUMNS),
                params![uuid.to_string()],
                map_channel,
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{model, registry};
    use super::*;
    use serde_json::Map;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_product_model_updates_in_place() {
        let registry = registry();
        let mut draft = model(ProductLevel::ProductStream, "rhel-8.6.0");
        draft.ofuri = "o:redhat:rhel:8.6.0".to_string();
        draft.stream = Some(StreamDetails {
            active: true,
            brew_tags: BTreeMap::from([("rhel-8.6.0-candidate".to_string(), true)]),
            ..StreamDetails::default()
        });
        let (first, created) = registry.save_product_model(&draft).unwrap();
        assert!(created);

        draft.description = "RHEL 8.6".to_string();
        let (second, created) = registry.save_product_model(&draft).unwrap();
        assert!(!created);
        assert_eq!(first.uuid, second.uuid);
        assert_eq!(second.description, "RHEL 8.6");
        assert!(second.stream.unwrap().brew_tags.contains_key("rhel-8.6.0-candidate"));

        let by_ofuri = registry.find_by_ofuri("o:redhat:rhel:8.6.0").unwrap().unwrap();
        assert_eq!(by_ofuri.level, ProductLevel::ProductStream);
        assert_eq!(
            registry.list_product_models(ProductLevel::ProductStream).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_same_name_at_different_levels() {
        let registry = registry();
        registry
            .save_product_model(&model(ProductLevel::Product, "rhel"))
            .unwrap();
        registry
            .save_product_model(&model(ProductLevel::ProductVersion, "rhel"))
            .unwrap();
        assert!(registry
            .find_product_model(ProductLevel::ProductVersion, "rhel")
            .unwrap()
            .is_some());
        assert!(registry
            .find_product_model(ProductLevel::ProductStream, "rhel")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_channel_is_unique_by_name() {
        let registry = registry();
        let draft = ChannelDraft {
            name: "rhel-8-for-x86_64-appstream-rpms".to_string(),
            channel_type: ChannelType::CdnRepo,
            relative_url: String::new(),
            description: String::new(),
            meta_attr: Map::new(),
        };
        let (first, created) = registry.save_channel(&draft).unwrap();
        assert!(created);
        let (second, created) = registry.save_channel(&draft).unwrap();
        assert!(!created);
        assert_eq!(first.uuid, second.uuid);
        assert_eq!(registry.get_channel(first.uuid).unwrap().unwrap().name, draft.name);
    }

    #[test]
    fn test_channel_level_has_no_model_table() {
        let registry = registry();
        assert!(registry
            .find_product_model(ProductLevel::Channel, "x")
            .is_err());
    }
}
