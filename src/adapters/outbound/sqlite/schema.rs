use rusqlite::Connection;

/// Node tables of the two forests, sharing one layout
pub(crate) const NODE_TABLES: [&str; 2] = ["component_nodes", "product_nodes"];

/// Payload tables of the four product model levels, sharing one layout
pub(crate) const PRODUCT_MODEL_TABLES: [&str; 4] = [
    "products",
    "product_versions",
    "product_streams",
    "product_variants",
];

fn node_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            parent_id INTEGER REFERENCES {table}(id) ON DELETE CASCADE,
            identity TEXT NOT NULL,
            payload_kind TEXT NOT NULL,
            payload_id TEXT NOT NULL,
            depth INTEGER NOT NULL DEFAULT 0,
            path TEXT NOT NULL DEFAULT ''
        );

        -- NULL parents never compare equal, so roots need their own partial index
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_child_key
            ON {table}(kind, parent_id, identity) WHERE parent_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_root_key
            ON {table}(kind, identity) WHERE parent_id IS NULL;
        CREATE INDEX IF NOT EXISTS idx_{table}_path ON {table}(path);
        CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id);
        CREATE INDEX IF NOT EXISTS idx_{table}_payload ON {table}(payload_kind, payload_id);
        "#
    )
}

fn product_model_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            uuid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            version TEXT NOT NULL DEFAULT '',
            ofuri TEXT NOT NULL DEFAULT '',
            cpe TEXT NOT NULL DEFAULT '',
            product_uuid TEXT,
            product_version_uuid TEXT,
            product_stream_uuid TEXT,
            stream_details TEXT,
            meta_attr TEXT NOT NULL DEFAULT '{{}}'
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_ofuri ON {table}(ofuri);
        "#
    )
}

const STATIC_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS software_builds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        build_id TEXT NOT NULL,
        build_type TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        completion_time TEXT,
        meta_attr TEXT NOT NULL DEFAULT '{}',
        UNIQUE (build_id, build_type)
    );

    CREATE TABLE IF NOT EXISTS components (
        uuid TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        namespace TEXT NOT NULL,
        name TEXT NOT NULL,
        version TEXT NOT NULL DEFAULT '',
        release TEXT NOT NULL DEFAULT '',
        arch TEXT NOT NULL DEFAULT '',
        epoch INTEGER NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT '',
        related_url TEXT NOT NULL DEFAULT '',
        license_declared_raw TEXT NOT NULL DEFAULT '',
        meta_attr TEXT NOT NULL DEFAULT '{}',
        software_build INTEGER REFERENCES software_builds(id) ON DELETE SET NULL,
        purl TEXT NOT NULL,
        nvr TEXT NOT NULL,
        nevra TEXT NOT NULL,
        UNIQUE (type, name, version, release, arch)
    );

    CREATE INDEX IF NOT EXISTS idx_components_purl ON components(purl);
    CREATE INDEX IF NOT EXISTS idx_components_build ON components(software_build);

    CREATE TABLE IF NOT EXISTS channels (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL,
        relative_url TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        meta_attr TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS product_component_relations (
        uuid TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        external_system_id TEXT NOT NULL,
        product_ref TEXT NOT NULL,
        build_id TEXT NOT NULL,
        build_type TEXT NOT NULL,
        software_build INTEGER REFERENCES software_builds(id) ON DELETE SET NULL,
        meta_attr TEXT NOT NULL DEFAULT '{}',
        UNIQUE (external_system_id, product_ref, build_id, build_type)
    );

    CREATE INDEX IF NOT EXISTS idx_relations_build ON product_component_relations(build_id, build_type);
    CREATE INDEX IF NOT EXISTS idx_relations_ref ON product_component_relations(product_ref);

    CREATE TABLE IF NOT EXISTS component_product_links (
        component_uuid TEXT NOT NULL REFERENCES components(uuid) ON DELETE CASCADE,
        level TEXT NOT NULL,
        entity_uuid TEXT NOT NULL,
        PRIMARY KEY (component_uuid, level, entity_uuid)
    );

    CREATE INDEX IF NOT EXISTS idx_product_links_entity ON component_product_links(level, entity_uuid);

    CREATE TABLE IF NOT EXISTS component_links (
        component_uuid TEXT NOT NULL REFERENCES components(uuid) ON DELETE CASCADE,
        link_kind TEXT NOT NULL,
        target_uuid TEXT NOT NULL,
        PRIMARY KEY (component_uuid, link_kind, target_uuid)
    );

    CREATE TABLE IF NOT EXISTS task_locks (
        lock_key TEXT PRIMARY KEY,
        acquired_at TEXT NOT NULL,
        holder TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS task_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_name TEXT NOT NULL,
        arguments TEXT NOT NULL,
        lock_key TEXT NOT NULL,
        status TEXT NOT NULL,
        attempts INTEGER NOT NULL,
        detail TEXT NOT NULL DEFAULT '',
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_task_results_status ON task_results(status);

    CREATE TABLE IF NOT EXISTS manifests (
        subject TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        created TEXT NOT NULL,
        content_hash TEXT NOT NULL
    );
"#;

/// Creates every table and index that does not exist yet
pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(STATIC_DDL)?;
    for table in NODE_TABLES {
        conn.execute_batch(&node_table_ddl(table))?;
    }
    for table in PRODUCT_MODEL_TABLES {
        conn.execute_batch(&product_model_table_ddl(table))?;
    }
    Ok(())
}
