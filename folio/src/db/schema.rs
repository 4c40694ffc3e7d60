use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Extracted knowledge entities
        CREATE TABLE IF NOT EXISTS memory_entities (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            conversation_id TEXT,
            document_id TEXT,
            entity_type TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding TEXT NOT NULL,
            degree INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entities_owner_created ON memory_entities(owner, created_at);
        CREATE INDEX IF NOT EXISTS idx_entities_owner_degree ON memory_entities(owner, degree);
        CREATE INDEX IF NOT EXISTS idx_entities_conversation ON memory_entities(owner, conversation_id);
        CREATE INDEX IF NOT EXISTS idx_entities_document ON memory_entities(owner, document_id);

        -- Directed typed edges between entities
        CREATE TABLE IF NOT EXISTS memory_relationships (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            from_id TEXT NOT NULL,
            to_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            strength REAL NOT NULL,
            auto_detected INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (owner, from_id, to_id, relationship_type)
        );

        CREATE INDEX IF NOT EXISTS idx_relationships_from ON memory_relationships(owner, from_id);
        CREATE INDEX IF NOT EXISTS idx_relationships_to ON memory_relationships(owner, to_id);

        -- Library documents (collaborator records)
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            embedding TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_owner_created ON documents(owner, created_at);

        CREATE TABLE IF NOT EXISTS document_links (
            owner TEXT NOT NULL,
            from_document_id TEXT NOT NULL,
            to_document_id TEXT NOT NULL,
            similarity REAL,
            auto_detected INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            PRIMARY KEY (owner, from_document_id, to_document_id)
        );

        CREATE INDEX IF NOT EXISTS idx_document_links_to ON document_links(owner, to_document_id);

        -- Notes and highlights; embedding is filled lazily
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            document_id TEXT,
            content TEXT NOT NULL,
            highlight TEXT,
            embedding TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notes_owner_created ON notes(owner, created_at);
        CREATE INDEX IF NOT EXISTS idx_notes_document ON notes(owner, document_id);

        CREATE TABLE IF NOT EXISTS note_relationships (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            note_id TEXT NOT NULL,
            related_type TEXT NOT NULL,
            related_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            similarity_score REAL,
            auto_detected INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (owner, note_id, related_type, related_id)
        );

        CREATE INDEX IF NOT EXISTS idx_note_relationships_related
            ON note_relationships(owner, related_type, related_id);

        -- Semantic action cache
        CREATE TABLE IF NOT EXISTS action_cache (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            natural_language_text TEXT NOT NULL,
            query_hash TEXT NOT NULL,
            embedding TEXT NOT NULL,
            resolved_action TEXT NOT NULL,
            action_type TEXT NOT NULL,
            hit_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (owner, query_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_action_cache_hits ON action_cache(owner, hit_count);
        CREATE INDEX IF NOT EXISTS idx_action_cache_last_used ON action_cache(owner, last_used_at);

        -- Latest interest profile per owner
        CREATE TABLE IF NOT EXISTS interest_profiles (
            owner TEXT PRIMARY KEY,
            profile TEXT NOT NULL,
            interest_vector TEXT NOT NULL DEFAULT '[]',
            generated_at TEXT NOT NULL
        );

        -- First embedding length seen per owner
        CREATE TABLE IF NOT EXISTS owner_dimensions (
            owner TEXT PRIMARY KEY,
            dimensions INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    Ok(())
}
