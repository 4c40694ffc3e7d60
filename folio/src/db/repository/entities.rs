use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::MemoryEntity;

use super::{
    decode_embedding, encode_embedding, owner_and_ids, parse_timestamp, placeholders, timestamp,
};

const ENTITY_COLUMNS: &str = "id, owner, conversation_id, document_id, entity_type, text, \
                              metadata, embedding, degree, created_at";

pub struct EntityRepository;

impl EntityRepository {
    pub async fn create(conn: &Connection, entity: &MemoryEntity) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO memory_entities (
                id, owner, conversation_id, document_id, entity_type, text,
                metadata, embedding, degree, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                entity.id.clone(),
                entity.owner.clone(),
                entity.conversation_id.clone(),
                entity.document_id.clone(),
                entity.entity_type.to_string(),
                entity.text.clone(),
                serde_json::to_string(&entity.metadata)?,
                encode_embedding(&entity.embedding),
                entity.degree as i64,
                timestamp(&entity.created_at),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get(conn: &Connection, owner: &str, id: &str) -> Result<Option<MemoryEntity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![owner, id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entity(&row)?)),
            None => Ok(None),
        }
    }

    /// Entities for `ids` in the order the ids were given. Unknown ids are skipped.
    pub async fn get_by_ids(
        conn: &Connection,
        owner: &str,
        ids: &[String],
    ) -> Result<Vec<MemoryEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 AND id IN ({})",
            placeholders(ids.len(), 1)
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(owner_and_ids(owner, ids)))
            .await?;
        let mut found = Vec::new();
        while let Some(row) = rows.next().await? {
            found.push(Self::row_to_entity(&row)?);
        }

        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|e| &e.id == id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    /// The newest `limit` entities, returned oldest first.
    pub async fn list_recent(
        conn: &Connection,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let mut rows = conn.query(&sql, params![owner, limit as i64]).await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(Self::row_to_entity(&row)?);
        }
        entities.reverse();
        Ok(entities)
    }

    /// Entities created at or after `since`, oldest first, capped at the newest `limit`.
    pub async fn list_since(
        conn: &Connection,
        owner: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 AND created_at >= ?2 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );
        let mut rows = conn
            .query(&sql, params![owner, timestamp(&since), limit as i64])
            .await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(Self::row_to_entity(&row)?);
        }
        entities.reverse();
        Ok(entities)
    }

    /// Highest degree first; ties go to the earlier entity.
    pub async fn list_by_degree(
        conn: &Connection,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 \
             ORDER BY degree DESC, created_at ASC, rowid ASC LIMIT ?2"
        );
        let mut rows = conn.query(&sql, params![owner, limit as i64]).await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(Self::row_to_entity(&row)?);
        }
        Ok(entities)
    }

    pub async fn list_for_document(
        conn: &Connection,
        owner: &str,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM memory_entities WHERE owner = ?1 AND document_id = ?2 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?3"
        );
        let mut rows = conn
            .query(&sql, params![owner, document_id, limit as i64])
            .await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(Self::row_to_entity(&row)?);
        }
        Ok(entities)
    }

    pub async fn count(conn: &Connection, owner: &str) -> Result<u64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM memory_entities WHERE owner = ?1",
                params![owner],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    pub async fn list_owners(conn: &Connection) -> Result<Vec<String>> {
        let mut rows = conn
            .query("SELECT DISTINCT owner FROM memory_entities ORDER BY owner", ())
            .await?;
        let mut owners = Vec::new();
        while let Some(row) = rows.next().await? {
            owners.push(row.get::<String>(0)?);
        }
        Ok(owners)
    }

    pub async fn ids_for_conversation(
        conn: &Connection,
        owner: &str,
        conversation_id: &str,
    ) -> Result<Vec<String>> {
        Self::ids_where(conn, owner, "conversation_id", conversation_id).await
    }

    pub async fn ids_for_document(
        conn: &Connection,
        owner: &str,
        document_id: &str,
    ) -> Result<Vec<String>> {
        Self::ids_where(conn, owner, "document_id", document_id).await
    }

    async fn ids_where(
        conn: &Connection,
        owner: &str,
        column: &'static str,
        value: &str,
    ) -> Result<Vec<String>> {
        let sql = format!("SELECT id FROM memory_entities WHERE owner = ?1 AND {column} = ?2");
        let mut rows = conn.query(&sql, params![owner, value]).await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    pub async fn delete_by_ids(conn: &Connection, owner: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM memory_entities WHERE owner = ?1 AND id IN ({})",
            placeholders(ids.len(), 1)
        );
        Ok(conn
            .execute(&sql, libsql::params_from_iter(owner_and_ids(owner, ids)))
            .await?)
    }

    pub async fn increment_degree(conn: &Connection, owner: &str, id: &str) -> Result<()> {
        conn.execute(
            "UPDATE memory_entities SET degree = degree + 1 WHERE owner = ?1 AND id = ?2",
            params![owner, id],
        )
        .await?;
        Ok(())
    }

    /// Resets `degree` from the relationship table for the given entities.
    pub async fn recompute_degrees(conn: &Connection, owner: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            r#"
            UPDATE memory_entities SET degree = (
                SELECT COUNT(*) FROM memory_relationships r
                WHERE r.owner = memory_entities.owner
                  AND (r.from_id = memory_entities.id OR r.to_id = memory_entities.id)
            )
            WHERE owner = ?1 AND id IN ({})
            "#,
            placeholders(ids.len(), 1)
        );
        conn.execute(&sql, libsql::params_from_iter(owner_and_ids(owner, ids)))
            .await?;
        Ok(())
    }

    pub fn row_to_entity(row: &libsql::Row) -> Result<MemoryEntity> {
        Ok(MemoryEntity {
            id: row.get(0)?,
            owner: row.get(1)?,
            conversation_id: row.get(2)?,
            document_id: row.get(3)?,
            entity_type: row.get::<String>(4)?.parse().unwrap_or_default(),
            text: row.get(5)?,
            metadata: serde_json::from_str(&row.get::<String>(6)?).unwrap_or_default(),
            embedding: decode_embedding(row.get(7)?)?.unwrap_or_default(),
            degree: row.get::<i64>(8)?.max(0) as u32,
            created_at: parse_timestamp(&row.get::<String>(9)?),
        })
    }
}
