use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Document, DocumentLink};

use super::{decode_embedding, encode_embedding, parse_timestamp, timestamp};

const DOCUMENT_COLUMNS: &str = "id, owner, title, description, embedding, created_at";

pub struct DocumentRepository;

impl DocumentRepository {
    pub async fn create(conn: &Connection, doc: &Document) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO documents (id, owner, title, description, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.id.clone(),
                doc.owner.clone(),
                doc.title.clone(),
                doc.description.clone(),
                doc.embedding.as_deref().map(encode_embedding),
                timestamp(&doc.created_at),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get(conn: &Connection, owner: &str, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![owner, id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub async fn list_recent(conn: &Connection, owner: &str, limit: usize) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let mut rows = conn.query(&sql, params![owner, limit as i64]).await?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next().await? {
            docs.push(Self::row_to_document(&row)?);
        }
        Ok(docs)
    }

    pub async fn update_embedding(
        conn: &Connection,
        owner: &str,
        id: &str,
        embedding: &[f32],
    ) -> Result<()> {
        conn.execute(
            "UPDATE documents SET embedding = ?3 WHERE owner = ?1 AND id = ?2",
            params![owner, id, encode_embedding(embedding)],
        )
        .await?;
        Ok(())
    }

    /// Removes the document row with its links and the note edges pointing at it.
    pub async fn delete(conn: &Connection, owner: &str, id: &str) -> Result<bool> {
        conn.execute(
            "DELETE FROM document_links WHERE owner = ?1 AND (from_document_id = ?2 OR to_document_id = ?2)",
            params![owner, id],
        )
        .await?;
        conn.execute(
            "DELETE FROM note_relationships WHERE owner = ?1 AND related_type = 'document' AND related_id = ?2",
            params![owner, id],
        )
        .await?;
        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE owner = ?1 AND id = ?2",
                params![owner, id],
            )
            .await?;
        Ok(deleted > 0)
    }

    pub async fn create_link(conn: &Connection, link: &DocumentLink) -> Result<bool> {
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO document_links (
                    owner, from_document_id, to_document_id, similarity, auto_detected, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    link.owner.clone(),
                    link.from_document_id.clone(),
                    link.to_document_id.clone(),
                    link.similarity.map(|s| s as f64),
                    link.auto_detected as i32,
                    timestamp(&link.created_at),
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// Links where `document_id` is either end.
    pub async fn list_links(
        conn: &Connection,
        owner: &str,
        document_id: &str,
    ) -> Result<Vec<DocumentLink>> {
        let mut rows = conn
            .query(
                r#"
                SELECT owner, from_document_id, to_document_id, similarity, auto_detected, created_at
                FROM document_links
                WHERE owner = ?1 AND (from_document_id = ?2 OR to_document_id = ?2)
                ORDER BY created_at ASC
                "#,
                params![owner, document_id],
            )
            .await?;
        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            links.push(DocumentLink {
                owner: row.get(0)?,
                from_document_id: row.get(1)?,
                to_document_id: row.get(2)?,
                similarity: row.get::<Option<f64>>(3)?.map(|s| s as f32),
                auto_detected: row.get::<i32>(4)? != 0,
                created_at: parse_timestamp(&row.get::<String>(5)?),
            });
        }
        Ok(links)
    }

    pub fn row_to_document(row: &libsql::Row) -> Result<Document> {
        Ok(Document {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            embedding: decode_embedding(row.get(4)?)?,
            created_at: parse_timestamp(&row.get::<String>(5)?),
        })
    }
}
