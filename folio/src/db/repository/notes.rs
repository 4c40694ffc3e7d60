use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Note, NoteRelationship, NoteRelationshipType, RelatedType};

use super::{decode_embedding, encode_embedding, parse_timestamp, timestamp};

const NOTE_COLUMNS: &str = "id, owner, document_id, content, highlight, embedding, created_at";
const NOTE_RELATIONSHIP_COLUMNS: &str = "id, owner, note_id, related_type, related_id, \
                                         relationship_type, similarity_score, auto_detected, created_at";

pub struct NoteRepository;

impl NoteRepository {
    pub async fn create(conn: &Connection, note: &Note) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO notes (id, owner, document_id, content, highlight, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                note.id.clone(),
                note.owner.clone(),
                note.document_id.clone(),
                note.content.clone(),
                note.highlight.clone(),
                note.embedding.as_deref().map(encode_embedding),
                timestamp(&note.created_at),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get(conn: &Connection, owner: &str, id: &str) -> Result<Option<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE owner = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![owner, id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_note(&row)?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub async fn list_recent(conn: &Connection, owner: &str, limit: usize) -> Result<Vec<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE owner = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        Self::collect(conn.query(&sql, params![owner, limit as i64]).await?).await
    }

    pub async fn list_for_document(
        conn: &Connection,
        owner: &str,
        document_id: &str,
    ) -> Result<Vec<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE owner = ?1 AND document_id = ?2 \
             ORDER BY created_at ASC, rowid ASC"
        );
        Self::collect(conn.query(&sql, params![owner, document_id]).await?).await
    }

    pub async fn update_embedding(
        conn: &Connection,
        owner: &str,
        id: &str,
        embedding: &[f32],
    ) -> Result<()> {
        conn.execute(
            "UPDATE notes SET embedding = ?3 WHERE owner = ?1 AND id = ?2",
            params![owner, id, encode_embedding(embedding)],
        )
        .await?;
        Ok(())
    }

    pub async fn create_relationship(conn: &Connection, rel: &NoteRelationship) -> Result<bool> {
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO note_relationships (
                    id, owner, note_id, related_type, related_id,
                    relationship_type, similarity_score, auto_detected, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    rel.id.clone(),
                    rel.owner.clone(),
                    rel.note_id.clone(),
                    rel.related_type.to_string(),
                    rel.related_id.clone(),
                    rel.relationship_type.to_string(),
                    rel.similarity_score.map(|s| s as f64),
                    rel.auto_detected as i32,
                    timestamp(&rel.created_at),
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// Edges leaving `note_id`.
    pub async fn list_relationships(
        conn: &Connection,
        owner: &str,
        note_id: &str,
    ) -> Result<Vec<NoteRelationship>> {
        let sql = format!(
            "SELECT {NOTE_RELATIONSHIP_COLUMNS} FROM note_relationships \
             WHERE owner = ?1 AND note_id = ?2 ORDER BY created_at ASC, rowid ASC"
        );
        Self::collect_relationships(conn.query(&sql, params![owner, note_id]).await?).await
    }

    /// Edges from any note pointing at the given target.
    pub async fn list_relationships_to(
        conn: &Connection,
        owner: &str,
        related_type: RelatedType,
        related_id: &str,
    ) -> Result<Vec<NoteRelationship>> {
        let sql = format!(
            "SELECT {NOTE_RELATIONSHIP_COLUMNS} FROM note_relationships \
             WHERE owner = ?1 AND related_type = ?2 AND related_id = ?3 \
             ORDER BY created_at ASC, rowid ASC"
        );
        Self::collect_relationships(
            conn.query(&sql, params![owner, related_type.to_string(), related_id])
                .await?,
        )
        .await
    }

    pub async fn delete_relationships_to(
        conn: &Connection,
        owner: &str,
        related_type: RelatedType,
        related_ids: &[String],
    ) -> Result<u64> {
        let mut removed = 0;
        for related_id in related_ids {
            removed += conn
                .execute(
                    "DELETE FROM note_relationships WHERE owner = ?1 AND related_type = ?2 AND related_id = ?3",
                    params![owner, related_type.to_string(), related_id.clone()],
                )
                .await?;
        }
        Ok(removed)
    }

    async fn collect(mut rows: libsql::Rows) -> Result<Vec<Note>> {
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::row_to_note(&row)?);
        }
        Ok(notes)
    }

    async fn collect_relationships(mut rows: libsql::Rows) -> Result<Vec<NoteRelationship>> {
        let mut rels = Vec::new();
        while let Some(row) = rows.next().await? {
            rels.push(Self::row_to_relationship(&row)?);
        }
        Ok(rels)
    }

    pub fn row_to_note(row: &libsql::Row) -> Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            owner: row.get(1)?,
            document_id: row.get(2)?,
            content: row.get(3)?,
            highlight: row.get(4)?,
            embedding: decode_embedding(row.get(5)?)?,
            created_at: parse_timestamp(&row.get::<String>(6)?),
        })
    }

    pub fn row_to_relationship(row: &libsql::Row) -> Result<NoteRelationship> {
        Ok(NoteRelationship {
            id: row.get(0)?,
            owner: row.get(1)?,
            note_id: row.get(2)?,
            related_type: row
                .get::<String>(3)?
                .parse()
                .unwrap_or(RelatedType::Document),
            related_id: row.get(4)?,
            relationship_type: row
                .get::<String>(5)?
                .parse()
                .unwrap_or(NoteRelationshipType::References),
            similarity_score: row.get::<Option<f64>>(6)?.map(|s| s as f32),
            auto_detected: row.get::<i32>(7)? != 0,
            created_at: parse_timestamp(&row.get::<String>(8)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_connection;

    #[tokio::test]
    async fn notes_round_trip_with_lazy_embedding() {
        let conn = test_connection().await;
        let note = Note::new("u1", Some("d1"), "Carnot cycle is reversible").with_highlight("ideal engine");
        NoteRepository::create(&conn, &note).await.unwrap();

        let loaded = NoteRepository::get(&conn, "u1", &note.id).await.unwrap().unwrap();
        assert_eq!(loaded.highlight.as_deref(), Some("ideal engine"));
        assert!(loaded.embedding.is_none());

        NoteRepository::update_embedding(&conn, "u1", &note.id, &[1.0, 0.0])
            .await
            .unwrap();
        let loaded = NoteRepository::get(&conn, "u1", &note.id).await.unwrap().unwrap();
        assert_eq!(loaded.embedding, Some(vec![1.0, 0.0]));

        let for_doc = NoteRepository::list_for_document(&conn, "u1", "d1").await.unwrap();
        assert_eq!(for_doc.len(), 1);
    }

    #[tokio::test]
    async fn relationship_per_target_is_unique() {
        let conn = test_connection().await;
        let first = NoteRelationship::detected(
            "u1",
            "n1",
            RelatedType::Memory,
            "m1",
            NoteRelationshipType::References,
            0.93,
        );
        let relabelled = NoteRelationship::manual(
            "u1",
            "n1",
            RelatedType::Memory,
            "m1",
            NoteRelationshipType::Defines,
        );

        assert!(NoteRepository::create_relationship(&conn, &first).await.unwrap());
        assert!(!NoteRepository::create_relationship(&conn, &relabelled).await.unwrap());

        let outgoing = NoteRepository::list_relationships(&conn, "u1", "n1").await.unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].relationship_type, NoteRelationshipType::References);
        assert_eq!(outgoing[0].similarity_score, Some(0.93));

        let incoming = NoteRepository::list_relationships_to(&conn, "u1", RelatedType::Memory, "m1")
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);

        let removed =
            NoteRepository::delete_relationships_to(&conn, "u1", RelatedType::Memory, &["m1".into()])
                .await
                .unwrap();
        assert_eq!(removed, 1);
    }
}
