use libsql::{params, Connection};

use crate::error::Result;
use crate::models::MemoryRelationship;

use super::{owner_and_ids, parse_timestamp, placeholders, timestamp, EntityRepository};

const RELATIONSHIP_COLUMNS: &str =
    "id, owner, from_id, to_id, relationship_type, strength, auto_detected, created_at";

pub struct RelationshipRepository;

impl RelationshipRepository {
    /// Inserts the edge unless an identical (from, to, type) edge exists.
    /// Endpoint degrees are bumped only for a real insert.
    pub async fn create(conn: &Connection, rel: &MemoryRelationship) -> Result<bool> {
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO memory_relationships (
                    id, owner, from_id, to_id, relationship_type, strength, auto_detected, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    rel.id.clone(),
                    rel.owner.clone(),
                    rel.from_id.clone(),
                    rel.to_id.clone(),
                    rel.relationship_type.to_string(),
                    rel.strength as f64,
                    rel.auto_detected as i32,
                    timestamp(&rel.created_at),
                ],
            )
            .await?;

        if inserted == 0 {
            return Ok(false);
        }

        EntityRepository::increment_degree(conn, &rel.owner, &rel.from_id).await?;
        EntityRepository::increment_degree(conn, &rel.owner, &rel.to_id).await?;
        Ok(true)
    }

    /// The newest `limit` edges, returned oldest first.
    pub async fn list(
        conn: &Connection,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRelationship>> {
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM memory_relationships WHERE owner = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let mut rows = conn.query(&sql, params![owner, limit as i64]).await?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(Self::row_to_relationship(&row)?);
        }
        edges.reverse();
        Ok(edges)
    }

    /// Edges with either endpoint in `ids`.
    pub async fn list_touching(
        conn: &Connection,
        owner: &str,
        ids: &[String],
    ) -> Result<Vec<MemoryRelationship>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // ?N can repeat within a statement, so one binding list covers both IN lists.
        let list = placeholders(ids.len(), 1);
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM memory_relationships \
             WHERE owner = ?1 AND (from_id IN ({list}) OR to_id IN ({list})) \
             ORDER BY created_at ASC, rowid ASC"
        );
        let mut rows = conn.query(&sql, libsql::params_from_iter(owner_and_ids(owner, ids))).await?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(Self::row_to_relationship(&row)?);
        }
        Ok(edges)
    }

    pub async fn delete_touching(conn: &Connection, owner: &str, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let list = placeholders(ids.len(), 1);
        let sql = format!(
            "DELETE FROM memory_relationships \
             WHERE owner = ?1 AND (from_id IN ({list}) OR to_id IN ({list}))"
        );
        Ok(conn.execute(&sql, libsql::params_from_iter(owner_and_ids(owner, ids))).await?)
    }

    pub async fn count(conn: &Connection, owner: &str) -> Result<u64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM memory_relationships WHERE owner = ?1",
                params![owner],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    pub fn row_to_relationship(row: &libsql::Row) -> Result<MemoryRelationship> {
        Ok(MemoryRelationship {
            id: row.get(0)?,
            owner: row.get(1)?,
            from_id: row.get(2)?,
            to_id: row.get(3)?,
            relationship_type: row
                .get::<String>(4)?
                .parse()
                .unwrap_or(crate::models::RelationshipType::RelatesTo),
            strength: row.get::<f64>(5)? as f32,
            auto_detected: row.get::<i32>(6)? != 0,
            created_at: parse_timestamp(&row.get::<String>(7)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_connection;
    use crate::models::{EntityType, MemoryEntity, RelationshipType};

    async fn seed(conn: &Connection, owner: &str, texts: &[&str]) -> Vec<String> {
        let mut ids = Vec::new();
        for text in texts {
            let e = MemoryEntity::new(owner, EntityType::Concept, text, vec![1.0]);
            EntityRepository::create(conn, &e).await.unwrap();
            ids.push(e.id);
        }
        ids
    }

    #[tokio::test]
    async fn duplicate_edges_are_ignored_and_degree_counts_once() {
        let conn = test_connection().await;
        let ids = seed(&conn, "u1", &["a", "b"]).await;

        let first = MemoryRelationship::new("u1", &ids[0], &ids[1], RelationshipType::Supports, 0.9);
        let again = MemoryRelationship::new("u1", &ids[0], &ids[1], RelationshipType::Supports, 0.95);
        let other_type =
            MemoryRelationship::new("u1", &ids[0], &ids[1], RelationshipType::Explains, 0.86);

        assert!(RelationshipRepository::create(&conn, &first).await.unwrap());
        assert!(!RelationshipRepository::create(&conn, &again).await.unwrap());
        assert!(RelationshipRepository::create(&conn, &other_type).await.unwrap());

        assert_eq!(RelationshipRepository::count(&conn, "u1").await.unwrap(), 2);
        let a = EntityRepository::get(&conn, "u1", &ids[0]).await.unwrap().unwrap();
        assert_eq!(a.degree, 2);
    }

    #[tokio::test]
    async fn touching_query_matches_either_direction() {
        let conn = test_connection().await;
        let ids = seed(&conn, "u1", &["a", "b", "c"]).await;
        for (from, to) in [(0, 1), (2, 0)] {
            let rel =
                MemoryRelationship::new("u1", &ids[from], &ids[to], RelationshipType::RelatesTo, 0.8);
            RelationshipRepository::create(&conn, &rel).await.unwrap();
        }

        let touching = RelationshipRepository::list_touching(&conn, "u1", &ids[..1])
            .await
            .unwrap();
        assert_eq!(touching.len(), 2);

        let removed = RelationshipRepository::delete_touching(&conn, "u1", &ids[1..2])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(RelationshipRepository::list(&conn, "u1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_keeps_the_newest_edges() {
        let conn = test_connection().await;
        let ids = seed(&conn, "u1", &["a", "b", "c", "d"]).await;
        for (from, to) in [(0, 1), (1, 2), (2, 3)] {
            let rel =
                MemoryRelationship::new("u1", &ids[from], &ids[to], RelationshipType::Supports, 0.9);
            RelationshipRepository::create(&conn, &rel).await.unwrap();
        }

        let edges = RelationshipRepository::list(&conn, "u1", 2).await.unwrap();
        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.from_id.as_str(), e.to_id.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(ids[1].as_str(), ids[2].as_str()), (ids[2].as_str(), ids[3].as_str())]
        );
    }

    #[tokio::test]
    async fn edges_are_owner_scoped() {
        let conn = test_connection().await;
        let ids = seed(&conn, "u1", &["a", "b"]).await;
        let rel = MemoryRelationship::new("u1", &ids[0], &ids[1], RelationshipType::Cites, 0.8);
        RelationshipRepository::create(&conn, &rel).await.unwrap();

        assert!(RelationshipRepository::list(&conn, "u2", 10).await.unwrap().is_empty());
        assert!(RelationshipRepository::list_touching(&conn, "u2", &ids)
            .await
            .unwrap()
            .is_empty());
    }
}
