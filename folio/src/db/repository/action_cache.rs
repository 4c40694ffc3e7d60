use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{ActionCacheEntry, ActionCacheStats, ReaderAction};

use super::{decode_embedding, encode_embedding, parse_timestamp, timestamp};

const ENTRY_COLUMNS: &str = "id, owner, natural_language_text, query_hash, embedding, \
                             resolved_action, action_type, hit_count, last_used_at, created_at";

pub struct ActionCacheRepository;

impl ActionCacheRepository {
    /// Stores a new translation. An entry for the same normalized query wins
    /// and this call reports `false`.
    pub async fn create(conn: &Connection, entry: &ActionCacheEntry) -> Result<bool> {
        let inserted = conn
            .execute(
                r#"
                INSERT INTO action_cache (
                    id, owner, natural_language_text, query_hash, embedding,
                    resolved_action, action_type, hit_count, last_used_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT (owner, query_hash) DO NOTHING
                "#,
                params![
                    entry.id.clone(),
                    entry.owner.clone(),
                    entry.natural_language_text.clone(),
                    entry.query_hash.clone(),
                    encode_embedding(&entry.embedding),
                    serde_json::to_string(&entry.resolved_action)?,
                    entry.action_type.to_string(),
                    entry.hit_count as i64,
                    timestamp(&entry.last_used_at),
                    timestamp(&entry.created_at),
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    pub async fn get(conn: &Connection, owner: &str, id: &str) -> Result<Option<ActionCacheEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM action_cache WHERE owner = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![owner, id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// Most used entries first, recency as tie-break.
    pub async fn list_top(
        conn: &Connection,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<ActionCacheEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM action_cache WHERE owner = ?1 \
             ORDER BY hit_count DESC, last_used_at DESC LIMIT ?2"
        );
        let mut rows = conn.query(&sql, params![owner, limit as i64]).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::row_to_entry(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable action cache entry"),
            }
        }
        Ok(entries)
    }

    /// Adds exactly one hit in a single statement and returns the new count.
    pub async fn record_hit(conn: &Connection, owner: &str, id: &str) -> Result<Option<u32>> {
        let mut rows = conn
            .query(
                r#"
                UPDATE action_cache SET hit_count = hit_count + 1, last_used_at = ?3
                WHERE owner = ?1 AND id = ?2
                RETURNING hit_count
                "#,
                params![owner, id, timestamp(&Utc::now())],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)?.max(0) as u32)),
            None => Ok(None),
        }
    }

    /// Removes entries not used since `cutoff`.
    pub async fn delete_unused_since(
        conn: &Connection,
        owner: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(conn
            .execute(
                "DELETE FROM action_cache WHERE owner = ?1 AND last_used_at < ?2",
                params![owner, timestamp(&cutoff)],
            )
            .await?)
    }

    pub async fn stats(conn: &Connection, owner: &str) -> Result<ActionCacheStats> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM action_cache WHERE owner = ?1",
                params![owner],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(ActionCacheStats {
                entries: row.get::<i64>(0)?.max(0) as u64,
                total_hits: row.get::<i64>(1)?.max(0) as u64,
            }),
            None => Ok(ActionCacheStats::default()),
        }
    }

    pub fn row_to_entry(row: &libsql::Row) -> Result<ActionCacheEntry> {
        let resolved_action: ReaderAction = serde_json::from_str(&row.get::<String>(5)?)?;
        Ok(ActionCacheEntry {
            id: row.get(0)?,
            owner: row.get(1)?,
            natural_language_text: row.get(2)?,
            query_hash: row.get(3)?,
            embedding: decode_embedding(row.get(4)?)?.unwrap_or_default(),
            action_type: resolved_action.action_type(),
            resolved_action,
            hit_count: row.get::<i64>(7)?.max(0) as u32,
            last_used_at: parse_timestamp(&row.get::<String>(8)?),
            created_at: parse_timestamp(&row.get::<String>(9)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_connection;
    use chrono::Duration;

    fn entry(owner: &str, text: &str, hash: &str) -> ActionCacheEntry {
        ActionCacheEntry::new(
            owner,
            text,
            hash.to_string(),
            vec![1.0, 0.0],
            ReaderAction::Search {
                query: "entropy".into(),
                scope: Default::default(),
            },
        )
    }

    #[tokio::test]
    async fn same_query_hash_is_stored_once() {
        let conn = test_connection().await;
        assert!(ActionCacheRepository::create(&conn, &entry("u1", "find entropy", "h1"))
            .await
            .unwrap());
        assert!(!ActionCacheRepository::create(&conn, &entry("u1", "Find  entropy", "h1"))
            .await
            .unwrap());
        assert!(ActionCacheRepository::create(&conn, &entry("u2", "find entropy", "h1"))
            .await
            .unwrap());

        assert_eq!(ActionCacheRepository::stats(&conn, "u1").await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn hits_increment_by_one_and_reorder() {
        let conn = test_connection().await;
        let cold = entry("u1", "cold", "h1");
        let warm = entry("u1", "warm", "h2");
        ActionCacheRepository::create(&conn, &cold).await.unwrap();
        ActionCacheRepository::create(&conn, &warm).await.unwrap();

        assert_eq!(
            ActionCacheRepository::record_hit(&conn, "u1", &warm.id).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            ActionCacheRepository::record_hit(&conn, "u1", &warm.id).await.unwrap(),
            Some(2)
        );
        assert_eq!(
            ActionCacheRepository::record_hit(&conn, "u2", &warm.id).await.unwrap(),
            None
        );

        let top = ActionCacheRepository::list_top(&conn, "u1", 50).await.unwrap();
        assert_eq!(top[0].id, warm.id);
        assert_eq!(top[0].hit_count, 2);

        let stats = ActionCacheRepository::stats(&conn, "u1").await.unwrap();
        assert_eq!(stats.total_hits, 2);
    }

    #[tokio::test]
    async fn stale_entries_are_removed() {
        let conn = test_connection().await;
        let mut stale = entry("u1", "old", "h1");
        stale.last_used_at = Utc::now() - Duration::days(40);
        let fresh = entry("u1", "new", "h2");
        ActionCacheRepository::create(&conn, &stale).await.unwrap();
        ActionCacheRepository::create(&conn, &fresh).await.unwrap();

        let removed =
            ActionCacheRepository::delete_unused_since(&conn, "u1", Utc::now() - Duration::days(30))
                .await
                .unwrap();
        assert_eq!(removed, 1);
        assert!(ActionCacheRepository::get(&conn, "u1", &fresh.id).await.unwrap().is_some());
    }
}
