mod action_cache;
mod dimensions;
mod documents;
mod entities;
mod notes;
mod profiles;
mod relationships;

pub use action_cache::ActionCacheRepository;
pub use dimensions::DimensionRepository;
pub use documents::DocumentRepository;
pub use entities::EntityRepository;
pub use notes::NoteRepository;
pub use profiles::ProfileRepository;
pub use relationships::RelationshipRepository;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::embeddings::EmbeddingGateway;
use crate::error::Result;

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// `?{offset+1}, ?{offset+2}, ...` for an IN list.
pub(crate) fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bindings for `owner = ?1 AND id IN (?2, ...)`.
pub(crate) fn owner_and_ids(owner: &str, ids: &[String]) -> Vec<libsql::Value> {
    let mut values = vec![libsql::Value::from(owner.to_string())];
    values.extend(ids.iter().map(|id| libsql::Value::from(id.clone())));
    values
}

pub(crate) fn encode_embedding(vector: &[f32]) -> String {
    EmbeddingGateway::format_for_storage(vector)
}

pub(crate) fn decode_embedding(raw: Option<String>) -> Result<Option<Vec<f32>>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| EmbeddingGateway::parse_from_storage(&s))
        .transpose()
}

#[cfg(test)]
pub(crate) async fn test_connection() -> libsql::Connection {
    let conn = libsql::Builder::new_local(":memory:")
        .build()
        .await
        .unwrap()
        .connect()
        .unwrap();
    crate::db::schema::init_schema(&conn).await.unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn timestamps_sort_lexically() {
        let earlier = Utc::now();
        let later = earlier + Duration::milliseconds(1);
        assert!(timestamp(&earlier) < timestamp(&later));
        assert!(timestamp(&earlier).ends_with('Z'));
    }

    #[test]
    fn placeholder_lists() {
        assert_eq!(placeholders(3, 0), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2, ?3");
        assert_eq!(placeholders(0, 0), "");
    }

    #[test]
    fn missing_embeddings_decode_to_none() {
        assert_eq!(decode_embedding(None).unwrap(), None);
        assert_eq!(decode_embedding(Some(String::new())).unwrap(), None);
        assert_eq!(
            decode_embedding(Some("[1,0.5]".into())).unwrap(),
            Some(vec![1.0, 0.5])
        );
    }
}
