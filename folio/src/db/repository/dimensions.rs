use chrono::Utc;
use libsql::{params, Connection};

use crate::error::{FolioError, Result};

use super::timestamp;

/// Remembers the embedding length each owner started with.
pub struct DimensionRepository;

impl DimensionRepository {
    pub async fn get(conn: &Connection, owner: &str) -> Result<Option<usize>> {
        let mut rows = conn
            .query(
                "SELECT dimensions FROM owner_dimensions WHERE owner = ?1",
                params![owner],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)? as usize)),
            None => Ok(None),
        }
    }

    /// Registers `dimensions` on first use, otherwise requires a match.
    pub async fn ensure(conn: &Connection, owner: &str, dimensions: usize) -> Result<()> {
        if dimensions == 0 {
            return Err(FolioError::Validation("Embedding is empty".to_string()));
        }

        conn.execute(
            "INSERT OR IGNORE INTO owner_dimensions (owner, dimensions, created_at) VALUES (?1, ?2, ?3)",
            params![owner, dimensions as i64, timestamp(&Utc::now())],
        )
        .await?;

        match Self::get(conn, owner).await? {
            Some(expected) if expected != dimensions => {
                tracing::error!(
                    owner,
                    expected,
                    actual = dimensions,
                    "Refusing to store embedding with foreign dimensionality"
                );
                Err(FolioError::DimensionMismatch {
                    expected,
                    actual: dimensions,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_connection;

    #[tokio::test]
    async fn first_length_wins() {
        let conn = test_connection().await;

        DimensionRepository::ensure(&conn, "u1", 3).await.unwrap();
        DimensionRepository::ensure(&conn, "u1", 3).await.unwrap();
        assert_eq!(DimensionRepository::get(&conn, "u1").await.unwrap(), Some(3));

        let err = DimensionRepository::ensure(&conn, "u1", 4).await.unwrap_err();
        assert!(matches!(
            err,
            FolioError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn owners_are_independent() {
        let conn = test_connection().await;

        DimensionRepository::ensure(&conn, "u1", 3).await.unwrap();
        DimensionRepository::ensure(&conn, "u2", 8).await.unwrap();
        assert_eq!(DimensionRepository::get(&conn, "u2").await.unwrap(), Some(8));
        assert_eq!(DimensionRepository::get(&conn, "u3").await.unwrap(), None);
    }
}
