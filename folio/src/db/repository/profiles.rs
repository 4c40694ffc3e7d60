use libsql::{params, Connection};

use crate::error::Result;
use crate::models::InterestProfile;

use super::{decode_embedding, encode_embedding, timestamp};

pub struct ProfileRepository;

impl ProfileRepository {
    /// Replaces whatever profile the owner had.
    pub async fn upsert(conn: &Connection, profile: &InterestProfile) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO interest_profiles (owner, profile, interest_vector, generated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (owner) DO UPDATE SET
                profile = excluded.profile,
                interest_vector = excluded.interest_vector,
                generated_at = excluded.generated_at
            "#,
            params![
                profile.owner.clone(),
                serde_json::to_string(profile)?,
                encode_embedding(&profile.interest_vector),
                timestamp(&profile.generated_at),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get(conn: &Connection, owner: &str) -> Result<Option<InterestProfile>> {
        let mut rows = conn
            .query(
                "SELECT profile, interest_vector FROM interest_profiles WHERE owner = ?1",
                params![owner],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let mut profile: InterestProfile = serde_json::from_str(&row.get::<String>(0)?)?;
                profile.interest_vector = decode_embedding(row.get(1)?)?.unwrap_or_default();
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }
}
