use libsql::{Builder, Connection};
use std::sync::Arc;

use crate::config::{parse_env_or, DatabaseConfig};
use crate::error::Result;

use super::schema;

#[derive(Clone)]
pub struct Database {
    db: Arc<libsql::Database>,
    busy_timeout_ms: u64,
    journal_mode: &'static str,
    synchronous: &'static str,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let journal_mode =
            normalize_journal_mode(&parse_env_or("DATABASE_JOURNAL_MODE", "WAL".to_string()));
        let synchronous =
            normalize_synchronous(&parse_env_or("DATABASE_SYNCHRONOUS", "NORMAL".to_string()));

        let db = if config.url.starts_with("libsql://") || config.url.starts_with("https://") {
            let auth_token = config.auth_token.clone().unwrap_or_default();
            match config.local_path {
                Some(ref local_path) => {
                    Builder::new_remote_replica(local_path, config.url.clone(), auth_token)
                        .build()
                        .await?
                }
                None => Builder::new_remote(config.url.clone(), auth_token).build().await?,
            }
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            Builder::new_local(path).build().await?
        };

        let database = Self {
            db: Arc::new(db),
            busy_timeout_ms: parse_env_or("DATABASE_BUSY_TIMEOUT_MS", 5000),
            journal_mode,
            synchronous,
        };
        database.configure().await?;

        let conn = database.connect()?;
        schema::init_schema(&conn).await?;

        tracing::info!(url = %redact_url(&config.url), "Database ready");
        Ok(database)
    }

    pub fn connect(&self) -> Result<Connection> {
        Ok(self.db.connect()?)
    }

    async fn configure(&self) -> Result<()> {
        let conn = self.connect()?;

        let pragmas = [
            ("busy_timeout", self.busy_timeout_ms.to_string()),
            ("journal_mode", self.journal_mode.to_string()),
            ("synchronous", self.synchronous.to_string()),
        ];
        for (pragma, value) in pragmas {
            if let Err(error) = conn.execute_batch(&format!("PRAGMA {pragma} = {value}")).await {
                tracing::warn!(pragma, value = %value, error = %error, "Failed to set SQLite pragma");
            }
        }

        Ok(())
    }

    /// Pull from the remote primary. A no-op for local files.
    pub async fn sync(&self) -> Result<()> {
        if let Ok(replicated) = self.db.sync().await {
            tracing::debug!("Database synced: {:?}", replicated);
        }
        Ok(())
    }
}

fn normalize_journal_mode(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "DELETE" => "DELETE",
        "TRUNCATE" => "TRUNCATE",
        "MEMORY" => "MEMORY",
        "OFF" => "OFF",
        _ => "WAL",
    }
}

fn normalize_synchronous(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "OFF" => "OFF",
        "FULL" => "FULL",
        _ => "NORMAL",
    }
}

fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pragma_values_fall_back_to_defaults() {
        assert_eq!(normalize_journal_mode("delete"), "DELETE");
        assert_eq!(normalize_journal_mode("bogus"), "WAL");
        assert_eq!(normalize_synchronous(" full "), "FULL");
        assert_eq!(normalize_synchronous(""), "NORMAL");
    }

    #[test]
    fn query_string_is_dropped_from_logged_url() {
        assert_eq!(redact_url("libsql://db.example?authToken=x"), "libsql://db.example");
        assert_eq!(redact_url("file:folio.db"), "file:folio.db");
    }

    #[tokio::test]
    async fn opens_file_database_and_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        let config = DatabaseConfig {
            url: format!("file:{}", path.display()),
            auth_token: None,
            local_path: None,
        };

        let db = Database::new(&config).await.unwrap();
        let conn = db.connect().unwrap();
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'memory_entities'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }
}
