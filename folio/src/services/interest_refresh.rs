use std::sync::Arc;

use tracing::{debug, error, info};

use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::intelligence::InterestAnalyzer;

/// Background manager that periodically rebuilds every owner's interest
/// profile.
#[derive(Clone)]
pub struct InterestRefreshManager {
    db: Arc<dyn DatabaseBackend>,
    analyzer: Arc<InterestAnalyzer>,
    window_days: u32,
    interval_secs: u64,
}

impl InterestRefreshManager {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        analyzer: Arc<InterestAnalyzer>,
        window_days: u32,
        interval_secs: u64,
    ) -> Self {
        Self {
            db,
            analyzer,
            window_days,
            interval_secs,
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// Rebuilds the profile of every owner that has entities. Failures for
    /// one owner are logged and skipped. Returns how many profiles were
    /// rebuilt.
    pub async fn run_once(&self) -> Result<u64> {
        let owners = self.db.list_owners().await?;
        if owners.is_empty() {
            debug!("No owners to refresh interest profiles for");
            return Ok(0);
        }

        let mut rebuilt = 0u64;
        let mut errors = 0u64;
        for owner in &owners {
            match self.analyzer.rebuild(owner, self.window_days).await {
                Ok(_) => rebuilt += 1,
                Err(e) => {
                    errors += 1;
                    error!(owner = owner.as_str(), error = %e, "Failed to rebuild interest profile, continuing");
                }
            }
        }

        info!(
            rebuilt,
            errors,
            owners = owners.len(),
            "Interest profile refresh complete"
        );
        Ok(rebuilt)
    }
}
