use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use slimquest_types::models::MaintenanceReport;

use crate::Database;

impl Database {
    /// Expire stale quest instances, then assign the current cycle.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let expired = self.cleanup_expired_quests(now)?;
        let assigned = self.assign_quests(now)?;
        info!("Maintenance: assigned {}, expired {}", assigned, expired);
        Ok(MaintenanceReport { assigned, expired })
    }
}
