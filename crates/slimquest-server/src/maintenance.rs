use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use slimquest_api::state::AppStateInner;

/// Background task that expires stale quest instances and hands out the
/// current cycle, for deployments without an external cron trigger.
pub async fn run_maintenance_loop(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let job = state.clone();
        match tokio::task::spawn_blocking(move || job.db.run_maintenance(Utc::now())).await {
            Ok(Ok(report)) => {
                if report.assigned > 0 || report.expired > 0 {
                    info!("Maintenance: assigned {}, expired {}", report.assigned, report.expired);
                }
            }
            Ok(Err(e)) => warn!("Maintenance error: {}", e),
            Err(e) => warn!("Maintenance task join error: {}", e),
        }
    }
}
