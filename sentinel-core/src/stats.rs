//! Uptime and latency figures folded from recent probe logs.

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::StatsConfig,
    error::{Error, Result},
    models::{CheckStatus, LastStatus, Log, Site, SiteStats, SiteWithStats},
    repository::LogRepository,
};

impl SiteStats {
    /// Figures reported before any probe has been recorded.
    pub const EMPTY: SiteStats = SiteStats {
        uptime: 100.0,
        avg_response_time: 0,
        last_status: LastStatus::Unknown,
    };

    /// Folds a newest-first window of logs.
    pub fn from_logs(logs: &[Log]) -> Self {
        let Some(newest) = logs.first() else {
            return Self::EMPTY;
        };

        let total = logs.len() as f64;
        let up = logs.iter().filter(|l| l.status == CheckStatus::Up).count() as f64;
        let latency_sum: i64 = logs.iter().map(|l| i64::from(l.response_time_ms)).sum();

        Self {
            uptime: up / total * 100.0,
            avg_response_time: (latency_sum as f64 / total).round() as i64,
            last_status: newest.status.into(),
        }
    }
}

/// Read-side aggregation over the log repository. Holds no state of its own.
#[derive(Clone)]
pub struct StatsAggregator {
    logs: Arc<dyn LogRepository>,
    windows: StatsConfig,
}

impl StatsAggregator {
    pub fn new(logs: Arc<dyn LogRepository>, windows: StatsConfig) -> Self {
        Self { logs, windows }
    }

    /// Stats over the dashboard window.
    pub async fn compute_stats(&self, site_id: Uuid) -> Result<SiteStats> {
        self.compute_stats_with_window(site_id, self.windows.dashboard_window)
            .await
    }

    pub async fn compute_stats_with_window(&self, site_id: Uuid, limit: i64) -> Result<SiteStats> {
        if limit <= 0 {
            return Err(Error::validation(format!(
                "stats window must be positive, got {limit}"
            )));
        }
        let logs = self.logs.list_recent_logs(site_id, limit).await?;
        Ok(SiteStats::from_logs(&logs))
    }

    /// Newest-first logs over the analysis window, as fed to charts and log analysis.
    pub async fn recent_logs(&self, site_id: Uuid) -> Result<Vec<Log>> {
        self.logs
            .list_recent_logs(site_id, self.windows.analysis_window)
            .await
    }

    pub async fn sites_with_stats(&self, sites: &[Site]) -> Result<Vec<SiteWithStats>> {
        let mut out = Vec::with_capacity(sites.len());
        for site in sites {
            let stats = self.compute_stats(site.id).await?;
            out.push(SiteWithStats {
                site: site.clone(),
                stats,
            });
        }
        Ok(out)
    }
}
