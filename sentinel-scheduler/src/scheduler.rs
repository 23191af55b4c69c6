use chrono::{DateTime, Utc};
use sentinel_core::{
    Error, Result,
    config::SchedulerConfig,
    models::{NewLog, Site},
    repository::{LogRepository, SiteRepository},
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Instant,
};
use tokio::{
    sync::{Mutex as AsyncMutex, Semaphore},
    task::JoinSet,
};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::probe::{ProbeOutcome, Prober};

/// Counters for a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub active: usize,
    pub due: usize,
    pub checked: usize,
    pub failed: usize,
    pub skipped_in_flight: usize,
    /// Due in the snapshot but already checked, deactivated or deleted by
    /// the time its guard was taken.
    pub skipped_stale: usize,
}

type InFlight = Arc<Mutex<HashSet<Uuid>>>;

/// Marks a site as being probed until dropped.
struct InFlightGuard {
    in_flight: InFlight,
    site_id: Uuid,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, site_id: Uuid) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.insert(site_id).then(|| Self {
            in_flight: in_flight.clone(),
            site_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.site_id);
    }
}

/// Periodic checker: one coarse tick re-reads the active sites and probes
/// those that are due.
pub struct CheckScheduler {
    sites: Arc<dyn SiteRepository>,
    logs: Arc<dyn LogRepository>,
    prober: Arc<dyn Prober>,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    jobs: AsyncMutex<Option<JobScheduler>>,
}

impl CheckScheduler {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        logs: Arc<dyn LogRepository>,
        prober: Arc<dyn Prober>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            sites,
            logs,
            prober,
            config,
            permits,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            jobs: AsyncMutex::new(None),
        }
    }

    /// Registers the tick job and starts firing it.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.is_some() {
            return Err(Error::scheduler("check scheduler already started"));
        }

        info!("Starting check scheduler");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;

        let cron_expression = self.config.cron_expression();
        let this = Arc::clone(self);
        let job = Job::new_async(&cron_expression, move |_uuid, _l| {
            let this = this.clone();
            Box::pin(async move {
                let report = this.tick(Utc::now()).await;
                debug!(?report, "Tick finished");
            })
        })
        .map_err(|e| Error::scheduler(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;

        *jobs = Some(scheduler);
        info!(
            "Check scheduler started (tick every {}s, max {} concurrent probes)",
            self.config.tick_interval_secs, self.config.max_concurrency
        );
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let Some(mut scheduler) = self.jobs.lock().await.take() else {
            return Ok(());
        };

        info!("Stopping check scheduler");
        scheduler
            .shutdown()
            .await
            .map_err(|e| Error::scheduler(e.to_string()))?;
        info!("Check scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.jobs.lock().await.is_some()
    }

    /// Runs one tick against `now`. Never fails: per-site errors are logged
    /// and counted.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let sites = match self.sites.list_active_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                error!(error = %e, "Failed to list active sites");
                return report;
            }
        };
        report.active = sites.len();

        let mut tasks = JoinSet::new();
        for site in sites.into_iter().filter(|site| site.is_due(now)) {
            report.due += 1;

            let Some(guard) = InFlightGuard::acquire(&self.in_flight, site.id) else {
                warn!(site = %site.name, "Previous check still in flight, skipping");
                report.skipped_in_flight += 1;
                continue;
            };

            let permits = self.permits.clone();
            let prober = self.prober.clone();
            let sites = self.sites.clone();
            let logs = self.logs.clone();
            let span = info_span!("check", site_id = %site.id, url = %site.url);

            tasks.spawn(
                async move {
                    let _guard = guard;
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| (site.name.clone(), Error::scheduler(e.to_string())))?;

                    // The snapshot may predate a write from an overlapping tick.
                    let current = match sites.get_site(site.id).await {
                        Ok(Some(current)) if current.is_active && current.is_due(now) => current,
                        Ok(_) => {
                            debug!(site = %site.name, "No longer due, skipping");
                            return Ok(false);
                        }
                        Err(e) => return Err((site.name.clone(), e)),
                    };

                    check_site(&current, now, prober, sites.as_ref(), logs.as_ref())
                        .await
                        .map(|()| true)
                        .map_err(|e| (site.name.clone(), e))
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(true)) => report.checked += 1,
                Ok(Ok(false)) => report.skipped_stale += 1,
                Ok(Err((name, e))) => {
                    report.failed += 1;
                    if e.is_client_error() {
                        warn!(site = %name, error = %e, "Check not recorded");
                    } else {
                        error!(site = %name, error = %e, "Failed to record check");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "Check task aborted");
                }
            }
        }

        if report.due > 0 {
            info!(
                active = report.active,
                due = report.due,
                checked = report.checked,
                failed = report.failed,
                skipped = report.skipped_in_flight,
                stale = report.skipped_stale,
                "Tick complete"
            );
        }
        report
    }
}

/// Probes one site and records the outcome. `last_checked` is set to the
/// tick time, not the completion time.
async fn check_site(
    site: &Site,
    now: DateTime<Utc>,
    prober: Arc<dyn Prober>,
    sites: &dyn SiteRepository,
    logs: &dyn LogRepository,
) -> Result<()> {
    let started = Instant::now();
    let url = site.url.clone();

    // A panicking prober is contained by its own task and recorded as DOWN.
    let outcome = match tokio::spawn(async move { prober.probe(&url).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(site = %site.name, error = %e, "Probe crashed, recording DOWN");
            ProbeOutcome::down(started.elapsed())
        }
    };

    logs.append_log(NewLog {
        site_id: site.id,
        status: outcome.status,
        response_time_ms: outcome.response_time_ms,
        created_at: Utc::now(),
    })
    .await?;
    sites.update_last_checked(site.id, now).await?;

    info!(
        "Site {} is {} ({}ms)",
        site.name, outcome.status, outcome.response_time_ms
    );
    Ok(())
}
