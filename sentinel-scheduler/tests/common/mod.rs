#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::{
    Error, Result,
    models::{CheckStatus, CreateSiteRequest, Log, NewLog, Site, UpdateSiteRequest},
    repository::{LogRepository, MemoryStore, SiteRepository},
};
use sentinel_scheduler::{ProbeOutcome, Prober};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
    Up(i32),
    Down(i32),
    Slow(Duration),
    Panic,
}

/// Prober answering from a per-URL script and counting calls.
#[derive(Default)]
pub struct ScriptedProber {
    script: Mutex<HashMap<String, Behaviour>>,
    calls: Mutex<Vec<String>>,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, url: &str, behaviour: Behaviour) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), behaviour);
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        let behaviour = self
            .script
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(Behaviour::Up(10));

        match behaviour {
            Behaviour::Up(ms) => ProbeOutcome {
                status: CheckStatus::Up,
                response_time_ms: ms,
            },
            Behaviour::Down(ms) => ProbeOutcome {
                status: CheckStatus::Down,
                response_time_ms: ms,
            },
            Behaviour::Slow(delay) => {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_running.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                ProbeOutcome::new(CheckStatus::Up, delay)
            }
            Behaviour::Panic => panic!("prober blew up for {url}"),
        }
    }
}

/// Log repository that refuses writes for one site.
pub struct FailingLogs {
    pub inner: MemoryStore,
    pub fail_for: Uuid,
}

#[async_trait]
impl LogRepository for FailingLogs {
    async fn append_log(&self, log: NewLog) -> Result<Log> {
        if log.site_id == self.fail_for {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.append_log(log).await
    }

    async fn list_recent_logs(&self, site_id: Uuid, limit: i64) -> Result<Vec<Log>> {
        self.inner.list_recent_logs(site_id, limit).await
    }
}

/// Site repository whose active listing is a fixed, possibly outdated
/// snapshot; every other call reaches the real store.
pub struct SnapshotSites {
    pub inner: MemoryStore,
    pub snapshot: Vec<Site>,
}

#[async_trait]
impl SiteRepository for SnapshotSites {
    async fn list_active_sites(&self) -> Result<Vec<Site>> {
        Ok(self.snapshot.clone())
    }

    async fn get_site(&self, id: Uuid) -> Result<Option<Site>> {
        self.inner.get_site(id).await
    }

    async fn update_last_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
        self.inner.update_last_checked(id, checked_at).await
    }

    async fn list_sites_by_user(&self, user_id: Uuid) -> Result<Vec<Site>> {
        self.inner.list_sites_by_user(user_id).await
    }

    async fn create_site(&self, request: CreateSiteRequest) -> Result<Site> {
        self.inner.create_site(request).await
    }

    async fn update_site(&self, id: Uuid, request: UpdateSiteRequest) -> Result<Site> {
        self.inner.update_site(id, request).await
    }

    async fn delete_site(&self, id: Uuid) -> Result<()> {
        self.inner.delete_site(id).await
    }
}

pub fn site(name: &str, interval_minutes: i32, last_checked: Option<DateTime<Utc>>) -> Site {
    Site {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        name: name.to_string(),
        url: format!("https://{name}.example.com/"),
        interval_minutes,
        is_active: true,
        last_checked,
        created_at: Utc::now(),
    }
}
