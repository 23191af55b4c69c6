use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LogRepository, SiteRepository};
use crate::{
    error::{Error, Result},
    models::{CreateSiteRequest, Log, NewLog, Site, UpdateSiteRequest},
};

#[derive(Default)]
struct Inner {
    sites: HashMap<Uuid, Site>,
    // Insertion order.
    logs: Vec<Log>,
}

/// In-process store implementing both repositories.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a site as-is, keeping its id and timestamps.
    pub async fn insert_site(&self, site: Site) {
        self.inner.write().await.sites.insert(site.id, site);
    }

    pub async fn log_count(&self) -> usize {
        self.inner.read().await.logs.len()
    }
}

#[async_trait]
impl SiteRepository for MemoryStore {
    async fn list_active_sites(&self) -> Result<Vec<Site>> {
        let inner = self.inner.read().await;
        Ok(inner.sites.values().filter(|s| s.is_active).cloned().collect())
    }

    async fn get_site(&self, id: Uuid) -> Result<Option<Site>> {
        Ok(self.inner.read().await.sites.get(&id).cloned())
    }

    async fn update_last_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let site = inner
            .sites
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("site {id}")))?;
        site.last_checked = Some(checked_at);
        Ok(())
    }

    async fn list_sites_by_user(&self, user_id: Uuid) -> Result<Vec<Site>> {
        let inner = self.inner.read().await;
        let mut sites: Vec<Site> = inner
            .sites
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sites)
    }

    async fn create_site(&self, request: CreateSiteRequest) -> Result<Site> {
        request.validate()?;

        let site = Site {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            name: request.name,
            url: request.url,
            interval_minutes: request.interval_minutes,
            is_active: request.is_active,
            last_checked: None,
            created_at: Utc::now(),
        };
        self.inner.write().await.sites.insert(site.id, site.clone());
        Ok(site)
    }

    async fn update_site(&self, id: Uuid, request: UpdateSiteRequest) -> Result<Site> {
        request.validate()?;

        let mut inner = self.inner.write().await;
        let site = inner
            .sites
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("site {id}")))?;
        request.apply(site);
        Ok(site.clone())
    }

    async fn delete_site(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.sites.contains_key(&id) {
            return Err(Error::not_found(format!("site {id}")));
        }
        inner.logs.retain(|log| log.site_id != id);
        inner.sites.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl LogRepository for MemoryStore {
    async fn append_log(&self, log: NewLog) -> Result<Log> {
        if log.response_time_ms < 0 {
            return Err(Error::validation("response time must not be negative"));
        }

        let mut inner = self.inner.write().await;
        if !inner.sites.contains_key(&log.site_id) {
            return Err(Error::not_found(format!("site {}", log.site_id)));
        }

        let log = Log {
            id: Uuid::new_v4(),
            site_id: log.site_id,
            status: log.status,
            response_time_ms: log.response_time_ms,
            created_at: log.created_at,
        };
        inner.logs.push(log.clone());
        Ok(log)
    }

    async fn list_recent_logs(&self, site_id: Uuid, limit: i64) -> Result<Vec<Log>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let inner = self.inner.read().await;

        // Reverse first so the stable sort keeps later inserts ahead on ties.
        let mut logs: Vec<Log> = inner
            .logs
            .iter()
            .rev()
            .filter(|log| log.site_id == site_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;
    use chrono::Duration;

    fn request(user_id: Uuid, name: &str) -> CreateSiteRequest {
        CreateSiteRequest {
            user_id,
            name: name.to_string(),
            url: "https://example.com/health".to_string(),
            interval_minutes: 5,
            is_active: true,
        }
    }

    fn new_log(site_id: Uuid, status: CheckStatus, at: DateTime<Utc>) -> NewLog {
        NewLog {
            site_id,
            status,
            response_time_ms: 120,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn only_active_sites_are_listed() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let a = store.create_site(request(user, "a")).await.unwrap();
        let b = store.create_site(request(user, "b")).await.unwrap();
        store
            .update_site(
                b.id,
                UpdateSiteRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let active = store.list_active_sites().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }

    #[tokio::test]
    async fn create_rejects_invalid_interval() {
        let store = MemoryStore::new();
        let mut req = request(Uuid::new_v4(), "bad");
        req.interval_minutes = 0;
        assert!(matches!(
            store.create_site(req).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn recent_logs_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        let site = store
            .create_site(request(Uuid::new_v4(), "site"))
            .await
            .unwrap();
        let t0 = Utc::now();
        for i in 0..5 {
            store
                .append_log(new_log(site.id, CheckStatus::Up, t0 + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let logs = store.list_recent_logs(site.id, 3).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].created_at, t0 + Duration::seconds(4));
        assert_eq!(logs[2].created_at, t0 + Duration::seconds(2));
    }

    #[tokio::test]
    async fn delete_cascades_to_logs() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let doomed = store.create_site(request(user, "doomed")).await.unwrap();
        let kept = store.create_site(request(user, "kept")).await.unwrap();
        store
            .append_log(new_log(doomed.id, CheckStatus::Down, Utc::now()))
            .await
            .unwrap();
        store
            .append_log(new_log(kept.id, CheckStatus::Up, Utc::now()))
            .await
            .unwrap();

        store.delete_site(doomed.id).await.unwrap();

        assert!(store.get_site(doomed.id).await.unwrap().is_none());
        assert!(store.list_recent_logs(doomed.id, 10).await.unwrap().is_empty());
        assert_eq!(store.log_count().await, 1);
        assert!(matches!(
            store.delete_site(doomed.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_last_checked_on_missing_site_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_last_checked(Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn append_log_requires_existing_site() {
        let store = MemoryStore::new();
        let result = store
            .append_log(new_log(Uuid::new_v4(), CheckStatus::Up, Utc::now()))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
