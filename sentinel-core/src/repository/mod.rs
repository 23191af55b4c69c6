//! Persistence boundary for sites and their probe logs.
//!
//! The checker only ever talks to these traits; `PgStore` backs them with
//! PostgreSQL and `MemoryStore` keeps everything in process.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::Result,
    models::{CreateSiteRequest, Log, NewLog, Site, UpdateSiteRequest},
};

#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Every site with `is_active = true`, read fresh on each call.
    async fn list_active_sites(&self) -> Result<Vec<Site>>;

    async fn get_site(&self, id: Uuid) -> Result<Option<Site>>;

    /// Fails with `NotFound` when the site no longer exists.
    async fn update_last_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()>;

    /// Sites owned by a user, newest first.
    async fn list_sites_by_user(&self, user_id: Uuid) -> Result<Vec<Site>>;

    async fn create_site(&self, request: CreateSiteRequest) -> Result<Site>;

    async fn update_site(&self, id: Uuid, request: UpdateSiteRequest) -> Result<Site>;

    /// Deletes the site's logs, then the site itself.
    async fn delete_site(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append_log(&self, log: NewLog) -> Result<Log>;

    /// At most `limit` logs for the site, newest first.
    async fn list_recent_logs(&self, site_id: Uuid, limit: i64) -> Result<Vec<Log>>;
}
