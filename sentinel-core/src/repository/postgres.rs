use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};
use tracing::debug;
use uuid::Uuid;

use super::{LogRepository, SiteRepository};
use crate::{
    db::DatabasePool,
    error::{Error, Result},
    models::{CreateSiteRequest, Log, NewLog, Site, UpdateSiteRequest},
};

const SITE_COLUMNS: &str =
    "id, user_id, name, url, interval_minutes, is_active, last_checked, created_at";

/// PostgreSQL-backed site and log storage.
#[derive(Clone, Debug)]
pub struct PgStore {
    db: DatabasePool,
}

impl PgStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

fn site_from_row(row: &PgRow) -> Result<Site> {
    Ok(Site {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        interval_minutes: row.try_get("interval_minutes")?,
        is_active: row.try_get("is_active")?,
        last_checked: row.try_get("last_checked")?,
        created_at: row.try_get("created_at")?,
    })
}

fn log_from_row(row: &PgRow) -> Result<Log> {
    let status: String = row.try_get("status")?;
    Ok(Log {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        status: status.parse()?,
        response_time_ms: row.try_get("response_time")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SiteRepository for PgStore {
    async fn list_active_sites(&self) -> Result<Vec<Site>> {
        let rows = sqlx::query(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE is_active = true"
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(site_from_row).collect()
    }

    async fn get_site(&self, id: Uuid) -> Result<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(site_from_row).transpose()
    }

    async fn update_last_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE sites SET last_checked = $1 WHERE id = $2")
            .bind(checked_at)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("site {id}")));
        }
        Ok(())
    }

    async fn list_sites_by_user(&self, user_id: Uuid) -> Result<Vec<Site>> {
        let rows = sqlx::query(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(site_from_row).collect()
    }

    async fn create_site(&self, request: CreateSiteRequest) -> Result<Site> {
        request.validate()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO sites (id, user_id, name, url, interval_minutes, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SITE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.url)
        .bind(request.interval_minutes)
        .bind(request.is_active)
        .fetch_one(&self.db)
        .await?;

        site_from_row(&row)
    }

    async fn update_site(&self, id: Uuid, request: UpdateSiteRequest) -> Result<Site> {
        request.validate()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE sites SET
                name = COALESCE($2, name),
                url = COALESCE($3, url),
                interval_minutes = COALESCE($4, interval_minutes),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING {SITE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.url)
        .bind(request.interval_minutes)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => site_from_row(&row),
            None => Err(Error::not_found(format!("site {id}"))),
        }
    }

    async fn delete_site(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let logs = sqlx::query("DELETE FROM logs WHERE site_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::not_found(format!("site {id}")));
        }

        tx.commit().await?;
        debug!(site_id = %id, logs = logs.rows_affected(), "Deleted site and its logs");
        Ok(())
    }
}

#[async_trait]
impl LogRepository for PgStore {
    async fn append_log(&self, log: NewLog) -> Result<Log> {
        let row = sqlx::query(
            r#"
            INSERT INTO logs (id, site_id, status, response_time, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, site_id, status, response_time, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.site_id)
        .bind(log.status.as_str())
        .bind(log.response_time_ms)
        .bind(log.created_at)
        .fetch_one(&self.db)
        .await?;

        log_from_row(&row)
    }

    async fn list_recent_logs(&self, site_id: Uuid, limit: i64) -> Result<Vec<Log>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_id, status, response_time, created_at
            FROM logs
            WHERE site_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(log_from_row).collect()
    }
}
