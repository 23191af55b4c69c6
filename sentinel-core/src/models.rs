use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::{
    config::MIN_SITE_INTERVAL_MINUTES,
    error::{Error, Result},
};

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    pub interval_minutes: i32,
    pub is_active: bool,
    /// `None` until the first probe has been recorded.
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// When the next probe falls due. A never-checked site counts from the epoch.
    pub fn next_check_due(&self) -> DateTime<Utc> {
        self.last_checked.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            + Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_check_due()
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Up,
    Down,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "UP",
            CheckStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UP" => Ok(CheckStatus::Up),
            "DOWN" => Ok(CheckStatus::Down),
            other => Err(Error::validation(format!("unknown check status: {other}"))),
        }
    }
}

/// Most recent known status of a site; `Unknown` until a log exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LastStatus {
    Up,
    Down,
    Unknown,
}

impl From<CheckStatus> for LastStatus {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Up => LastStatus::Up,
            CheckStatus::Down => LastStatus::Down,
        }
    }
}

impl fmt::Display for LastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastStatus::Up => f.write_str("UP"),
            LastStatus::Down => f.write_str("DOWN"),
            LastStatus::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// One immutable probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: Uuid,
    pub site_id: Uuid,
    pub status: CheckStatus,
    pub response_time_ms: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLog {
    pub site_id: Uuid,
    pub status: CheckStatus,
    pub response_time_ms: i32,
    pub created_at: DateTime<Utc>,
}

fn default_interval_minutes() -> i32 {
    5
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl CreateSiteRequest {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_url(&self.url)?;
        validate_interval(self.interval_minutes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiteRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub interval_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateSiteRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        if let Some(interval) = self.interval_minutes {
            validate_interval(interval)?;
        }
        Ok(())
    }

    pub fn apply(&self, site: &mut Site) {
        if let Some(name) = &self.name {
            site.name = name.clone();
        }
        if let Some(url) = &self.url {
            site.url = url.clone();
        }
        if let Some(interval) = self.interval_minutes {
            site.interval_minutes = interval;
        }
        if let Some(active) = self.is_active {
            site.is_active = active;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("site name must not be empty"));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::validation(format!("invalid url {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::validation(format!("unsupported url scheme: {scheme}"))),
    }
}

fn validate_interval(interval_minutes: i32) -> Result<()> {
    if interval_minutes < MIN_SITE_INTERVAL_MINUTES {
        return Err(Error::validation(format!(
            "interval must be at least {MIN_SITE_INTERVAL_MINUTES} minute(s), got {interval_minutes}"
        )));
    }
    Ok(())
}

/// Figures derived from a window of recent logs. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub uptime: f64,
    pub avg_response_time: i64,
    pub last_status: LastStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteWithStats {
    #[serde(flatten)]
    pub site: Site,
    #[serde(flatten)]
    pub stats: SiteStats,
}
