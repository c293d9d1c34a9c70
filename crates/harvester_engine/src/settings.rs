use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use harvester_core::DEFAULT_MAX_CONSECUTIVE_EXISTING;

use crate::ConfigProvider;

/// Extra pages allowed beyond one page per day of lookback.
const MAX_PAGES_SLACK: u32 = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid utc offset {0} minutes")]
    InvalidOffset(i32),
    #[error("pacing jitter minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvalidJitter { min_ms: u64, max_ms: u64 },
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// Whether one credential is shared by every feed or each feed has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionScope {
    #[default]
    Global,
    PerFeed,
}

/// `cutoff_date` is the only required field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSettings {
    pub cutoff_date: NaiveDate,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub max_pages_per_feed: Option<u32>,
    #[serde(default = "default_max_consecutive_existing")]
    pub max_consecutive_existing: u32,
    #[serde(default = "default_pacing_jitter_ms")]
    pub pacing_jitter_ms: (u64, u64),
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub gather_content: bool,
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
    #[serde(default)]
    pub session_scope: SessionScope,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Date used to derive the page budget; `None` means the current date.
    #[serde(skip)]
    pub today: Option<NaiveDate>,
}

fn default_max_consecutive_existing() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_EXISTING
}

fn default_pacing_jitter_ms() -> (u64, u64) {
    (0, 10_000)
}

fn default_page_size() -> u32 {
    5
}

fn default_worker_limit() -> usize {
    1
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl HarvestSettings {
    pub fn with_cutoff(cutoff_date: NaiveDate) -> Self {
        Self {
            cutoff_date,
            utc_offset_minutes: 0,
            max_pages_per_feed: None,
            max_consecutive_existing: default_max_consecutive_existing(),
            pacing_jitter_ms: default_pacing_jitter_ms(),
            page_size: default_page_size(),
            gather_content: false,
            worker_limit: default_worker_limit(),
            session_scope: SessionScope::Global,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            today: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.offset()?;
        let (min_ms, max_ms) = self.pacing_jitter_ms;
        if min_ms > max_ms {
            return Err(ConfigError::InvalidJitter { min_ms, max_ms });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))
    }

    fn local_today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| {
            let offset = self.offset().unwrap_or_else(|_| Utc.fix());
            Utc::now().with_timezone(&offset).date_naive()
        })
    }
}

/// Page budget for a lookback: one page per day since the cutoff, plus slack.
/// A cutoff in the future is treated as today.
pub fn derive_max_pages(cutoff: NaiveDate, today: NaiveDate) -> u32 {
    let cutoff = cutoff.min(today);
    let days = (today - cutoff).num_days();
    let days = u32::try_from(days).unwrap_or(u32::MAX);
    days.saturating_add(1).saturating_add(MAX_PAGES_SLACK).max(1)
}

impl ConfigProvider for HarvestSettings {
    fn cutoff_date(&self) -> NaiveDate {
        self.cutoff_date
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset().unwrap_or_else(|_| Utc.fix())
    }

    fn max_pages_per_feed(&self) -> u32 {
        match self.max_pages_per_feed {
            Some(pages) => pages.max(1),
            None => derive_max_pages(self.cutoff_date, self.local_today()),
        }
    }

    fn max_consecutive_existing(&self) -> u32 {
        self.max_consecutive_existing
    }

    fn pacing_jitter_range(&self) -> (Duration, Duration) {
        let (min_ms, max_ms) = self.pacing_jitter_ms;
        (
            Duration::from_millis(min_ms.min(max_ms)),
            Duration::from_millis(max_ms),
        )
    }

    fn page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    fn gather_content(&self) -> bool {
        self.gather_content
    }

    fn worker_limit(&self) -> usize {
        self.worker_limit.max(1)
    }

    fn session_scope(&self) -> SessionScope {
        self.session_scope
    }
}
