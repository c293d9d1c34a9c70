//! Seams to the systems around the harvester: storage, media, config, auth and reporting.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use engine_logging::{engine_info, engine_warn};
use harvester_core::{AbortKind, ArticleId, CanonicalArticle, FeedReport};

use crate::{
    AuthError, MediaError, ReportError, SessionContext, SessionScope, SinkError, StoredArticle,
};

/// Article storage. The harvester keeps no dedupe store of its own.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Existence check for duplicate detection; also reports whether a body is stored.
    async fn lookup(&self, id: &ArticleId) -> Result<Option<StoredArticle>, SinkError>;

    /// Idempotent upsert; `Ok(false)` when the article was already stored.
    async fn persist(&self, article: CanonicalArticle) -> Result<bool, SinkError>;

    /// The publisher removed the item upstream.
    async fn mark_retracted(&self, id: &ArticleId) -> Result<(), SinkError>;

    /// Records the feed's `last_sync_at` after a completed harvest.
    async fn record_sync(&self, feed_id: &str, at_unix: i64) -> Result<(), SinkError>;
}

/// Durable hosting for media referenced by article bodies.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn rehost(&self, external_url: &str, scope_key: &str) -> Result<String, MediaError>;

    /// The url already points into this store.
    fn is_durable(&self, url: &str) -> bool;
}

pub trait ConfigProvider: Send + Sync {
    fn cutoff_date(&self) -> NaiveDate;

    /// Timezone in which publish dates are compared against the cutoff.
    fn utc_offset(&self) -> FixedOffset {
        Utc.fix()
    }

    fn max_pages_per_feed(&self) -> u32;

    fn max_consecutive_existing(&self) -> u32;

    fn pacing_jitter_range(&self) -> (Duration, Duration);

    fn page_size(&self) -> u32 {
        5
    }

    /// Fetch the full body of each accepted item.
    fn gather_content(&self) -> bool {
        false
    }

    fn worker_limit(&self) -> usize {
        1
    }

    fn session_scope(&self) -> SessionScope {
        SessionScope::Global
    }

    /// Cutoff as the unix instant of local midnight.
    fn cutoff_unix(&self) -> i64 {
        self.cutoff_date()
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| midnight.and_local_timezone(self.utc_offset()).single())
            .map(|start| start.timestamp())
            .unwrap_or(i64::MIN)
    }
}

/// Supplies and revokes upstream credentials. Re-authentication happens outside the harvester.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn ensure_valid(&self, source_key: &str) -> Result<SessionContext, AuthError>;

    async fn invalidate(&self, source_key: &str);
}

/// Fire-and-forget observability hooks. Errors are logged and never fail a harvest.
pub trait Reporter: Send + Sync {
    fn feed_completed(&self, report: &FeedReport) -> Result<(), ReportError>;

    fn run_aborted(&self, reason: AbortKind) -> Result<(), ReportError>;
}

/// Reporter that writes completions to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn feed_completed(&self, report: &FeedReport) -> Result<(), ReportError> {
        engine_info!(
            "FeedCompleted feed_id={} accepted={} reason={} pages={} duplicates={} failures={:?}",
            report.feed_id,
            report.accepted,
            report.reason,
            report.pages_fetched,
            report.skipped_duplicates,
            report.failures
        );
        Ok(())
    }

    fn run_aborted(&self, reason: AbortKind) -> Result<(), ReportError> {
        engine_warn!("RunAborted reason={}", reason);
        Ok(())
    }
}
