use std::collections::BTreeMap;
use std::fmt;

use crate::{FeedId, StopCause};

/// Signals that cross feed boundaries and end the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbortKind {
    RateLimited,
    SessionInvalid,
}

impl AbortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortKind::RateLimited => "RATE_LIMITED",
            AbortKind::SessionInvalid => "SESSION_INVALID",
        }
    }
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a feed's harvest ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    /// In-window and below-cutoff items were both seen.
    CaughtUp,
    DuplicateStreak,
    NoMorePages,
    MalformedPage,
    MaxPages,
    RateLimited,
    SessionInvalid,
    /// Stopped because another feed aborted the run.
    Cancelled(AbortKind),
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::CaughtUp => "CAUGHT_UP",
            TerminalReason::DuplicateStreak => "DUPLICATE_STREAK",
            TerminalReason::NoMorePages => "NO_MORE_PAGES",
            TerminalReason::MalformedPage => "MALFORMED_PAGE",
            TerminalReason::MaxPages => "ABORTED_MAX_PAGES",
            TerminalReason::RateLimited => "ABORTED_RATE_LIMIT",
            TerminalReason::SessionInvalid => "ABORTED_AUTH",
            TerminalReason::Cancelled(AbortKind::RateLimited) => "CANCELLED_RATE_LIMIT",
            TerminalReason::Cancelled(AbortKind::SessionInvalid) => "CANCELLED_AUTH",
        }
    }

    /// Completed normally (not aborted); such feeds get their sync time recorded.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TerminalReason::CaughtUp
                | TerminalReason::DuplicateStreak
                | TerminalReason::NoMorePages
                | TerminalReason::MalformedPage
        )
    }
}

impl From<StopCause> for TerminalReason {
    fn from(cause: StopCause) -> Self {
        match cause {
            StopCause::CaughtUp => TerminalReason::CaughtUp,
            StopCause::DuplicateStreak => TerminalReason::DuplicateStreak,
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribution for every partial failure in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    RateLimited,
    SessionInvalid,
    MalformedPage,
    NetworkTimeout,
    MediaRehostFailure,
    /// Not an error: the publisher removed the item upstream.
    ItemRetracted,
    /// Secondary body fetch failed; the article was kept without a body.
    ContentUnavailable,
    /// The item could not be identified or handed to the sink.
    ItemFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::RateLimited => "RATE_LIMITED",
            FailureKind::SessionInvalid => "SESSION_INVALID",
            FailureKind::MalformedPage => "MALFORMED_PAGE",
            FailureKind::NetworkTimeout => "NETWORK_TIMEOUT",
            FailureKind::MediaRehostFailure => "MEDIA_REHOST_FAILURE",
            FailureKind::ItemRetracted => "ITEM_RETRACTED",
            FailureKind::ContentUnavailable => "CONTENT_UNAVAILABLE",
            FailureKind::ItemFailed => "ITEM_FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub feed_id: FeedId,
    pub pages_fetched: u32,
    /// Items handed to the sink successfully.
    pub accepted: usize,
    pub persisted_new: usize,
    pub persisted_existing: usize,
    pub skipped_duplicates: usize,
    /// Accepted by the policy but older than the cutoff.
    pub below_cutoff: usize,
    pub retracted: usize,
    pub media_warnings: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub reason: TerminalReason,
}

impl FeedReport {
    pub fn new(feed_id: impl Into<FeedId>) -> Self {
        Self {
            feed_id: feed_id.into(),
            pages_fetched: 0,
            accepted: 0,
            persisted_new: 0,
            persisted_existing: 0,
            skipped_duplicates: 0,
            below_cutoff: 0,
            retracted: 0,
            media_warnings: 0,
            failures: BTreeMap::new(),
            reason: TerminalReason::NoMorePages,
        }
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.record_failures(kind, 1);
    }

    pub fn record_failures(&mut self, kind: FailureKind, count: usize) {
        if count == 0 {
            return;
        }
        *self.failures.entry(kind).or_insert(0) += count;
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: i64,
    pub finished_at: i64,
    /// In the order the feeds were submitted.
    pub feeds: Vec<FeedReport>,
    pub aborted: Option<AbortKind>,
}

impl RunReport {
    pub fn total_accepted(&self) -> usize {
        self.feeds.iter().map(|feed| feed.accepted).sum()
    }

    pub fn feed(&self, feed_id: &str) -> Option<&FeedReport> {
        self.feeds.iter().find(|feed| feed.feed_id == feed_id)
    }
}
