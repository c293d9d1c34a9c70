//! Two-axis stop policy: duplicate streak and date window.
//!
//! Items arrive newest-first. A streak of items that already exist with a body
//! ends the feed immediately, even mid-page. Independently, seeing one item
//! inside the window and one below the cutoff means the feed is caught up once
//! the page is done.

pub const DEFAULT_MAX_CONSECUTIVE_EXISTING: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Earliest publish instant that is still ingested.
    pub cutoff_unix: i64,
    pub max_consecutive_existing: u32,
}

/// Per-feed, per-run accumulator threaded through every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopState {
    pub found_in_window_date: bool,
    pub below_cutoff_seen: bool,
    pub consecutive_duplicates: u32,
}

impl StopState {
    pub fn caught_up(&self) -> bool {
        self.found_in_window_date && self.below_cutoff_seen
    }
}

/// What the evaluator needs to know about one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFacts {
    pub published_at_unix: i64,
    /// The sink already holds this id with a non-empty body.
    pub exists_with_body: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemVerdict {
    Accept,
    SkipDuplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemObservation {
    pub verdict: ItemVerdict,
    pub in_window: bool,
    /// The duplicate streak reached the threshold; the rest of the page is not evaluated.
    pub ends_page: bool,
}

impl ItemObservation {
    /// Accepted and inside the lookback window: the only items handed to the sink.
    pub fn should_persist(&self) -> bool {
        self.verdict == ItemVerdict::Accept && self.in_window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopCause {
    DuplicateStreak,
    CaughtUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Continue,
    Stop(StopCause),
}

impl StopPolicy {
    pub fn new(cutoff_unix: i64, max_consecutive_existing: u32) -> Self {
        Self {
            cutoff_unix,
            max_consecutive_existing: max_consecutive_existing.max(1),
        }
    }

    /// Applies one item to `state` and returns its verdict.
    pub fn observe(&self, state: &mut StopState, facts: &ItemFacts) -> ItemObservation {
        let verdict = if facts.exists_with_body {
            state.consecutive_duplicates += 1;
            ItemVerdict::SkipDuplicate
        } else {
            state.consecutive_duplicates = 0;
            ItemVerdict::Accept
        };

        let in_window = facts.published_at_unix >= self.cutoff_unix;
        if in_window {
            state.found_in_window_date = true;
        } else {
            state.below_cutoff_seen = true;
        }

        ItemObservation {
            verdict,
            in_window,
            ends_page: self.streak_reached(state),
        }
    }

    /// True once the duplicate streak reached the threshold.
    fn streak_reached(&self, state: &StopState) -> bool {
        state.consecutive_duplicates >= self.max_consecutive_existing
    }

    /// Page-level verdict after the last evaluated item.
    pub fn close_page(&self, state: &StopState) -> PageVerdict {
        if self.streak_reached(state) {
            PageVerdict::Stop(StopCause::DuplicateStreak)
        } else if state.caught_up() {
            PageVerdict::Stop(StopCause::CaughtUp)
        } else {
            PageVerdict::Continue
        }
    }
}
