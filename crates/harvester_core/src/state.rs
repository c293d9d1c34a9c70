use crate::{FeedId, HarvestCursor, StopState, TerminalReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPhase {
    Init,
    Fetching,
    Evaluating,
    Terminal(TerminalReason),
}

/// State of one feed's harvest within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRun {
    feed_id: FeedId,
    cursor: HarvestCursor,
    max_pages: u32,
    phase: FeedPhase,
    stop: StopState,
    pages_fetched: u32,
}

impl FeedRun {
    pub fn new(feed_id: impl Into<FeedId>, page_size: u32, max_pages: u32) -> Self {
        let feed_id = feed_id.into();
        Self {
            cursor: HarvestCursor::first(feed_id.clone(), page_size),
            feed_id,
            max_pages: max_pages.max(1),
            phase: FeedPhase::Init,
            stop: StopState::default(),
            pages_fetched: 0,
        }
    }

    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn cursor(&self) -> &HarvestCursor {
        &self.cursor
    }

    pub fn phase(&self) -> &FeedPhase {
        &self.phase
    }

    pub fn stop_state(&self) -> StopState {
        self.stop
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        match self.phase {
            FeedPhase::Terminal(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, FeedPhase::Terminal(_))
    }

    pub(crate) fn set_phase(&mut self, phase: FeedPhase) {
        self.phase = phase;
    }

    pub(crate) fn record_page_fetched(&mut self) {
        self.pages_fetched += 1;
    }

    pub(crate) fn set_stop_state(&mut self, stop: StopState) {
        self.stop = stop;
    }

    /// Advances to the next page, or `false` when the page budget is spent.
    pub(crate) fn advance(&mut self) -> bool {
        if self.cursor.page_index + 1 >= self.max_pages {
            return false;
        }
        self.cursor = self.cursor.next();
        true
    }
}
