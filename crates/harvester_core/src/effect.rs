use crate::{AbortKind, HarvestCursor, TerminalReason};

/// Work the orchestrator performs on behalf of a feed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEffect {
    AcquireSession,
    FetchPage(HarvestCursor),
    EvaluatePage,
    /// Global stop: every other feed in the run must stop issuing requests.
    AbortRun(AbortKind),
    Complete(TerminalReason),
}
