use crate::{AbortKind, FetchSignal, PageVerdict, StopState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMsg {
    /// Orchestrator picked the feed up.
    Start,
    /// A valid session is available for this feed.
    SessionReady,
    /// No valid session could be obtained.
    SessionUnavailable,
    /// The listing request for the current cursor returned.
    PageFetched { signal: FetchSignal },
    /// Items of the current page went through the stop policy.
    PageEvaluated {
        state: StopState,
        verdict: PageVerdict,
    },
    /// Run-scoped cancellation was seen before issuing new work.
    CancelObserved(AbortKind),
}
