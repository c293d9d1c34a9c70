//! Harvester core: pure feed state machine, stop policy and report model.
mod effect;
mod model;
mod msg;
mod report;
mod state;
mod stop;
mod update;

pub use effect::FeedEffect;
pub use model::{
    link_slug, normalize_timestamp, ArticleId, CanonicalArticle, FeedId, FeedSource,
    FetchSignal, HarvestCursor, RawListItem,
};
pub use msg::FeedMsg;
pub use report::{AbortKind, FailureKind, FeedReport, RunReport, TerminalReason};
pub use state::{FeedPhase, FeedRun};
pub use stop::{
    ItemFacts, ItemObservation, ItemVerdict, PageVerdict, StopCause, StopPolicy,
    StopState, DEFAULT_MAX_CONSECUTIVE_EXISTING,
};
pub use update::update;
