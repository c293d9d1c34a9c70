//! Drives every feed's state machine and executes its effects.
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, StreamExt};
use harvester_core::{
    update, AbortKind, ArticleId, FailureKind, FeedEffect, FeedMsg, FeedReport, FeedRun,
    FeedSource, FetchSignal, ItemFacts, ItemVerdict, PageVerdict, RawListItem, RunReport, StopPolicy,
    StopState,
};
use tokio_util::sync::CancellationToken;

use crate::{
    AuthProvider, ConfigProvider, ContentRehomer, FetchedPage, ItemNormalizer, MediaStore,
    Normalized, PageFetcher, Reporter, SessionLease, SessionRegistry, Sink, StoredArticle,
};

pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Everything a harvest run talks to.
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub normalizer: Arc<ItemNormalizer>,
    pub media: Arc<dyn MediaStore>,
    pub sink: Arc<dyn Sink>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<dyn ConfigProvider>,
    pub reporter: Arc<dyn Reporter>,
}

pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    normalizer: Arc<ItemNormalizer>,
    rehomer: ContentRehomer,
    sink: Arc<dyn Sink>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<dyn ConfigProvider>,
    reporter: Arc<dyn Reporter>,
    clock: Clock,
}

/// Shared by all feed harvests of one run.
struct RunContext {
    sessions: SessionRegistry,
    cancel: CancellationToken,
    abort: OnceLock<AbortKind>,
    policy: StopPolicy,
    page_size: u32,
    max_pages: u32,
    gather_content: bool,
}

impl RunContext {
    /// Records the run-wide abort. Returns `true` for the first caller.
    fn abort(&self, kind: AbortKind) -> bool {
        let first = self.abort.set(kind).is_ok();
        self.cancel.cancel();
        first
    }

    fn cancelled(&self) -> Option<AbortKind> {
        if self.cancel.is_cancelled() {
            self.abort.get().copied()
        } else {
            None
        }
    }
}

impl Harvester {
    pub fn new(parts: Collaborators) -> Self {
        Self {
            fetcher: parts.fetcher,
            normalizer: parts.normalizer,
            rehomer: ContentRehomer::new(parts.media),
            sink: parts.sink,
            auth: parts.auth,
            config: parts.config,
            reporter: parts.reporter,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// One harvest pass over `feeds`. Sessions and the abort flag live for this call only.
    pub async fn run(&self, feeds: &[FeedSource]) -> RunReport {
        let started_at = (self.clock)();
        let ctx = RunContext {
            sessions: SessionRegistry::new(self.auth.clone(), self.config.session_scope()),
            cancel: CancellationToken::new(),
            abort: OnceLock::new(),
            policy: StopPolicy::new(
                self.config.cutoff_unix(),
                self.config.max_consecutive_existing(),
            ),
            page_size: self.config.page_size(),
            max_pages: self.config.max_pages_per_feed(),
            gather_content: self.config.gather_content(),
        };
        engine_info!(
            "RunStart feeds={} cutoff_unix={} max_pages={} workers={}",
            feeds.len(),
            ctx.policy.cutoff_unix,
            ctx.max_pages,
            self.config.worker_limit()
        );

        let ctx = &ctx;
        let mut reports: Vec<(usize, FeedReport)> = stream::iter(feeds.iter().enumerate())
            .map(|(index, feed)| async move { (index, self.harvest_feed(ctx, feed).await) })
            .buffer_unordered(self.config.worker_limit().max(1))
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);

        let report = RunReport {
            started_at,
            finished_at: (self.clock)(),
            feeds: reports.into_iter().map(|(_, report)| report).collect(),
            aborted: ctx.abort.get().copied(),
        };
        engine_info!(
            "RunDone feeds={} accepted={} aborted={:?}",
            report.feeds.len(),
            report.total_accepted(),
            report.aborted
        );
        report
    }

    async fn harvest_feed(&self, ctx: &RunContext, feed: &FeedSource) -> FeedReport {
        let mut report = FeedReport::new(feed.id.clone());
        let mut run = FeedRun::new(feed.id.clone(), ctx.page_size, ctx.max_pages);
        let mut inbox = VecDeque::from([FeedMsg::Start]);
        let mut lease: Option<SessionLease> = None;
        let mut pending: Option<FetchedPage> = None;

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(run, msg);
            run = next;
            for effect in effects {
                match effect {
                    FeedEffect::AcquireSession => {
                        if let Some(kind) = ctx.cancelled() {
                            inbox.push_back(FeedMsg::CancelObserved(kind));
                            continue;
                        }
                        match ctx.sessions.ensure_valid(&feed.source_key).await {
                            Ok(acquired) => {
                                lease = Some(acquired);
                                inbox.push_back(FeedMsg::SessionReady);
                            }
                            Err(err) => {
                                engine_warn!("SessionUnavailable feed_id={} error={}", feed.id, err);
                                report.record_failure(FailureKind::SessionInvalid);
                                inbox.push_back(FeedMsg::SessionUnavailable);
                            }
                        }
                    }
                    FeedEffect::FetchPage(cursor) => {
                        let Some(active) = lease.as_ref() else {
                            inbox.push_back(FeedMsg::CancelObserved(AbortKind::SessionInvalid));
                            continue;
                        };
                        if let Some(kind) = ctx.cancelled() {
                            engine_debug!("FeedCancelled feed_id={} page={}", feed.id, cursor.page_index);
                            inbox.push_back(FeedMsg::CancelObserved(kind));
                            continue;
                        }
                        let fetched = self
                            .fetcher
                            .fetch_page(active, &feed.source_key, &cursor, &ctx.cancel)
                            .await;
                        let Some(page) = fetched else {
                            if let Some(kind) = ctx.cancelled() {
                                inbox.push_back(FeedMsg::CancelObserved(kind));
                            }
                            continue;
                        };
                        if page.signal == FetchSignal::SessionInvalid {
                            // No-op when the fetcher already invalidated the scope.
                            active.invalidate().await;
                        }
                        if let Some(failure) = page.failure.as_ref() {
                            report.record_failure(failure.kind);
                        }
                        inbox.push_back(FeedMsg::PageFetched {
                            signal: page.signal,
                        });
                        pending = Some(page);
                    }
                    FeedEffect::EvaluatePage => {
                        let items = pending.take().map(|page| page.items).unwrap_or_default();
                        let (state, verdict) = self
                            .process_page(ctx, feed, run.stop_state(), items, &mut report)
                            .await;
                        inbox.push_back(FeedMsg::PageEvaluated { state, verdict });
                    }
                    FeedEffect::AbortRun(kind) => {
                        if ctx.abort(kind) {
                            engine_warn!("RunAbort feed_id={} reason={}", feed.id, kind);
                            if let Err(err) = self.reporter.run_aborted(kind) {
                                engine_warn!("ReporterFailed hook=run_aborted error={}", err);
                            }
                        }
                    }
                    FeedEffect::Complete(reason) => report.reason = reason,
                }
            }
        }

        report.pages_fetched = run.pages_fetched();
        if report.reason.is_done() {
            if let Err(err) = self.sink.record_sync(&feed.id, (self.clock)()).await {
                engine_warn!("RecordSyncFailed feed_id={} error={}", feed.id, err);
            }
        }
        engine_debug!(
            "FeedDone feed_id={} reason={} pages={} accepted={}",
            feed.id,
            report.reason,
            report.pages_fetched,
            report.accepted
        );
        if let Err(err) = self.reporter.feed_completed(&report) {
            engine_warn!("ReporterFailed hook=feed_completed error={}", err);
        }
        report
    }

    /// Evaluates one newest-first page, handing surviving items to the sink as it goes.
    async fn process_page(
        &self,
        ctx: &RunContext,
        feed: &FeedSource,
        mut state: StopState,
        items: Vec<RawListItem>,
        report: &mut FeedReport,
    ) -> (StopState, PageVerdict) {
        for raw in items {
            if ctx.cancelled().is_some() {
                break;
            }

            let existing = match ArticleId::for_item(&feed.id, &raw) {
                Some(id) => self.lookup(&id).await,
                None => None,
            };
            let facts = ItemFacts {
                published_at_unix: raw.published_at_unix,
                exists_with_body: existing.as_ref().is_some_and(|stored| stored.has_body),
            };
            let observation = ctx.policy.observe(&mut state, &facts);

            if observation.verdict == ItemVerdict::SkipDuplicate {
                report.skipped_duplicates += 1;
                if observation.ends_page {
                    break;
                }
                continue;
            }
            if !observation.should_persist() {
                report.below_cutoff += 1;
                continue;
            }
            self.accept_item(ctx, feed, &raw, existing.as_ref(), report).await;
        }
        (state, ctx.policy.close_page(&state))
    }

    /// Sink lookups that fail are treated as "not stored" so the item gets another chance.
    async fn lookup(&self, id: &ArticleId) -> Option<StoredArticle> {
        match self.sink.lookup(id).await {
            Ok(stored) => stored,
            Err(err) => {
                engine_warn!("SinkLookupFailed id={} error={}", id, err);
                None
            }
        }
    }

    async fn accept_item(
        &self,
        ctx: &RunContext,
        feed: &FeedSource,
        raw: &RawListItem,
        existing: Option<&StoredArticle>,
        report: &mut FeedReport,
    ) {
        let normalized = match self.normalizer.normalize(raw, &feed.id, ctx.gather_content).await {
            Ok(normalized) => normalized,
            Err(err) => {
                engine_warn!("ItemFailed feed_id={} error={}", feed.id, err);
                report.record_failure(FailureKind::ItemFailed);
                return;
            }
        };

        let (mut article, body_missing) = match normalized {
            Normalized::Retracted(id) => {
                report.retracted += 1;
                report.record_failure(FailureKind::ItemRetracted);
                if let Err(err) = self.sink.mark_retracted(&id).await {
                    engine_warn!("MarkRetractedFailed id={} error={}", id, err);
                }
                return;
            }
            Normalized::Article {
                article,
                body_missing,
            } => (article, body_missing),
        };
        if let Some(kind) = body_missing {
            report.record_failure(kind);
        }

        if !article.html_body.is_empty() {
            let rehomed = self.rehomer.rehome(&article.html_body, &feed.id).await;
            article.html_body = rehomed.html;
            report.media_warnings += rehomed.warnings;
            report.record_failures(FailureKind::MediaRehostFailure, rehomed.warnings);
        }
        let cover = self
            .rehomer
            .rehome_cover(&article.cover_url, &feed.id, existing)
            .await;
        article.cover_url = cover.url;
        if cover.warning {
            report.media_warnings += 1;
            report.record_failure(FailureKind::MediaRehostFailure);
        }

        let id = article.id.clone();
        match self.sink.persist(article).await {
            Ok(is_new) => {
                report.accepted += 1;
                if is_new {
                    report.persisted_new += 1;
                } else {
                    report.persisted_existing += 1;
                }
            }
            Err(err) => {
                engine_warn!("PersistFailed id={} error={}", id, err);
                report.record_failure(FailureKind::ItemFailed);
            }
        }
    }
}
