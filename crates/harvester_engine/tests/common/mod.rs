#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use harvester_core::{
    AbortKind, ArticleId, CanonicalArticle, FeedReport, FeedSource, FetchSignal, HarvestCursor,
    RawListItem,
};
use harvester_engine::{
    media_object_name, AuthError, AuthProvider, Collaborators, ConfigProvider, ContentError,
    ContentFetcher, FetchedPage, HarvestSettings, Harvester, ItemNormalizer, MediaError,
    MediaStore, PageFetcher, ReportError, Reporter, SessionContext, SessionLease, Sink, SinkError,
    StoredArticle,
};
use tokio_util::sync::CancellationToken;

pub const CUTOFF: &str = "2024-03-08";
pub const CDN: &str = "https://cdn.local/";

pub fn cutoff_date() -> NaiveDate {
    NaiveDate::parse_from_str(CUTOFF, "%Y-%m-%d").unwrap()
}

pub fn settings() -> HarvestSettings {
    HarvestSettings {
        max_pages_per_feed: Some(10),
        page_size: 4,
        pacing_jitter_ms: (0, 0),
        today: Some(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()),
        ..HarvestSettings::with_cutoff(cutoff_date())
    }
}

pub fn cutoff_unix() -> i64 {
    settings().cutoff_unix()
}

pub fn feed(id: &str) -> FeedSource {
    FeedSource {
        id: id.to_string(),
        display_name: format!("Feed {id}"),
        source_key: format!("key-{id}"),
        last_sync_at: None,
    }
}

/// Item `n` of a feed; `in_window` decides which side of the cutoff it lands on.
pub fn item(n: u32, in_window: bool) -> RawListItem {
    let offset = i64::from(n) * 60;
    let published = if in_window {
        cutoff_unix() + 86_400 - offset
    } else {
        cutoff_unix() - offset
    };
    RawListItem {
        external_id: format!("{n}"),
        title: format!("Article {n}"),
        link: format!("https://mp.example/s/item{n}"),
        cover_url: format!("https://img.example/cover{n}.jpg"),
        published_at_unix: published,
        raw_body_ref: format!("https://mp.example/s/item{n}"),
        digest: Some(format!("digest {n}")),
    }
}

/// Twelve items newest first: 1..=8 inside the window, 9..=12 below the cutoff.
pub fn scenario_a_pages(page_size: usize) -> Vec<FetchedPage> {
    let items: Vec<_> = (1..=12).map(|n| item(n, n <= 8)).collect();
    items
        .chunks(page_size)
        .map(|chunk| FetchedPage::ok(chunk.to_vec()))
        .collect()
}

#[derive(Default)]
pub struct CountingAuth {
    pub ensure_calls: AtomicUsize,
    pub invalidated: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthProvider for CountingAuth {
    async fn ensure_valid(&self, _source_key: &str) -> Result<SessionContext, AuthError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SessionContext::new("token-1", "slave_sid=abc"))
    }

    async fn invalidate(&self, source_key: &str) {
        self.invalidated.lock().unwrap().push(source_key.to_string());
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub articles: Mutex<HashMap<ArticleId, CanonicalArticle>>,
    pub lookups: Mutex<Vec<ArticleId>>,
    pub persisted: Mutex<Vec<(ArticleId, bool)>>,
    pub retracted: Mutex<Vec<ArticleId>>,
    pub syncs: Mutex<Vec<(String, i64)>>,
}

impl MemorySink {
    pub fn insert(&self, article: CanonicalArticle) {
        self.articles.lock().unwrap().insert(article.id.clone(), article);
    }

    pub fn persisted_ids(&self) -> Vec<String> {
        self.persisted
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn lookup(&self, id: &ArticleId) -> Result<Option<StoredArticle>, SinkError> {
        self.lookups.lock().unwrap().push(id.clone());
        Ok(self.articles.lock().unwrap().get(id).map(|a| StoredArticle {
            has_body: !a.html_body.trim().is_empty(),
            cover_url: Some(a.cover_url.clone()).filter(|c| !c.is_empty()),
        }))
    }

    async fn persist(&self, article: CanonicalArticle) -> Result<bool, SinkError> {
        let id = article.id.clone();
        let is_new = self
            .articles
            .lock()
            .unwrap()
            .insert(id.clone(), article)
            .is_none();
        self.persisted.lock().unwrap().push((id, is_new));
        Ok(is_new)
    }

    async fn mark_retracted(&self, id: &ArticleId) -> Result<(), SinkError> {
        self.retracted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn record_sync(&self, feed_id: &str, at_unix: i64) -> Result<(), SinkError> {
        self.syncs.lock().unwrap().push((feed_id.to_string(), at_unix));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMedia {
    pub failing: Vec<String>,
    pub uploads: Mutex<Vec<String>>,
}

impl MemoryMedia {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn rehost(&self, external_url: &str, scope_key: &str) -> Result<String, MediaError> {
        self.uploads.lock().unwrap().push(external_url.to_string());
        if self.failing.iter().any(|u| u == external_url) {
            return Err(MediaError::Download {
                url: external_url.to_string(),
                message: "404".into(),
            });
        }
        Ok(format!("{CDN}{}", media_object_name(scope_key, external_url)))
    }

    fn is_durable(&self, url: &str) -> bool {
        url.starts_with(CDN)
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub completed: Mutex<Vec<FeedReport>>,
    pub aborted: Mutex<Vec<AbortKind>>,
    pub fail: bool,
}

impl Reporter for RecordingReporter {
    fn feed_completed(&self, report: &FeedReport) -> Result<(), ReportError> {
        self.completed.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(ReportError("webhook down".into()));
        }
        Ok(())
    }

    fn run_aborted(&self, reason: AbortKind) -> Result<(), ReportError> {
        self.aborted.lock().unwrap().push(reason);
        if self.fail {
            return Err(ReportError("webhook down".into()));
        }
        Ok(())
    }
}

/// Serves canned pages per source key and logs every request it starts.
#[derive(Default)]
pub struct ScriptedFetcher {
    pub pages: HashMap<String, Vec<FetchedPage>>,
    pub delays: HashMap<String, Duration>,
    pub log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn with_feed(mut self, source_key: &str, pages: Vec<FetchedPage>) -> Self {
        self.pages.insert(source_key.to_string(), pages);
        self
    }

    pub fn with_delay(mut self, source_key: &str, delay: Duration) -> Self {
        self.delays.insert(source_key.to_string(), delay);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_for(&self, source_key: &str) -> usize {
        let prefix = format!("fetch {source_key} ");
        self.log().iter().filter(|l| l.starts_with(&prefix)).count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        lease: &SessionLease,
        source_key: &str,
        cursor: &HarvestCursor,
        cancel: &CancellationToken,
    ) -> Option<FetchedPage> {
        if cancel.is_cancelled() {
            return None;
        }
        if !lease.is_valid().await {
            self.log.lock().unwrap().push(format!("refused {source_key}"));
            return Some(FetchedPage::session_invalid("invalid lease"));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("fetch {source_key} {}", cursor.page_index));
        if let Some(delay) = self.delays.get(source_key) {
            tokio::time::sleep(*delay).await;
        }
        let page = self
            .pages
            .get(source_key)
            .and_then(|pages| pages.get(cursor.page_index as usize))
            .cloned()
            .unwrap_or_else(FetchedPage::end_of_listing);
        if page.signal == FetchSignal::SessionInvalid {
            lease.invalidate().await;
        }
        if page.signal != FetchSignal::Ok {
            self.log
                .lock()
                .unwrap()
                .push(format!("signal {source_key} {:?}", page.signal));
        }
        Some(page)
    }
}

/// Article pages keyed by url; unknown urls fail like an unreachable host.
#[derive(Default)]
pub struct CannedContent {
    pub pages: HashMap<String, String>,
}

impl CannedContent {
    pub fn article_body(n: u32) -> String {
        format!(
            "<html><body><div id=\"js_content\" style=\"visibility: hidden;\"><p data-pm-slice=\"x\">Body {n}</p><img data-src=\"https://img.example/body{n}.png\" style=\"width: 677px\"></div></body></html>"
        )
    }

    pub fn for_items(range: std::ops::RangeInclusive<u32>) -> Self {
        let pages = range
            .map(|n| (format!("https://mp.example/s/item{n}"), Self::article_body(n)))
            .collect();
        Self { pages }
    }
}

#[async_trait]
impl ContentFetcher for CannedContent {
    async fn fetch_content(&self, url: &str) -> Result<String, ContentError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ContentError::Network(format!("unreachable {url}")))
    }
}

pub struct Fixture {
    pub fetcher: Arc<ScriptedFetcher>,
    pub sink: Arc<MemorySink>,
    pub media: Arc<MemoryMedia>,
    pub auth: Arc<CountingAuth>,
    pub reporter: Arc<RecordingReporter>,
    pub settings: HarvestSettings,
    pub content: Option<Arc<CannedContent>>,
}

impl Fixture {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink: Arc::new(MemorySink::default()),
            media: Arc::new(MemoryMedia::default()),
            auth: Arc::new(CountingAuth::default()),
            reporter: Arc::new(RecordingReporter::default()),
            settings: settings(),
            content: None,
        }
    }

    pub fn harvester(&self) -> Harvester {
        self.harvester_with(self.fetcher.clone())
    }

    pub fn harvester_with(&self, fetcher: Arc<dyn PageFetcher>) -> Harvester {
        let normalizer = match self.content.clone() {
            Some(content) => ItemNormalizer::with_content(content),
            None => ItemNormalizer::listing_only(),
        };
        Harvester::new(Collaborators {
            fetcher,
            normalizer: Arc::new(normalizer),
            media: self.media.clone(),
            sink: self.sink.clone(),
            auth: self.auth.clone(),
            config: Arc::new(self.settings.clone()),
            reporter: self.reporter.clone(),
        })
        .with_clock(Arc::new(|| 1_710_000_000))
    }
}
