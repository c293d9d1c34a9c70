use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use harvester_core::{FetchSignal, HarvestCursor};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use tokio_util::sync::CancellationToken;

use crate::pacing::{BrowserHeaders, Pacer, RequestDecorator};
use crate::wire::classify_listing;
use crate::{decode_html, ContentError, FetchedPage, SessionLease};

pub const DEFAULT_UPSTREAM_BASE: &str = "https://mp.weixin.qq.com";
const LISTING_PATH: &str = "/cgi-bin/appmsgpublish";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, ContentError> {
    let redirect_limit = settings.redirect_limit;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        let count = attempt.previous().len();
        if count >= redirect_limit {
            attempt.error("redirect limit exceeded")
        } else {
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(policy)
        .build()
        .map_err(|err| ContentError::Network(err.to_string()))
}

/// Reads a response body, refusing anything over `max_bytes`.
async fn read_capped(response: reqwest::Response, max_bytes: u64) -> Result<Vec<u8>, ContentError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(ContentError::TooLarge {
                max_bytes,
                actual: Some(content_len),
            });
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(ContentError::TooLarge {
                max_bytes,
                actual: Some(next_len),
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn map_reqwest_error(err: reqwest::Error) -> ContentError {
    if err.is_timeout() {
        return ContentError::Timeout(err.to_string());
    }
    ContentError::Network(err.to_string())
}

/// Issues one listing request and classifies the answer.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// `None` when `cancel` fired before the request went out.
    async fn fetch_page(
        &self,
        lease: &SessionLease,
        source_key: &str,
        cursor: &HarvestCursor,
        cancel: &CancellationToken,
    ) -> Option<FetchedPage>;
}

/// Page fetcher for the `appmsgpublish` listing endpoint.
pub struct MpPageFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
    pacer: Pacer,
    decorator: Arc<dyn RequestDecorator>,
}

impl MpPageFetcher {
    pub fn new(settings: FetchSettings, pacer: Pacer) -> Result<Self, ContentError> {
        let client = build_client(&settings)?;
        let referer = settings.base_url.clone();
        Ok(Self {
            client,
            settings,
            pacer,
            decorator: Arc::new(BrowserHeaders::default().with_referer(referer)),
        })
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    fn listing_url(&self) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), LISTING_PATH)
    }

    async fn request(
        &self,
        lease: &SessionLease,
        source_key: &str,
        cursor: &HarvestCursor,
    ) -> Result<Vec<u8>, ContentError> {
        let mut headers = HeaderMap::new();
        self.decorator.decorate(&mut headers);
        let cookie = HeaderValue::from_str(&lease.context().credential_blob)
            .map_err(|err| ContentError::Network(format!("invalid cookie header: {err}")))?;
        headers.insert(COOKIE, cookie);

        let begin = cursor.begin().to_string();
        let count = cursor.page_size.to_string();
        let query = [
            ("sub", "list"),
            ("sub_action", "list_ex"),
            ("begin", begin.as_str()),
            ("count", count.as_str()),
            ("fakeid", source_key),
            ("token", lease.context().token.as_str()),
            ("lang", "zh_CN"),
            ("f", "json"),
            ("ajax", "1"),
        ];

        let response = self
            .client
            .get(self.listing_url())
            .headers(headers)
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::HttpStatus(status.as_u16()));
        }
        read_capped(response, self.settings.max_bytes).await
    }
}

#[async_trait::async_trait]
impl PageFetcher for MpPageFetcher {
    async fn fetch_page(
        &self,
        lease: &SessionLease,
        source_key: &str,
        cursor: &HarvestCursor,
        cancel: &CancellationToken,
    ) -> Option<FetchedPage> {
        if !lease.is_valid().await {
            return Some(FetchedPage::session_invalid(
                "session invalidated earlier in this run",
            ));
        }

        let delay = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            delay = self.pacer.pause() => Some(delay),
        };
        let Some(delay) = delay.filter(|_| !cancel.is_cancelled()) else {
            engine_debug!(
                "PageFetchCancelled feed_id={} page={}",
                cursor.feed_id,
                cursor.page_index
            );
            return None;
        };
        engine_debug!(
            "PageFetchStart feed_id={} page={} begin={} delay_ms={}",
            cursor.feed_id,
            cursor.page_index,
            cursor.begin(),
            delay.as_millis()
        );

        let page = match self.request(lease, source_key, cursor).await {
            Ok(body) => classify_listing(&body),
            Err(ContentError::Timeout(detail)) => FetchedPage::timed_out(detail),
            Err(err) => FetchedPage::malformed(err.to_string()),
        };

        match page.signal {
            FetchSignal::SessionInvalid => {
                lease.invalidate().await;
            }
            FetchSignal::Malformed => {
                let detail = page.failure.as_ref().map(|f| f.detail.as_str()).unwrap_or("");
                engine_warn!(
                    "PageMalformed feed_id={} page={} detail={}",
                    cursor.feed_id,
                    cursor.page_index,
                    detail
                );
            }
            _ => {}
        }

        engine_debug!(
            "PageFetchDone feed_id={} page={} signal={:?} items={}",
            cursor.feed_id,
            cursor.page_index,
            page.signal,
            page.items.len()
        );
        Some(page)
    }
}

/// Secondary fetch of an article's full body.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_content(&self, url: &str) -> Result<String, ContentError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestContentFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestContentFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, ContentError> {
        let client = build_client(&settings)?;
        Ok(Self { client, settings })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

#[async_trait::async_trait]
impl ContentFetcher for ReqwestContentFetcher {
    async fn fetch_content(&self, url: &str) -> Result<String, ContentError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|err| ContentError::InvalidUrl(err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(ContentError::UnsupportedContentType(ct.to_string()));
            }
        }

        let bytes = read_capped(response, self.settings.max_bytes).await?;
        let decoded = decode_html(&bytes, content_type.as_deref())
            .map_err(|err| ContentError::Decode(err.to_string()))?;
        Ok(decoded.html)
    }
}
