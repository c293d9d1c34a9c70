use std::fmt;

use url::Url;

pub type FeedId = String;

/// Prefix the upstream platform puts on account ids; never part of article ids.
const PLATFORM_ID_PREFIX: &str = "MP_WXS_";

/// Timestamps above this are milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Deterministic article identity: the same `(feed, external id)` always yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn derive(feed_id: &str, external_id: &str) -> Self {
        let raw = format!("{feed_id}-{external_id}");
        Self(raw.replace(PLATFORM_ID_PREFIX, ""))
    }

    /// Id for a listing entry; falls back to the `/s/<slug>` segment of the link
    /// when the listing carries no external id.
    pub fn for_item(feed_id: &str, item: &RawListItem) -> Option<Self> {
        let external = item.external_id.trim();
        if !external.is_empty() {
            return Some(Self::derive(feed_id, external));
        }
        link_slug(&item.link).map(|slug| Self::derive(feed_id, &slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub id: FeedId,
    pub display_name: String,
    /// Opaque upstream account key (`fakeid` on the listing API).
    pub source_key: String,
    pub last_sync_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestCursor {
    pub feed_id: FeedId,
    pub page_index: u32,
    pub page_size: u32,
}

impl HarvestCursor {
    pub fn first(feed_id: impl Into<FeedId>, page_size: u32) -> Self {
        Self {
            feed_id: feed_id.into(),
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    /// Offset of the first entry on this page.
    pub fn begin(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn next(&self) -> Self {
        Self {
            feed_id: self.feed_id.clone(),
            page_index: self.page_index + 1,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListItem {
    pub external_id: String,
    pub title: String,
    pub link: String,
    pub cover_url: String,
    pub published_at_unix: i64,
    /// Where the full body lives; fetched only when enrichment is enabled.
    pub raw_body_ref: String,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalArticle {
    pub id: ArticleId,
    pub feed_id: FeedId,
    pub title: String,
    pub url: String,
    pub cover_url: String,
    pub html_body: String,
    pub published_at_unix: i64,
    pub description: Option<String>,
}

/// Upstream status of one listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchSignal {
    Ok,
    NoMorePages,
    RateLimited,
    SessionInvalid,
    Malformed,
}

/// Seconds since epoch, accepting millisecond inputs.
pub fn normalize_timestamp(raw: i64) -> i64 {
    if raw > MILLIS_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

/// `https://host/s/<slug>?..` -> `<slug>`
pub fn link_slug(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "s" {
            return segments
                .next()
                .filter(|slug| !slug.is_empty())
                .map(ToOwned::to_owned);
        }
    }
    None
}
