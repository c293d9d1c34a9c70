use std::fmt;

use harvester_core::{FailureKind, FetchSignal, RawListItem};

/// Credential bundle for one upstream session scope.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub token: String,
    /// Cookie header value sent with every listing request.
    pub credential_blob: String,
    pub known_invalid: bool,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, credential_blob: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            credential_blob: credential_blob.into(),
            known_invalid: false,
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("token_len", &self.token.len())
            .field("credential_len", &self.credential_blob.len())
            .field("known_invalid", &self.known_invalid)
            .finish()
    }
}

/// What the sink already knows about an article id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredArticle {
    pub has_body: bool,
    pub cover_url: Option<String>,
}

/// One listing page as classified by the page fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub items: Vec<RawListItem>,
    pub signal: FetchSignal,
    pub failure: Option<PageFailure>,
}

impl FetchedPage {
    pub fn ok(items: Vec<RawListItem>) -> Self {
        Self {
            items,
            signal: FetchSignal::Ok,
            failure: None,
        }
    }

    pub fn end_of_listing() -> Self {
        Self {
            items: Vec::new(),
            signal: FetchSignal::NoMorePages,
            failure: None,
        }
    }

    pub fn failed(signal: FetchSignal, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            signal,
            failure: Some(PageFailure {
                kind,
                detail: detail.into(),
            }),
        }
    }

    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::failed(FetchSignal::RateLimited, FailureKind::RateLimited, detail)
    }

    pub fn session_invalid(detail: impl Into<String>) -> Self {
        Self::failed(FetchSignal::SessionInvalid, FailureKind::SessionInvalid, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::failed(FetchSignal::Malformed, FailureKind::MalformedPage, detail)
    }

    /// Timeouts stay local to the feed: they classify as malformed, attributed as timeouts.
    pub fn timed_out(detail: impl Into<String>) -> Self {
        Self::failed(FetchSignal::Malformed, FailureKind::NetworkTimeout, detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("session invalid for {0}")]
    SessionInvalid(String),
    #[error("no credentials configured for {0}")]
    MissingCredentials(String),
    #[error("auth provider failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected article {id}: {message}")]
    Rejected { id: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },
    #[error("upload failed for {url}: {message}")]
    Upload { url: String, message: String },
    #[error("media store unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reporter failed: {0}")]
pub struct ReportError(pub String);

/// Failure of a secondary content fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("unsupported content type {0}")]
    UnsupportedContentType(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("network error: {0}")]
    Network(String),
}

impl ContentError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ContentError::Timeout(_) => FailureKind::NetworkTimeout,
            _ => FailureKind::ContentUnavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("listing entry has neither an id nor a usable link: {title}")]
    MissingIdentity { title: String },
}
