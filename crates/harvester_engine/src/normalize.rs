use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::{ArticleId, CanonicalArticle, FailureKind, RawListItem};

use crate::clean::HtmlCleaner;
use crate::extract::{ArticleBodyExtractor, ExtractedBody, Extractor};
use crate::{ContentFetcher, NormalizeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Article {
        article: CanonicalArticle,
        /// Set when enrichment was requested but no body could be obtained.
        body_missing: Option<FailureKind>,
    },
    /// The publisher removed the item upstream.
    Retracted(ArticleId),
}

/// Turns listing entries into canonical articles. Performs no persistence.
pub struct ItemNormalizer {
    content: Option<Arc<dyn ContentFetcher>>,
    extractor: Box<dyn Extractor>,
    cleaner: HtmlCleaner,
}

impl ItemNormalizer {
    /// Normalizer that never fetches bodies.
    pub fn listing_only() -> Self {
        Self {
            content: None,
            extractor: Box::new(ArticleBodyExtractor),
            cleaner: HtmlCleaner,
        }
    }

    pub fn with_content(content: Arc<dyn ContentFetcher>) -> Self {
        Self {
            content: Some(content),
            ..Self::listing_only()
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn normalize(
        &self,
        raw: &RawListItem,
        feed_id: &str,
        gather_content: bool,
    ) -> Result<Normalized, NormalizeError> {
        let id = ArticleId::for_item(feed_id, raw).ok_or_else(|| NormalizeError::MissingIdentity {
            title: raw.title.clone(),
        })?;

        let mut body_missing = None;
        let mut html_body = String::new();
        if gather_content {
            match self.fetch_body(&id, raw).await {
                BodyResult::Body(body) => html_body = body,
                BodyResult::Retracted => return Ok(Normalized::Retracted(id)),
                BodyResult::Missing(kind) => body_missing = Some(kind),
            }
        }

        let description = raw.digest.clone().filter(|digest| !digest.trim().is_empty());
        Ok(Normalized::Article {
            article: CanonicalArticle {
                id,
                feed_id: feed_id.to_string(),
                title: raw.title.trim().to_string(),
                url: raw.link.clone(),
                cover_url: raw.cover_url.clone(),
                html_body,
                published_at_unix: raw.published_at_unix,
                description,
            },
            body_missing,
        })
    }

    async fn fetch_body(&self, id: &ArticleId, raw: &RawListItem) -> BodyResult {
        let Some(content) = self.content.as_ref() else {
            return BodyResult::Missing(FailureKind::ContentUnavailable);
        };
        let source = if raw.raw_body_ref.is_empty() {
            raw.link.as_str()
        } else {
            raw.raw_body_ref.as_str()
        };

        let page = match content.fetch_content(source).await {
            Ok(page) => page,
            Err(err) => {
                engine_warn!("ContentFetchFailed id={} url={} error={}", id, source, err);
                return BodyResult::Missing(err.failure_kind());
            }
        };

        match self.extractor.extract(&page) {
            ExtractedBody::Content(body) => {
                let cleaned = self.cleaner.clean(&body);
                engine_debug!("ContentFetched id={} bytes={}", id, cleaned.len());
                BodyResult::Body(cleaned)
            }
            ExtractedBody::Retracted => {
                engine_debug!("ContentRetracted id={}", id);
                BodyResult::Retracted
            }
            ExtractedBody::VerificationWall => {
                engine_warn!("ContentVerificationWall id={} url={}", id, source);
                BodyResult::Missing(FailureKind::ContentUnavailable)
            }
        }
    }
}

enum BodyResult {
    Body(String),
    Retracted,
    Missing(FailureKind),
}
