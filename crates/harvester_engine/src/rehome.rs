use std::collections::HashMap;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};

use crate::clean::{image_sources, rewrite_image_sources};
use crate::{MediaStore, StoredArticle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehomeOutcome {
    pub html: String,
    pub rehosted: usize,
    /// Media references left pointing at their original host.
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverOutcome {
    pub url: String,
    pub rehosted: bool,
    pub warning: bool,
}

/// Copies external media into the [`MediaStore`] and rewrites references.
#[derive(Clone)]
pub struct ContentRehomer {
    store: Arc<dyn MediaStore>,
}

impl ContentRehomer {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    /// A failed reference keeps its original url and counts as a warning.
    /// References are matched by exact attribute value, never by substring.
    pub async fn rehome(&self, html: &str, scope_key: &str) -> RehomeOutcome {
        let mut replacements = HashMap::new();
        let mut warnings = 0;
        for source in image_sources(html) {
            if self.store.is_durable(&source) {
                continue;
            }
            match self.store.rehost(&source, scope_key).await {
                Ok(durable) => {
                    replacements.insert(source, durable);
                }
                Err(err) => {
                    engine_warn!("MediaRehostFailed scope={} url={} error={}", scope_key, source, err);
                    warnings += 1;
                }
            }
        }

        let outcome = if replacements.is_empty() {
            RehomeOutcome {
                html: html.to_string(),
                rehosted: 0,
                warnings,
            }
        } else {
            let rewritten = rewrite_image_sources(html, &replacements);
            RehomeOutcome {
                html: rewritten.html,
                rehosted: rewritten.applied.len(),
                warnings,
            }
        };
        engine_debug!(
            "RehomeDone scope={} rehosted={} warnings={}",
            scope_key,
            outcome.rehosted,
            outcome.warnings
        );
        outcome
    }

    /// Reuses an existing durable cover instead of uploading it again.
    pub async fn rehome_cover(
        &self,
        cover_url: &str,
        scope_key: &str,
        existing: Option<&StoredArticle>,
    ) -> CoverOutcome {
        let kept = |url: &str, warning: bool| CoverOutcome {
            url: url.to_string(),
            rehosted: false,
            warning,
        };

        if let Some(durable) = existing
            .and_then(|stored| stored.cover_url.as_deref())
            .filter(|url| self.store.is_durable(url))
        {
            return kept(durable, false);
        }
        let cover_url = cover_url.trim();
        if cover_url.is_empty() || self.store.is_durable(cover_url) {
            return kept(cover_url, false);
        }

        match self.store.rehost(cover_url, scope_key).await {
            Ok(durable) => CoverOutcome {
                url: durable,
                rehosted: true,
                warning: false,
            },
            Err(err) => {
                engine_warn!("CoverRehostFailed scope={} url={} error={}", scope_key, cover_url, err);
                kept(cover_url, true)
            }
        }
    }
}
