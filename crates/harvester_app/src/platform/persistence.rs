use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use engine_logging::{engine_info, engine_warn};
use harvester_core::{ArticleId, CanonicalArticle};
use harvester_engine::{
    build_markdown_document, ensure_output_dir, AtomicFileWriter, PersistError, Sink, SinkError,
    StoredArticle,
};
use serde::{Deserialize, Serialize};

const STATE_FILENAME: &str = ".harvester_state.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleRecord {
    id: String,
    feed_id: String,
    title: String,
    url: String,
    cover_url: String,
    html_body: String,
    published_at_unix: i64,
    description: Option<String>,
    #[serde(default)]
    retracted: bool,
}

impl From<&CanonicalArticle> for ArticleRecord {
    fn from(article: &CanonicalArticle) -> Self {
        Self {
            id: article.id.to_string(),
            feed_id: article.feed_id.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            cover_url: article.cover_url.clone(),
            html_body: article.html_body.clone(),
            published_at_unix: article.published_at_unix,
            description: article.description.clone(),
            retracted: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    last_sync: BTreeMap<String, i64>,
    retracted: BTreeSet<String>,
}

/// Sink writing `articles/{id}.json` plus a Markdown sidecar, with sync times in a RON state file.
pub struct FsSink {
    writer: AtomicFileWriter,
    state: Mutex<PersistedState>,
}

fn unavailable(err: impl std::fmt::Display) -> SinkError {
    SinkError::Unavailable(err.to_string())
}

/// File stem for an article id; anything outside `[A-Za-z0-9_-]` becomes `_`.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl FsSink {
    pub fn open(output_dir: &Path) -> Result<Self, PersistError> {
        ensure_output_dir(output_dir)?;
        let writer = AtomicFileWriter::new(output_dir.to_path_buf());
        let state = match writer.read(STATE_FILENAME)? {
            Some(content) => match ron::from_str(&content) {
                Ok(state) => state,
                Err(err) => {
                    engine_warn!("Failed to parse persisted state {}: {}", STATE_FILENAME, err);
                    PersistedState::default()
                }
            },
            None => PersistedState::default(),
        };
        Ok(Self {
            writer,
            state: Mutex::new(state),
        })
    }

    pub fn last_sync(&self, feed_id: &str) -> Option<i64> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.last_sync.get(feed_id).copied())
    }

    fn json_path(id: &str) -> String {
        format!("articles/{}.json", file_stem(id))
    }

    fn markdown_path(id: &str) -> String {
        format!("articles/{}.md", file_stem(id))
    }

    fn read_record(&self, id: &str) -> Result<Option<ArticleRecord>, SinkError> {
        let Some(content) = self.writer.read(&Self::json_path(id)).map_err(unavailable)? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| SinkError::Rejected {
                id: id.to_string(),
                message: err.to_string(),
            })
    }

    fn write_record(&self, record: &ArticleRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(record).map_err(|err| SinkError::Rejected {
            id: record.id.clone(),
            message: err.to_string(),
        })?;
        self.writer
            .write(&Self::json_path(&record.id), &json)
            .map_err(unavailable)?;
        Ok(())
    }

    fn save_state(&self, state: &PersistedState) -> Result<(), SinkError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(state, pretty).map_err(unavailable)?;
        self.writer.write(STATE_FILENAME, &content).map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl Sink for FsSink {
    async fn lookup(&self, id: &ArticleId) -> Result<Option<StoredArticle>, SinkError> {
        Ok(self.read_record(id.as_str())?.map(|record| StoredArticle {
            has_body: !record.html_body.trim().is_empty(),
            cover_url: Some(record.cover_url).filter(|url| !url.is_empty()),
        }))
    }

    async fn persist(&self, article: CanonicalArticle) -> Result<bool, SinkError> {
        let is_new = self.read_record(article.id.as_str())?.is_none();
        self.write_record(&ArticleRecord::from(&article))?;
        self.writer
            .write(
                &Self::markdown_path(article.id.as_str()),
                &build_markdown_document(&article),
            )
            .map_err(unavailable)?;
        Ok(is_new)
    }

    async fn mark_retracted(&self, id: &ArticleId) -> Result<(), SinkError> {
        if let Some(mut record) = self.read_record(id.as_str())? {
            record.retracted = true;
            self.write_record(&record)?;
        }
        let mut state = self.state.lock().map_err(unavailable)?;
        state.retracted.insert(id.to_string());
        self.save_state(&state)?;
        engine_info!("ArticleRetracted id={}", id);
        Ok(())
    }

    async fn record_sync(&self, feed_id: &str, at_unix: i64) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(unavailable)?;
        state.last_sync.insert(feed_id.to_string(), at_unix);
        self.save_state(&state)
    }
}
