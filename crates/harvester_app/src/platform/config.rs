use std::fs;
use std::path::Path;

use anyhow::Context;
use harvester_core::FeedSource;
use harvester_engine::{HarvestSettings, DEFAULT_UPSTREAM_BASE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Upstream account key (`fakeid`).
    pub source_key: String,
}

impl FeedConfig {
    pub fn to_source(&self, last_sync_at: Option<i64>) -> FeedSource {
        FeedSource {
            id: self.id.clone(),
            display_name: if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            source_key: self.source_key.clone(),
            last_sync_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub cookie: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub settings: HarvestSettings,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default = "default_upstream_base")]
    pub upstream_base: String,
    /// Prefix of rehosted media urls; a `file://` url under the output directory when absent.
    #[serde(default)]
    pub media_base_url: Option<String>,
}

fn default_upstream_base() -> String {
    DEFAULT_UPSTREAM_BASE.to_string()
}

impl AppConfig {
    /// Command-line and environment credentials win over the file.
    pub fn override_credentials(&mut self, token: Option<String>, cookie: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.credentials.token = token;
        }
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            self.credentials.cookie = cookie;
        }
    }
}

pub fn parse_config(text: &str) -> Result<AppConfig, ron::error::SpannedError> {
    ron::from_str(text)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config =
        parse_config(&text).with_context(|| format!("parsing config {}", path.display()))?;
    config
        .settings
        .validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_engine::SessionScope;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"(
        settings: (
            cutoff_date: "2024-03-01",
            max_consecutive_existing: 5,
            pacing_jitter_ms: (1000, 3000),
            gather_content: true,
            session_scope: PerFeed,
        ),
        feeds: [
            (id: "tech", name: "Tech Daily", source_key: "MzA5MjAx"),
            (id: "misc", source_key: "MzI1NjQ4"),
        ],
        credentials: (token: "123456"),
    )"#;

    #[test]
    fn sample_config_parses_with_defaults() {
        let config = parse_config(SAMPLE).expect("parse");
        assert_eq!(config.settings.max_consecutive_existing, 5);
        assert_eq!(config.settings.pacing_jitter_ms, (1000, 3000));
        assert_eq!(config.settings.page_size, 5);
        assert_eq!(config.settings.session_scope, SessionScope::PerFeed);
        assert!(config.settings.gather_content);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.credentials.token, "123456");
        assert_eq!(config.credentials.cookie, "");
        assert_eq!(config.upstream_base, DEFAULT_UPSTREAM_BASE);
        assert_eq!(config.feeds[1].to_source(None).display_name, "misc");
    }

    #[test]
    fn environment_credentials_override_file() {
        let mut config = parse_config(SAMPLE).expect("parse");
        config.override_credentials(Some("from-env".into()), Some(String::new()));
        assert_eq!(config.credentials.token, "from-env");
        assert_eq!(config.credentials.cookie, "");
    }

    #[test]
    fn invalid_settings_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        fs::write(
            &path,
            r#"(settings: (cutoff_date: "2024-03-01", pacing_jitter_ms: (10, 1)))"#,
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_cutoff_date_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_cutoff.ron");
        fs::write(&path, r#"(settings: (page_size: 4), feeds: [])"#).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("cutoff_date"));
    }

    #[test]
    fn demo_config_parses() {
        let config = parse_config(include_str!("../../../../demos/harvest.ron")).expect("parse");
        assert!(config.settings.validate().is_ok());
        assert_eq!(config.settings.utc_offset_minutes, 480);
        assert_eq!(config.feeds[0].to_source(None).display_name, "Tech Weekly");
    }
}
