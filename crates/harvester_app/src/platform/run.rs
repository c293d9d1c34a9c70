use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use harvester_core::{FeedSource, RunReport};
use harvester_engine::{
    Collaborators, ConfigProvider, FetchSettings, Harvester, ItemNormalizer, LogReporter,
    MpPageFetcher, Pacer, ReqwestContentFetcher, SessionContext, StaticCredentials,
};

use super::{AppConfig, FsMediaStore, FsSink};

/// Wires file-backed collaborators around the engine and runs one pass.
pub async fn run_harvest(config: AppConfig, output: &Path) -> anyhow::Result<RunReport> {
    let settings = config.settings.clone();
    let sink = Arc::new(
        FsSink::open(output).with_context(|| format!("opening output {}", output.display()))?,
    );
    let media = Arc::new(FsMediaStore::new(
        &output.join("media"),
        config.media_base_url.clone(),
        settings.request_timeout(),
    )?);

    let fetch_settings = FetchSettings {
        base_url: config.upstream_base.clone(),
        connect_timeout: settings.connect_timeout(),
        request_timeout: settings.request_timeout(),
        ..FetchSettings::default()
    };
    let (min_delay, max_delay) = settings.pacing_jitter_range();
    let fetcher = MpPageFetcher::new(fetch_settings.clone(), Pacer::new(min_delay, max_delay))?;
    let normalizer = if settings.gather_content {
        ItemNormalizer::with_content(Arc::new(ReqwestContentFetcher::new(fetch_settings)?))
    } else {
        ItemNormalizer::listing_only()
    };

    let auth = if config.credentials.token.is_empty() {
        engine_warn!("No session token configured; every feed will abort");
        StaticCredentials::missing()
    } else {
        StaticCredentials::new(SessionContext::new(
            config.credentials.token.clone(),
            config.credentials.cookie.clone(),
        ))
    };

    let feeds: Vec<FeedSource> = config
        .feeds
        .iter()
        .map(|feed| feed.to_source(sink.last_sync(&feed.id)))
        .collect();
    engine_info!(
        "Harvest output={} feeds={} max_pages={}",
        output.display(),
        feeds.len(),
        settings.max_pages_per_feed()
    );

    let harvester = Harvester::new(Collaborators {
        fetcher: Arc::new(fetcher),
        normalizer: Arc::new(normalizer),
        media,
        sink,
        auth: Arc::new(auth),
        config: Arc::new(settings),
        reporter: Arc::new(LogReporter),
    });
    Ok(harvester.run(&feeds).await)
}

/// A header line, one line per feed, then the run outcome.
pub fn summary(report: &RunReport) -> String {
    let mut out = String::new();
    let finished = chrono::DateTime::from_timestamp(report.finished_at, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| report.finished_at.to_string());
    let _ = writeln!(
        out,
        "harvest finished {} after {}s",
        finished,
        report.finished_at.saturating_sub(report.started_at)
    );
    for feed in &report.feeds {
        let _ = write!(
            out,
            "{:<20} {:<22} pages={:<3} accepted={:<4} new={:<4} duplicates={:<3} retracted={}",
            feed.feed_id,
            feed.reason.as_str(),
            feed.pages_fetched,
            feed.accepted,
            feed.persisted_new,
            feed.skipped_duplicates,
            feed.retracted
        );
        if !feed.failures.is_empty() {
            let failures: Vec<String> = feed
                .failures
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            let _ = write!(out, " failures[{}]", failures.join(","));
        }
        out.push('\n');
    }
    match report.aborted {
        Some(reason) => {
            let _ = write!(out, "run aborted: {reason}");
        }
        None => {
            let _ = write!(out, "run complete: {} accepted", report.total_accepted());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::{AbortKind, FailureKind, FeedReport, TerminalReason};

    #[test]
    fn summary_lists_failures_and_abort() {
        let mut feed = FeedReport::new("tech");
        feed.reason = TerminalReason::RateLimited;
        feed.record_failure(FailureKind::RateLimited);
        let report = RunReport {
            started_at: 0,
            finished_at: 1,
            feeds: vec![feed],
            aborted: Some(AbortKind::RateLimited),
        };
        let text = summary(&report);
        assert!(text.starts_with("harvest finished 1970-01-01T00:00:01+00:00 after 1s\n"));
        assert!(text.contains("ABORTED_RATE_LIMIT"));
        assert!(text.contains("failures[RATE_LIMITED=1]"));
        assert!(text.ends_with("run aborted: RATE_LIMITED"));
    }

    #[tokio::test]
    async fn missing_token_aborts_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = super::super::config::parse_config(
            r#"(
                settings: (cutoff_date: "2024-03-01", pacing_jitter_ms: (0, 0)),
                feeds: [(id: "tech", source_key: "MzA5")],
                upstream_base: "http://127.0.0.1:9",
            )"#,
        )
        .unwrap();

        let report = run_harvest(config, dir.path()).await.unwrap();
        assert_eq!(report.aborted, Some(AbortKind::SessionInvalid));
        assert_eq!(report.feeds[0].reason, TerminalReason::SessionInvalid);
        assert_eq!(report.feeds[0].pages_fetched, 0);
    }
}
