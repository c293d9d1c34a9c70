use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};

/// Randomized delay applied before every listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: min.min(max),
            max,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        // Keep the rng out of scope before any await point; ThreadRng is !Send.
        let ms = rand::rng().random_range(min_ms..=max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

/// Adds headers to each outgoing listing request.
pub trait RequestDecorator: Send + Sync {
    fn decorate(&self, headers: &mut HeaderMap);
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Fixed browser-like headers.
#[derive(Debug, Clone)]
pub struct BrowserHeaders {
    user_agent: String,
    referer: Option<String>,
}

impl BrowserHeaders {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            referer: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

impl Default for BrowserHeaders {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl RequestDecorator for BrowserHeaders {
    fn decorate(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
        if let Some(referer) = self.referer.as_deref() {
            if let Ok(value) = HeaderValue::from_str(referer) {
                headers.insert(REFERER, value);
            }
        }
    }
}

/// Cycles through a list of user agents, one per request.
#[derive(Debug)]
pub struct RotatingUserAgent {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl RotatingUserAgent {
    pub fn new(agents: Vec<String>) -> Self {
        Self {
            agents,
            next: AtomicUsize::new(0),
        }
    }
}

impl RequestDecorator for RotatingUserAgent {
    fn decorate(&self, headers: &mut HeaderMap) {
        if self.agents.is_empty() {
            return;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        if let Ok(value) = HeaderValue::from_str(&self.agents[index]) {
            headers.insert(USER_AGENT, value);
        }
    }
}
