//! Crawler classifier boundary.
//!
//! Given request metadata, answer "is this an automated agent?". Detected
//! crawlers are never persisted; the engine suppresses the write and
//! reports it through `record`'s boolean return, not as an error.

use tracing::debug;

/// Signatures matched case-insensitively against the user-agent string.
/// Covers the common bot families; extend per deployment via
/// [`UserAgentDetector::with_signatures`].
const DEFAULT_SIGNATURES: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "slurp",
    "curl",
    "wget",
    "python-requests",
    "go-http-client",
    "java/",
    "libwww",
    "httpclient",
    "okhttp",
    "headlesschrome",
    "phantomjs",
    "facebookexternalhit",
    "whatsapp",
    "telegrambot",
    "bingpreview",
    "mediapartners-google",
    "lighthouse",
    "pingdom",
    "uptimerobot",
];

/// Boolean capability: is the current caller an automated agent?
pub trait CrawlerDetector: Send + Sync {
    fn is_crawler(&self) -> bool;
}

/// Matches the caller's user-agent against a signature list.
///
/// One instance is built per request from the captured metadata, mirroring
/// how visitor identity is resolved per request.
#[derive(Debug, Clone)]
pub struct UserAgentDetector {
    user_agent: Option<String>,
    signatures: Vec<String>,
}

impl UserAgentDetector {
    pub fn new(user_agent: Option<&str>) -> Self {
        Self {
            user_agent: user_agent.map(|ua| ua.to_ascii_lowercase()),
            signatures: DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the default signature list.
    pub fn with_signatures(mut self, signatures: &[&str]) -> Self {
        self.signatures = signatures.iter().map(|s| s.to_ascii_lowercase()).collect();
        self
    }
}

impl CrawlerDetector for UserAgentDetector {
    fn is_crawler(&self) -> bool {
        let Some(ua) = self.user_agent.as_deref() else {
            // Real browsers always send a user-agent.
            debug!("no user-agent present, classifying caller as crawler");
            return true;
        };

        self.signatures.iter().any(|sig| ua.contains(sig.as_str()))
    }
}

/// Detection disabled: nothing is ever classified as a crawler.
#[derive(Debug, Clone, Default)]
pub struct NeverCrawler;

impl CrawlerDetector for NeverCrawler {
    fn is_crawler(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bots_are_detected() {
        for ua in [
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "curl/8.4.0",
            "python-requests/2.31.0",
            "Mozilla/5.0 AppleWebKit/537.36 HeadlessChrome/118.0.0.0",
        ] {
            assert!(UserAgentDetector::new(Some(ua)).is_crawler(), "{ua}");
        }
    }

    #[test]
    fn regular_browser_is_not_detected() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";
        assert!(!UserAgentDetector::new(Some(ua)).is_crawler());
    }

    #[test]
    fn missing_user_agent_is_treated_as_crawler() {
        assert!(UserAgentDetector::new(None).is_crawler());
    }

    #[test]
    fn custom_signatures_override_defaults() {
        let detector = UserAgentDetector::new(Some("curl/8.4.0")).with_signatures(&["scrapy"]);
        assert!(!detector.is_crawler());
        let detector = UserAgentDetector::new(Some("Scrapy/2.11")).with_signatures(&["scrapy"]);
        assert!(detector.is_crawler());
    }

    #[test]
    fn never_crawler_always_passes() {
        assert!(!NeverCrawler.is_crawler());
    }
}
