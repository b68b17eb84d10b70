use std::time::Duration;
use thiserror::Error;

/// Errors produced while resolving sitemaps, fetching pages or supervising workers.
///
/// Most variants are non-fatal for a crawl: the coordinator logs them and moves on.
/// `WebDriver`, `InvalidUrl`, `Config` and the process variants end the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("could not load page {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("webdriver session error: {0}")]
    WebDriver(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("crawl job {job} exceeded its deadline of {}s", .deadline.as_secs())]
    ProcessTimeout { job: u64, deadline: Duration },

    #[error("worker for crawl job {job} crashed: {message}")]
    ProcessCrash { job: u64, message: String },

    #[error("crawl failed in worker ({kind}): {message}")]
    WorkerFailed { kind: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    /// Short, stable name used when the error crosses the worker boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::Network { .. } => "network",
            CrawlError::Navigation { .. } => "navigation",
            CrawlError::Http { .. } => "http",
            CrawlError::Parse { .. } => "parse",
            CrawlError::WebDriver(_) => "webdriver",
            CrawlError::InvalidUrl(_) => "invalid_url",
            CrawlError::Config(_) => "config",
            CrawlError::ProcessTimeout { .. } => "timeout",
            CrawlError::ProcessCrash { .. } => "crash",
            CrawlError::WorkerFailed { .. } => "worker",
            CrawlError::Io(_) => "io",
            CrawlError::Json(_) => "json",
        }
    }

    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        CrawlError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn parse(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CrawlError::Parse {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

impl From<fantoccini::error::NewSessionError> for CrawlError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        CrawlError::WebDriver(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        let err = CrawlError::ProcessTimeout {
            job: 3,
            deadline: Duration::from_secs(900),
        };
        assert_eq!(err.kind(), "timeout");
        assert_eq!(
            err.to_string(),
            "crawl job 3 exceeded its deadline of 900s"
        );

        let err = CrawlError::network("https://example.com/robots.txt", "connection refused");
        assert_eq!(err.kind(), "network");
        assert!(err.to_string().contains("connection refused"));
    }
}
