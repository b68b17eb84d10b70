// Re-export modules
pub mod analysis;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod graph;
pub mod http;
pub mod isolation;
pub mod parsers;
pub mod results;
pub mod sitemap;
pub mod state;

// Re-export commonly used types for convenience
pub use error::{CrawlError, Result};
pub use results::{CrawlOutput, PageResult};

use crate::config::CrawlerConfig;
use crate::crawlers::BrowserSession;
use crate::isolation::{CrawlJob, WorkerCommand, WorkerPool};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

/// How a crawl is executed
#[derive(Debug, Clone)]
pub enum Execution {
    /// In a worker process of this binary, killed if it overruns the deadline
    Isolated,
    /// In a worker process started by the given command
    IsolatedWith(WorkerCommand),
    /// In the calling process, abandoned and its browser session closed if it
    /// overruns the deadline
    InProcess,
}

/// Main builder for auditing a site
pub struct Audit {
    base_url: String,
    max_depth: usize,
    config: CrawlerConfig,
    total_timeout: Option<Duration>,
    execution: Execution,
}

impl Audit {
    /// Create a new Audit builder for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth: 2, // Default depth
            config: CrawlerConfig::default(),
            total_timeout: None,
            execution: Execution::Isolated,
        }
    }

    /// Set how many links deep below the base URL to crawl
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the total timeout (maximum runtime), overriding the configured one
    pub fn with_total_timeout(mut self, timeout_seconds: u64) -> Self {
        self.total_timeout = Some(Duration::from_secs(timeout_seconds));
        self
    }

    /// Set the crawler configuration
    pub fn with_config(mut self, config: CrawlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = CrawlerConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self> {
        let config = CrawlerConfig::from_json(config_str)?;
        Ok(self.with_config(config))
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    fn deadline(&self) -> Duration {
        self.total_timeout
            .unwrap_or_else(|| self.config.total_timeout())
    }

    /// Run the crawl and deliver its pages, or the reason it failed
    pub async fn run(self) -> Result<CrawlOutput> {
        crawlers::web::parse_base_url(&self.base_url)?;

        let deadline = self.deadline();
        let config = self.config.apply_env();

        let job = CrawlJob::new(1, self.base_url, self.max_depth, config);
        match self.execution {
            Execution::Isolated => isolation::run_isolated(job, deadline).await,
            Execution::IsolatedWith(command) => {
                isolation::run_isolated_with(command, job, deadline).await
            }
            Execution::InProcess => {
                run_in_process(job, deadline, |job, sessions| async move {
                    crawlers::web::run(&job.base_url, job.max_depth, &job.config, Some(sessions))
                        .await
                })
                .await
            }
        }
    }
}

/// Run `crawl` under `deadline` in this process. When it overruns, the crawl is
/// dropped and the browser sessions it reported are closed on the server.
async fn run_in_process<F, Fut>(job: CrawlJob, deadline: Duration, crawl: F) -> Result<CrawlOutput>
where
    F: FnOnce(CrawlJob, UnboundedSender<BrowserSession>) -> Fut,
    Fut: Future<Output = Result<CrawlOutput>>,
{
    let id = job.id;
    let base_url = job.base_url.clone();
    let (sessions, mut opened) = mpsc::unbounded_channel();

    match tokio::time::timeout(deadline, crawl(job, sessions)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            ::log::error!("Crawl of {} exceeded {}s", base_url, deadline.as_secs());
            while let Ok(session) = opened.try_recv() {
                if let Err(e) = session.close().await {
                    ::log::warn!("Browser session {} may still be open: {}", session.session_id, e);
                }
            }
            Err(CrawlError::ProcessTimeout { job: id, deadline })
        }
    }
}

/// Audit several sites at once across `config.pool_size` worker processes.
///
/// Outcomes are returned in the order of `base_urls`.
pub async fn run_batch(
    command: WorkerCommand,
    base_urls: &[String],
    max_depth: usize,
    config: &CrawlerConfig,
) -> Vec<Result<CrawlOutput>> {
    let config = config.clone().apply_env();

    let jobs = base_urls
        .iter()
        .zip(1u64..)
        .map(|(url, id)| CrawlJob::new(id, url.clone(), max_depth, config.clone()))
        .collect();

    let pool = Arc::new(WorkerPool::new(command, config.pool_size));
    let outcomes = Arc::clone(&pool)
        .run_all(jobs, config.total_timeout())
        .await;
    pool.shutdown().await;
    outcomes
}
