use crate::config::CrawlerConfig;
use crate::crawlers::BrowserSession;
use crate::error::{CrawlError, Result};
use crate::results::CrawlOutput;
use serde::{Deserialize, Serialize};

/// One crawl, as sent to a worker process on a single JSON line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: u64,
    pub base_url: String,
    pub max_depth: usize,
    #[serde(default)]
    pub config: CrawlerConfig,
}

impl CrawlJob {
    pub fn new(id: u64, base_url: impl Into<String>, max_depth: usize, config: CrawlerConfig) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            max_depth,
            config,
        }
    }
}

/// A line a worker writes for one `CrawlJob`: any number of `BrowserOpened`
/// notices, then exactly one `Completed` or `Failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WorkerReply {
    /// The job's browser session, so the supervisor can close it if the worker dies
    BrowserOpened {
        id: u64,
        session: BrowserSession,
    },
    Completed {
        id: u64,
        output: CrawlOutput,
    },
    Failed {
        id: u64,
        kind: String,
        message: String,
    },
}

impl WorkerReply {
    pub fn failed(id: u64, err: &CrawlError) -> Self {
        WorkerReply::Failed {
            id,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            WorkerReply::BrowserOpened { id, .. }
            | WorkerReply::Completed { id, .. }
            | WorkerReply::Failed { id, .. } => *id,
        }
    }

    pub fn into_result(self) -> Result<CrawlOutput> {
        match self {
            WorkerReply::Completed { output, .. } => Ok(output),
            WorkerReply::Failed { kind, message, .. } => {
                Err(CrawlError::WorkerFailed { kind, message })
            }
            WorkerReply::BrowserOpened { id, .. } => Err(CrawlError::ProcessCrash {
                job: id,
                message: "worker sent no final reply".to_string(),
            }),
        }
    }
}
