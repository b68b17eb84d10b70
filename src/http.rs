use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

/// A fetched text document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Source of robots.txt and sitemap documents.
///
/// Non-2xx answers are returned as `CrawlError::Http`, transport failures as
/// `CrawlError::Network`.
#[async_trait]
pub trait SitemapSource: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedDocument>;
}

/// Result of following a URL's redirects hop by hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectProbe {
    /// URLs that answered with a redirect, in the order they were visited
    pub chain: Vec<String>,
    pub final_url: String,
    pub status: u16,
}

/// HTTP access for everything the crawl fetches outside the browser
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    probe: reqwest::Client,
}

impl HttpSource {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CrawlError::Config(format!("cannot build HTTP client: {e}")))?;
        let probe = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|e| CrawlError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, probe })
    }

    /// Follow redirects manually so every hop is seen.
    ///
    /// Stops at the first non-3xx answer, at a redirect without `Location`, on a loop,
    /// or after `max_hops` redirects.
    pub async fn probe_redirects(
        &self,
        url: &str,
        max_hops: usize,
        timeout: Duration,
    ) -> Result<RedirectProbe> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = url.to_string();

        loop {
            let response = self
                .probe
                .get(&current)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| CrawlError::network(&current, e))?;
            let status = response.status().as_u16();

            if !(300..=399).contains(&status) || chain.len() >= max_hops {
                return Ok(RedirectProbe {
                    chain,
                    final_url: current,
                    status,
                });
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            let next = Url::parse(&current)
                .ok()
                .and_then(|base| base.join(&location).ok())
                .map(|u| u.to_string());

            let Some(next) = next.filter(|_| !location.is_empty()) else {
                return Ok(RedirectProbe {
                    chain,
                    final_url: current,
                    status,
                });
            };

            chain.push(current);
            if chain.contains(&next) {
                ::log::warn!("Redirect loop detected at {}", next);
                return Ok(RedirectProbe {
                    chain,
                    final_url: next,
                    status,
                });
            }
            current = next;
        }
    }
}

#[async_trait]
impl SitemapSource for HttpSource {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedDocument> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CrawlError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::network(url, e))?;

        Ok(FetchedDocument {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
