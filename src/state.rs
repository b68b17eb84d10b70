use crate::filter::UrlFilter;
use crate::graph::LinkGraph;
use crate::results::{CrawlOutput, PageResult};
use std::collections::{BTreeSet, VecDeque};

/// Pages collected by the BFS below which the sitemap fallback runs
pub const FALLBACK_THRESHOLD: usize = 2;

/// Depth given to pages fetched by the sitemap fallback
pub const FALLBACK_DEPTH: usize = 1;

/// Why a frontier entry was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonHtml,
    Unparseable,
    TooDeep,
    AlreadyVisited,
    OffOrigin,
}

/// State of one crawl invocation, threaded through the coordinator and consumed at the end
#[derive(Debug)]
pub struct CrawlState {
    filter: UrlFilter,
    max_depth: usize,
    visited: BTreeSet<String>,
    pending: VecDeque<(String, usize)>,
    sitemap_urls: BTreeSet<String>,
    results: Vec<PageResult>,
    graph: LinkGraph,
}

impl CrawlState {
    /// New state with the frontier seeded by the base URL at depth 0
    pub fn new(filter: UrlFilter, max_depth: usize, sitemap_urls: BTreeSet<String>) -> Self {
        let seed = filter.base().to_string();
        Self {
            filter,
            max_depth,
            visited: BTreeSet::new(),
            pending: VecDeque::from([(seed, 0)]),
            sitemap_urls,
            results: Vec::new(),
            graph: LinkGraph::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }

    pub fn results(&self) -> &[PageResult] {
        &self.results
    }

    /// Pop the next frontier entry
    pub fn next_pending(&mut self) -> Option<(String, usize)> {
        self.pending.pop_front()
    }

    /// Apply the crawl policy to a URL and, if it passes, mark it visited.
    ///
    /// Returns the normalized URL to fetch. The URL is marked before fetching so it
    /// can never be queued or fetched twice, even if the fetch fails.
    pub fn admit(&mut self, url: &str, depth: usize, depth_limit: usize) -> Result<String, SkipReason> {
        if !self.filter.is_html_url(url) {
            return Err(SkipReason::NonHtml);
        }
        let normalized = self.filter.normalize(url).ok_or(SkipReason::Unparseable)?;
        if depth > depth_limit {
            return Err(SkipReason::TooDeep);
        }
        let key = normalized.to_string();
        if self.visited.contains(&key) {
            return Err(SkipReason::AlreadyVisited);
        }
        if !self.filter.should_crawl(&normalized) {
            return Err(SkipReason::OffOrigin);
        }

        self.visited.insert(key.clone());
        Ok(key)
    }

    /// Store a fetched page, record its links, and queue its children when `expand` is set
    /// and the page is above the depth limit
    pub fn record(&mut self, page: PageResult, expand: bool) {
        self.graph.record(&page.url, &page.internal_links);

        if expand && page.depth < self.max_depth {
            let child_depth = page.depth + 1;
            for link in &page.internal_links {
                if !self.visited.contains(link) {
                    self.pending.push_back((link.clone(), child_depth));
                }
            }
        }

        self.results.push(page);
    }

    /// Whether the BFS under-collected and the sitemap can make up for it
    pub fn needs_fallback(&self) -> bool {
        self.results.len() < FALLBACK_THRESHOLD && !self.sitemap_urls.is_empty()
    }

    /// Sitemap URLs the crawl has not visited yet, in sorted order
    pub fn fallback_candidates(&self) -> Vec<String> {
        self.sitemap_urls
            .iter()
            .filter(|url| !self.visited.contains(*url))
            .cloned()
            .collect()
    }

    /// Derive backlinks and hand back the crawl's output
    pub fn finish(mut self) -> CrawlOutput {
        self.graph.annotate(&mut self.results);
        CrawlOutput {
            pages: self.results,
            sitemap_urls: self.sitemap_urls,
        }
    }
}
