use crate::config::CrawlerConfig;
use crate::crawlers::browser::{BrowserFetcher, BrowserSession};
use crate::crawlers::crawler::PageFetcher;
use crate::error::{CrawlError, Result};
use crate::filter::UrlFilter;
use crate::http::{HttpSource, SitemapSource};
use crate::results::CrawlOutput;
use crate::sitemap::SitemapResolver;
use crate::state::{CrawlState, FALLBACK_DEPTH};
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Crawls a site in the browser and returns its pages with backlinks.
///
/// Sitemaps are resolved first, then the site is walked breadth first from
/// `base_url` down to `max_depth`. The browser session is closed whether or not
/// the crawl succeeds.
///
/// # Arguments
///
/// * `base_url` - Absolute http(s) URL the crawl starts from
/// * `max_depth` - Link depth below the base URL to follow
/// * `config` - Crawler configuration
/// * `sessions` - Told about the browser session once it is open, so a supervisor
///   can close it if this crawl is cut off
pub async fn run(
    base_url: &str,
    max_depth: usize,
    config: &CrawlerConfig,
    sessions: Option<UnboundedSender<BrowserSession>>,
) -> Result<CrawlOutput> {
    let base = parse_base_url(base_url)?;
    ::log::info!("Starting crawl of {} to depth {}", base, max_depth);

    let filter = UrlFilter::new(base, &config.exclude_patterns)
        .map_err(|e| CrawlError::Config(format!("invalid exclude pattern: {e}")))?;
    let http = HttpSource::new(&config.bot_user_agent)?;
    let resolver = SitemapResolver::new(
        http.clone(),
        config.robots_timeout(),
        config.sitemap_timeout(),
    );

    let mut fetcher = BrowserFetcher::connect(config, filter.clone(), http).await?;
    if let (Some(sessions), Some(session)) = (&sessions, fetcher.session()) {
        if sessions.send(session.clone()).is_err() {
            ::log::debug!("No one is tracking browser session {}", session.session_id);
        }
    }
    let output = crawl_site(&resolver, &mut fetcher, filter, max_depth).await;

    if let Err(e) = fetcher.shutdown().await {
        ::log::warn!("Failed to close browser session: {}", e);
    }

    Ok(output)
}

/// Resolves the site's sitemaps, then crawls it with the given fetcher
pub async fn crawl_site<S, F>(
    resolver: &SitemapResolver<S>,
    fetcher: &mut F,
    filter: UrlFilter,
    max_depth: usize,
) -> CrawlOutput
where
    S: SitemapSource,
    F: PageFetcher,
{
    let sitemap_urls = resolver.resolve(filter.base()).await;
    let state = CrawlState::new(filter, max_depth, sitemap_urls);
    crawl(fetcher, state).await
}

/// Breadth-first walk of the frontier, then the sitemap fallback when the walk
/// found fewer pages than the threshold
pub async fn crawl<F: PageFetcher>(fetcher: &mut F, mut state: CrawlState) -> CrawlOutput {
    let max_depth = state.max_depth();

    while let Some((url, depth)) = state.next_pending() {
        visit(fetcher, &mut state, &url, depth, max_depth, true).await;
    }

    if state.needs_fallback() {
        let candidates = state.fallback_candidates();
        ::log::warn!(
            "Only {} page(s) found by crawling, trying {} sitemap URL(s)",
            state.results().len(),
            candidates.len()
        );

        let depth_limit = max_depth.max(FALLBACK_DEPTH);
        for url in candidates {
            visit(fetcher, &mut state, &url, FALLBACK_DEPTH, depth_limit, false).await;
        }
    }

    ::log::info!(
        "Crawl finished: {} pages, {} URLs visited",
        state.results().len(),
        state.visited().len()
    );
    state.finish()
}

/// Admits, fetches and records one frontier entry
async fn visit<F: PageFetcher>(
    fetcher: &mut F,
    state: &mut CrawlState,
    url: &str,
    depth: usize,
    depth_limit: usize,
    expand: bool,
) {
    let normalized = match state.admit(url, depth, depth_limit) {
        Ok(normalized) => normalized,
        Err(reason) => {
            ::log::trace!("Skipping {} at depth {}: {:?}", url, depth, reason);
            return;
        }
    };

    match fetcher.fetch(&normalized, depth).await {
        Ok(extraction) => {
            for (field, reason) in extraction.defaulted() {
                ::log::debug!("{} on {} defaulted: {}", field, normalized, reason);
            }
            ::log::info!(
                "Crawled {} (depth {}, {} internal links)",
                normalized,
                depth,
                extraction.page.internal_links.len()
            );
            state.record(extraction.page, expand);
        }
        Err(e) => {
            ::log::warn!("Failed to load {}: {}", normalized, e);
        }
    }
}

/// Parses the crawl's starting URL, which must be absolute http or https
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .map_err(|e| CrawlError::InvalidUrl(format!("{base_url}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(CrawlError::InvalidUrl(format!(
            "{base_url}: only http and https URLs can be crawled"
        ))),
    }
}
