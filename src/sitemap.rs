use crate::error::CrawlError;
use crate::filter::normalize_url;
use crate::http::SitemapSource;
use crate::parsers::{Parser, robots};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use url::Url;

/// Discovers a site's sitemaps and resolves them into the set of page URLs they declare
pub struct SitemapResolver<S> {
    source: S,
    robots_timeout: Duration,
    sitemap_timeout: Duration,
}

impl<S: SitemapSource> SitemapResolver<S> {
    pub fn new(source: S, robots_timeout: Duration, sitemap_timeout: Duration) -> Self {
        Self {
            source,
            robots_timeout,
            sitemap_timeout,
        }
    }

    /// All page URLs declared by the site's sitemaps.
    ///
    /// Failures never propagate: an unreachable or malformed sitemap contributes
    /// nothing and the rest are still resolved.
    pub async fn resolve(&self, base: &Url) -> BTreeSet<String> {
        let roots = self.discover(base).await;

        let mut pages = BTreeSet::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = roots.into_iter().rev().collect();

        while let Some(sitemap_url) = stack.pop() {
            if !seen.insert(sitemap_url.clone()) {
                ::log::debug!("Sitemap {} already resolved, skipping", sitemap_url);
                continue;
            }

            let Some(entries) = self.read_sitemap(&sitemap_url).await else {
                continue;
            };
            ::log::debug!(
                "Sitemap {} lists {} pages and {} nested sitemaps",
                sitemap_url,
                entries.pages.len(),
                entries.sitemaps.len()
            );
            for loc in entries.pages {
                match normalize_url(base, &loc) {
                    Some(page) => {
                        pages.insert(page.to_string());
                    }
                    None => ::log::debug!("Ignoring unparsable sitemap URL {:?}", loc),
                }
            }
            stack.extend(entries.sitemaps.into_iter().rev());
        }

        ::log::info!("Found {} URLs in sitemap(s) for {}", pages.len(), base);
        pages
    }

    /// Sitemap locations declared in robots.txt, or `/sitemap.xml` when there are none
    pub async fn discover(&self, base: &Url) -> Vec<String> {
        let mut declared = Vec::new();

        if let Ok(robots_url) = base.join("/robots.txt") {
            match self.source.get(robots_url.as_str(), self.robots_timeout).await {
                Ok(doc) if doc.status == 200 => {
                    declared = robots::sitemap_directives(&doc.body, &robots_url);
                }
                Ok(doc) => ::log::warn!("robots.txt answered with status {}", doc.status),
                Err(e) => ::log::warn!("Failed to fetch robots.txt: {}", e),
            }
        }

        if declared.is_empty() {
            ::log::warn!("No Sitemap found in robots.txt, falling back to /sitemap.xml");
            if let Ok(default) = base.join("/sitemap.xml") {
                declared.push(default.to_string());
            }
        }

        declared
    }

    async fn read_sitemap(&self, sitemap_url: &str) -> Option<crate::parsers::sitemap::SitemapEntries> {
        let doc = match self.source.get(sitemap_url, self.sitemap_timeout).await {
            Ok(doc) => doc,
            Err(CrawlError::Http { status: 404, .. }) => {
                ::log::info!("No sitemap found at {} (404)", sitemap_url);
                return None;
            }
            Err(e) => {
                ::log::error!("Could not fetch sitemap {}: {}", sitemap_url, e);
                return None;
            }
        };

        let url = Url::parse(&doc.url)
            .or_else(|_| Url::parse(sitemap_url))
            .ok()?;
        match Parser::parse_sitemap(&doc.body, &doc.content_type, &url) {
            Ok(entries) => Some(entries),
            Err(e) => {
                ::log::error!("XML parse error at {}: {}", sitemap_url, e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Result;
    use crate::http::FetchedDocument;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory site: URL -> (content type, body). Unknown URLs answer 404.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub docs: HashMap<String, (String, String)>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn with(mut self, url: &str, content_type: &str, body: &str) -> Self {
            self.docs
                .insert(url.to_string(), (content_type.to_string(), body.to_string()));
            self
        }
    }

    #[async_trait]
    impl SitemapSource for FakeSource {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedDocument> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.docs.get(url) {
                Some((content_type, body)) => Ok(FetchedDocument {
                    url: url.to_string(),
                    status: 200,
                    content_type: content_type.clone(),
                    body: body.clone(),
                }),
                None => Err(CrawlError::Http {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    pub(crate) fn urlset(urls: &[&str]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc></url>"))
            .collect();
        format!(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#)
    }

    pub(crate) fn index(sitemaps: &[&str]) -> String {
        let entries: String = sitemaps
            .iter()
            .map(|u| format!("<sitemap><loc>{u}</loc></sitemap>"))
            .collect();
        format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
        )
    }

    fn resolver(source: FakeSource) -> SitemapResolver<FakeSource> {
        SitemapResolver::new(source, Duration::from_secs(1), Duration::from_secs(1))
    }

    fn base() -> Url {
        Url::parse("https://ex.com").unwrap()
    }

    #[tokio::test]
    async fn test_robots_declared_index_resolves_all_children() {
        let source = FakeSource::default()
            .with("https://ex.com/robots.txt", "text/plain", "User-agent: *\nSitemap: /sitemap_index.xml\n")
            .with(
                "https://ex.com/sitemap_index.xml",
                "application/xml",
                &index(&["https://ex.com/posts.xml", "https://ex.com/pages.xml"]),
            )
            .with(
                "https://ex.com/posts.xml",
                "application/xml",
                &urlset(&["https://ex.com/p1", "https://ex.com/p2", "https://ex.com/p3"]),
            )
            .with(
                "https://ex.com/pages.xml",
                "text/xml; charset=utf-8",
                &urlset(&[
                    "https://ex.com/",
                    "https://ex.com/about",
                    "https://ex.com/contact",
                    "https://ex.com/team",
                ]),
            );

        let urls = resolver(source).resolve(&base()).await;
        assert_eq!(urls.len(), 7);
        assert!(urls.contains("https://ex.com/p3"));
        assert!(urls.contains("https://ex.com/team"));
    }

    #[tokio::test]
    async fn test_overlapping_children_are_deduplicated() {
        let source = FakeSource::default()
            .with(
                "https://ex.com/sitemap.xml",
                "application/xml",
                &index(&["https://ex.com/b.xml", "https://ex.com/a.xml"]),
            )
            .with("https://ex.com/a.xml", "application/xml", &urlset(&["https://ex.com/1", "https://ex.com/2"]))
            .with("https://ex.com/b.xml", "application/xml", &urlset(&["https://ex.com/2", "https://ex.com/3"]));

        let urls = resolver(source).resolve(&base()).await;
        let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        assert_eq!(urls, vec!["https://ex.com/1", "https://ex.com/2", "https://ex.com/3"]);
    }

    #[tokio::test]
    async fn test_missing_robots_falls_back_to_default_location() {
        let source = FakeSource::default().with(
            "https://ex.com/sitemap.xml",
            "application/xml",
            &urlset(&["https://ex.com/only"]),
        );
        let resolver = resolver(source);

        assert_eq!(resolver.discover(&base()).await, vec!["https://ex.com/sitemap.xml"]);
        let urls = resolver.resolve(&base()).await;
        assert_eq!(urls.into_iter().collect::<Vec<_>>(), vec!["https://ex.com/only"]);
    }

    #[tokio::test]
    async fn test_failures_contribute_nothing() {
        let source = FakeSource::default()
            .with(
                "https://ex.com/sitemap.xml",
                "application/xml",
                &index(&[
                    "https://ex.com/broken.xml",
                    "https://ex.com/gone.xml",
                    "https://ex.com/good.xml",
                ]),
            )
            .with("https://ex.com/broken.xml", "application/xml", "<urlset><url><loc>x</url>")
            .with("https://ex.com/good.xml", "application/xml", &urlset(&["https://ex.com/ok"]));

        let urls = resolver(source).resolve(&base()).await;
        assert_eq!(urls.into_iter().collect::<Vec<_>>(), vec!["https://ex.com/ok"]);
    }

    #[tokio::test]
    async fn test_html_answer_is_scanned_for_xml_links() {
        let source = FakeSource::default()
            .with(
                "https://ex.com/sitemap.xml",
                "text/html; charset=utf-8",
                r#"<html><body><a href="/real-sitemap.xml">sitemap</a></body></html>"#,
            )
            .with(
                "https://ex.com/real-sitemap.xml",
                "application/xml",
                &urlset(&["https://ex.com/a", "https://ex.com/b"]),
            );

        let urls = resolver(source).resolve(&base()).await;
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn test_page_urls_are_normalized_like_crawled_urls() {
        let source = FakeSource::default().with(
            "https://ex.com/sitemap.xml",
            "application/xml",
            &urlset(&[
                "https://ex.com",
                "https://ex.com/about#team",
                "https://ex.com/about",
                "http://[broken",
            ]),
        );

        let urls = resolver(source).resolve(&base()).await;
        let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        assert_eq!(urls, vec!["https://ex.com/", "https://ex.com/about"]);
    }

    #[tokio::test]
    async fn test_cyclic_indexes_terminate() {
        let source = FakeSource::default()
            .with("https://ex.com/sitemap.xml", "application/xml", &index(&["https://ex.com/loop.xml"]))
            .with(
                "https://ex.com/loop.xml",
                "application/xml",
                &index(&["https://ex.com/sitemap.xml", "https://ex.com/leaf.xml"]),
            )
            .with("https://ex.com/leaf.xml", "application/xml", &urlset(&["https://ex.com/x"]));

        let resolver = resolver(source);
        let urls = resolver.resolve(&base()).await;
        assert_eq!(urls.len(), 1);

        let requests = resolver.source.requests.lock().unwrap();
        let sitemap_fetches = requests
            .iter()
            .filter(|u| u.as_str() == "https://ex.com/sitemap.xml")
            .count();
        assert_eq!(sitemap_fetches, 1);
    }
}
