use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One crawled page and the SEO signals extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Normalized URL of the page
    pub url: String,

    /// Final HTTP status of the navigation
    #[serde(alias = "statusCode")]
    pub http_status: u16,

    pub title: Option<String>,

    pub meta_description: Option<String>,

    #[serde(default)]
    pub h1_count: usize,

    #[serde(default)]
    pub word_count: usize,

    /// `<img>` elements without usable alt text
    #[serde(default)]
    pub images_without_alt_count: usize,

    /// Same-origin links found on the page
    #[serde(default)]
    pub internal_links: BTreeSet<String>,

    /// URLs traversed before the final response, in order
    #[serde(default)]
    pub redirect_chain: Vec<String>,

    /// Seconds spent navigating
    #[serde(default)]
    pub load_time: f64,

    #[serde(default)]
    pub page_size_bytes: u64,

    /// Whether the page renders within the mobile viewport width
    #[serde(default)]
    pub has_viewport: bool,

    #[serde(default)]
    pub console_errors: Vec<String>,

    /// Largest Contentful Paint, seconds
    #[serde(default)]
    pub lcp: f64,

    /// Cumulative Layout Shift
    #[serde(default)]
    pub cls: f64,

    /// Time to first byte, seconds
    #[serde(default)]
    pub ttfb: f64,

    #[serde(default)]
    pub depth: usize,

    /// Pages that link here, filled in once the crawl finishes
    #[serde(default)]
    pub linked_from: Vec<String>,
}

impl PageResult {
    /// A page that answered with an error status: the status is kept so the page can
    /// be flagged as broken, everything else stays empty
    pub fn status_only(
        url: String,
        http_status: u16,
        depth: usize,
        redirect_chain: Vec<String>,
        load_time: f64,
    ) -> Self {
        Self {
            url,
            http_status,
            title: None,
            meta_description: None,
            h1_count: 0,
            word_count: 0,
            images_without_alt_count: 0,
            internal_links: BTreeSet::new(),
            redirect_chain,
            load_time,
            page_size_bytes: 0,
            has_viewport: false,
            console_errors: Vec::new(),
            lcp: 0.0,
            cls: 0.0,
            ttfb: 0.0,
            depth,
            linked_from: Vec::new(),
        }
    }

    pub fn is_broken(&self) -> bool {
        self.http_status >= 400
    }
}

/// Everything a crawl hands back to its caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOutput {
    /// Pages in fetch-completion order
    pub pages: Vec<PageResult>,

    /// Page URLs declared by the site's sitemaps
    pub sitemap_urls: BTreeSet<String>,
}

impl CrawlOutput {
    pub fn crawled_urls(&self) -> BTreeSet<String> {
        self.pages.iter().map(|p| p.url.clone()).collect()
    }

    /// Keep only the pages whose URL is in `selected`
    pub fn retain_selected(&mut self, selected: &[String]) {
        let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
        self.pages.retain(|p| selected.contains(p.url.as_str()));
    }
}

/// Lightweight listing used by discovery runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    pub url: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub depth: usize,
    pub from_sitemap: bool,
}

impl CrawlOutput {
    pub fn discovered(&self) -> Vec<DiscoveredPage> {
        self.pages
            .iter()
            .map(|page| DiscoveredPage {
                url: page.url.clone(),
                status_code: page.http_status,
                title: page.title.clone(),
                depth: page.depth,
                from_sitemap: self.sitemap_urls.contains(&page.url),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_page_has_empty_content() {
        let page = PageResult::status_only("https://ex.com/gone".to_string(), 404, 1, vec![], 0.2);
        assert!(page.is_broken());
        assert_eq!(page.http_status, 404);
        assert_eq!(page.title, None);
        assert_eq!(page.word_count, 0);
        assert!(page.internal_links.is_empty());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let page = PageResult::status_only("https://ex.com/".to_string(), 500, 0, vec![], 0.0);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["httpStatus"], 500);
        assert!(json.get("imagesWithoutAltCount").is_some());
        assert!(json.get("linkedFrom").is_some());

        let legacy = r#"{"url": "https://ex.com/", "statusCode": 200, "title": "Home", "metaDescription": null}"#;
        let page: PageResult = serde_json::from_str(legacy).unwrap();
        assert_eq!(page.http_status, 200);
        assert_eq!(page.title.as_deref(), Some("Home"));
    }

    #[test]
    fn test_discovered_marks_sitemap_pages() {
        let output = CrawlOutput {
            pages: vec![
                PageResult::status_only("https://ex.com/".to_string(), 200, 0, vec![], 0.0),
                PageResult::status_only("https://ex.com/hidden".to_string(), 200, 1, vec![], 0.0),
            ],
            sitemap_urls: ["https://ex.com/".to_string()].into_iter().collect(),
        };
        let discovered = output.discovered();
        assert!(discovered[0].from_sitemap);
        assert!(!discovered[1].from_sitemap);
        assert_eq!(discovered[1].depth, 1);
    }
}
