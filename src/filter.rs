use regex::Regex;
use url::Url;

/// File extensions that are never rendered as pages
const NON_HTML_PATTERN: &str =
    r"(?i)\.(pdf|zip|doc|docx|xls|xlsx|ppt|pptx|jpg|jpeg|png|gif|webp|svg|ico|css|js|mp4|mp3|avi|exe)$";

/// URL policy for one crawl: which URLs belong to the site and which are worth rendering
#[derive(Debug, Clone)]
pub struct UrlFilter {
    base: Url,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a filter anchored at `base`, with extra exclusion patterns on top of the
    /// built-in non-HTML extension list
    pub fn new(base: Url, exclude_patterns: &[String]) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(exclude_patterns.len() + 1);
        exclude_regexes.push(Regex::new(NON_HTML_PATTERN)?);
        for pattern in exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            base,
            exclude_regexes,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `link` against the base URL and drop its fragment
    pub fn normalize(&self, link: &str) -> Option<Url> {
        normalize_url(&self.base, link)
    }

    /// Whether the URL looks like an HTML page rather than a downloadable resource
    pub fn is_html_url(&self, url: &str) -> bool {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());

        // The extension check runs on the path so query strings don't hide it;
        // user patterns see the whole URL.
        if self.exclude_regexes[0].is_match(&path) {
            return false;
        }
        !self.exclude_regexes[1..].iter().any(|re| re.is_match(url))
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        is_same_origin(&self.base, url)
    }

    /// Determine if a normalized URL should be fetched
    pub fn should_crawl(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && self.is_same_origin(url)
            && self.is_html_url(url.as_str())
    }
}

/// Join `link` onto `base` and strip the fragment
pub fn normalize_url(base: &Url, link: &str) -> Option<Url> {
    let mut resolved = base.join(link.trim()).ok()?;
    resolved.set_fragment(None);
    Some(resolved)
}

/// Same scheme, host and port
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
