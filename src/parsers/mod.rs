pub mod html;
pub mod robots;
pub mod sitemap;
pub mod text;

#[cfg(test)]
mod tests;

use crate::error::Result;
use url::Url;

/// How a fetched sitemap document should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserType {
    /// sitemaps.org XML (`<urlset>` or `<sitemapindex>`)
    Xml,
    /// An HTML page served where a sitemap was expected
    Html,
    /// Anything else
    Other,
}

impl ParserType {
    /// Determines the parser type from a `Content-Type` header value
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("xml") {
            ParserType::Xml
        } else if content_type.contains("html") {
            ParserType::Html
        } else {
            ParserType::Other
        }
    }
}

/// Main parser that delegates sitemap documents to the format-specific parsers
pub struct Parser;

impl Parser {
    /// Read a sitemap response into page URLs and nested sitemap URLs.
    ///
    /// HTML bodies contribute only nested sitemaps (their `.xml` links); unsupported
    /// content types contribute nothing.
    pub fn parse_sitemap(
        body: &str,
        content_type: &str,
        url: &Url,
    ) -> Result<sitemap::SitemapEntries> {
        match ParserType::from_content_type(content_type) {
            ParserType::Xml => sitemap::parse(body),
            ParserType::Html => {
                ::log::warn!("Received HTML at {}, looking for .xml links", url);
                Ok(sitemap::SitemapEntries {
                    pages: Vec::new(),
                    sitemaps: html::sitemap_links(body, url),
                })
            }
            ParserType::Other => {
                ::log::warn!("Unsupported content type at {}: {:?}", url, content_type);
                Ok(sitemap::SitemapEntries::default())
            }
        }
    }
}
