use crate::error::{CrawlError, Result};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};

pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// `<loc>` values of a sitemap document, split by what they point to
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapEntries {
    /// Content pages
    pub pages: Vec<String>,
    /// Nested sitemaps (any `<loc>` ending in `.xml`)
    pub sitemaps: Vec<String>,
}

impl SitemapEntries {
    fn push(&mut self, loc: String) {
        if loc.ends_with(".xml") {
            self.sitemaps.push(loc);
        } else {
            self.pages.push(loc);
        }
    }
}

/// Parses a `<urlset>` or `<sitemapindex>` document.
///
/// Only `<loc>` elements bound to the sitemaps.org 0.9 namespace are read. Malformed
/// XML is an error, so the caller can log it and count the document as empty.
pub fn parse(xml: &str) -> Result<SitemapEntries> {
    let mut reader = NsReader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();
    let mut entries = SitemapEntries::default();
    let mut current: Option<String> = None;
    let mut open_elements = 0usize;
    let mut saw_root = false;

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| CrawlError::parse("sitemap XML", e))?;

        match event {
            Event::Start(e) => {
                open_elements += 1;
                saw_root = true;
                if is_sitemap_loc(&ns, e.local_name().as_ref()) {
                    current = Some(String::new());
                }
            }
            Event::Text(t) => {
                if let Some(loc) = current.as_mut() {
                    let text = t.unescape().map_err(|e| CrawlError::parse("sitemap XML", e))?;
                    loc.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Empty(_) => saw_root = true,
            Event::End(e) => {
                open_elements = open_elements.saturating_sub(1);
                if e.local_name().as_ref() == b"loc" {
                    if let Some(loc) = current.take() {
                        let loc = loc.trim();
                        if !loc.is_empty() {
                            entries.push(loc.to_string());
                        }
                    }
                }
            }
            Event::Eof if !saw_root => {
                return Err(CrawlError::parse("sitemap XML", "no root element"));
            }
            Event::Eof if open_elements > 0 => {
                return Err(CrawlError::parse(
                    "sitemap XML",
                    format!("document ends with {open_elements} unclosed element(s)"),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn is_sitemap_loc(ns: &ResolveResult<'_>, local_name: &[u8]) -> bool {
    local_name == b"loc" && matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SITEMAP_NAMESPACE)
}
