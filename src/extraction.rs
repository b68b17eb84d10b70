use crate::filter::UrlFilter;
use crate::parsers::{html, text};
use crate::results::PageResult;
use scraper::Html;
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// Extra CSS pixels a page may exceed the viewport by and still count as mobile friendly
const VIEWPORT_SLACK: u32 = 5;

/// Outcome of one capture step in the browser; `Err` carries the reason it failed
pub type Captured<T> = Result<T, String>;

/// Timing and size data read from the Performance API after load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSnapshot {
    /// responseStart - startTime of the navigation entry, milliseconds
    pub ttfb_ms: Option<f64>,
    /// Largest Contentful Paint, milliseconds
    pub lcp_ms: Option<f64>,
    pub cls: Option<f64>,
    /// Bytes transferred for the document and its subresources
    pub transfer_bytes: u64,
}

/// Everything captured from the browser for one successfully loaded page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The URL that was requested
    pub url: String,
    /// Document URL after redirects
    pub final_url: String,
    pub status: u16,
    pub depth: usize,
    pub load_time: f64,
    pub redirect_chain: Vec<String>,
    pub html: Captured<String>,
    /// `document.body.innerText`
    pub inner_text: Captured<String>,
    /// `document.body.scrollWidth`
    pub scroll_width: Captured<u32>,
    pub performance: Captured<PerformanceSnapshot>,
    pub console_errors: Captured<Vec<String>>,
}

/// Fields of a page that are extracted independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Title,
    MetaDescription,
    H1Count,
    BodyText,
    ImagesWithoutAlt,
    Viewport,
    InternalLinks,
    Performance,
    ConsoleErrors,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::MetaDescription => "metaDescription",
            Field::H1Count => "h1Count",
            Field::BodyText => "bodyText",
            Field::ImagesWithoutAlt => "imagesWithoutAltCount",
            Field::Viewport => "hasViewport",
            Field::InternalLinks => "internalLinks",
            Field::Performance => "performance",
            Field::ConsoleErrors => "consoleErrors",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Extracted,
    /// The field fell back to its default; the reason says why
    Defaulted(String),
}

/// A page plus how each of its fields was obtained
#[derive(Debug, Clone)]
pub struct Extraction {
    pub page: PageResult,
    pub outcomes: Vec<(Field, FieldOutcome)>,
}

impl Extraction {
    /// A page with no extracted content, such as an HTTP error page
    pub fn status_only(page: PageResult) -> Self {
        Self {
            page,
            outcomes: Vec::new(),
        }
    }

    pub fn outcome(&self, field: Field) -> Option<&FieldOutcome> {
        self.outcomes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, outcome)| outcome)
    }

    pub fn defaulted(&self) -> impl Iterator<Item = (Field, &str)> {
        self.outcomes.iter().filter_map(|(field, outcome)| match outcome {
            FieldOutcome::Defaulted(reason) => Some((*field, reason.as_str())),
            FieldOutcome::Extracted => None,
        })
    }
}

/// Records each field's outcome while building a page
struct Recorder {
    outcomes: Vec<(Field, FieldOutcome)>,
}

impl Recorder {
    fn take<T: Default>(&mut self, field: Field, value: Captured<T>) -> T {
        match value {
            Ok(v) => {
                self.outcomes.push((field, FieldOutcome::Extracted));
                v
            }
            Err(reason) => {
                self.outcomes.push((field, FieldOutcome::Defaulted(reason)));
                T::default()
            }
        }
    }
}

/// Build a `PageResult` from a rendered page.
///
/// Every field is extracted on its own: a failed capture or a missing element
/// leaves that field at its default and is reported in `outcomes`.
pub fn extract_page(rendered: RenderedPage, filter: &UrlFilter, viewport_width: u32) -> Extraction {
    let mut rec = Recorder {
        outcomes: Vec::new(),
    };

    let doc = rendered.html.as_ref().map(|h| Html::parse_document(h)).map_err(|e| {
        format!("rendered HTML unavailable: {e}")
    });
    let page_url = Url::parse(&rendered.final_url)
        .or_else(|_| Url::parse(&rendered.url))
        .unwrap_or_else(|_| filter.base().clone());

    let title = rec.take(Field::Title, from_doc(&doc, |d| Ok(html::title(d))));
    let meta_description = rec.take(
        Field::MetaDescription,
        from_doc(&doc, |d| Ok(html::meta_description(d))),
    );
    let h1_count = rec.take(
        Field::H1Count,
        from_doc(&doc, |d| html::count(d, "h1").ok_or_else(|| "invalid selector".to_string())),
    );
    let images_without_alt_count = rec.take(
        Field::ImagesWithoutAlt,
        from_doc(&doc, |d| {
            html::images_without_alt(d).ok_or_else(|| "invalid selector".to_string())
        }),
    );

    let body_text = match (&rendered.inner_text, &doc) {
        (Ok(inner), _) => Ok(text::parse(inner)),
        (Err(_), Ok(d)) => Ok(html::body_text(d)),
        (Err(e), Err(_)) => Err(e.clone()),
    };
    let body_text = rec.take(Field::BodyText, body_text);
    let word_count = text::word_count(&body_text);

    let has_viewport = rec.take(
        Field::Viewport,
        rendered
            .scroll_width
            .map(|width| width <= viewport_width + VIEWPORT_SLACK),
    );

    let internal_links = rec.take(
        Field::InternalLinks,
        from_doc(&doc, |d| Ok(internal_links(d, &page_url, filter))),
    );

    let performance = rec.take(Field::Performance, rendered.performance);
    let console_errors = rec.take(Field::ConsoleErrors, rendered.console_errors);

    let page = PageResult {
        url: rendered.url,
        http_status: rendered.status,
        title,
        meta_description,
        h1_count,
        word_count,
        images_without_alt_count,
        internal_links,
        redirect_chain: rendered.redirect_chain,
        load_time: rendered.load_time,
        page_size_bytes: performance.transfer_bytes,
        has_viewport,
        console_errors,
        lcp: performance.lcp_ms.unwrap_or(0.0) / 1000.0,
        cls: performance.cls.unwrap_or(0.0),
        ttfb: performance.ttfb_ms.map(|ms| (ms / 1000.0).max(0.0)).unwrap_or(0.0),
        depth: rendered.depth,
        linked_from: Vec::new(),
    };

    Extraction {
        page,
        outcomes: rec.outcomes,
    }
}

fn from_doc<T>(
    doc: &Result<Html, String>,
    f: impl FnOnce(&Html) -> Captured<T>,
) -> Captured<T> {
    match doc {
        Ok(d) => f(d),
        Err(e) => Err(e.clone()),
    }
}

/// Same-origin links on the page, normalized and deduplicated
fn internal_links(doc: &Html, page_url: &Url, filter: &UrlFilter) -> BTreeSet<String> {
    let base = html::link_base(doc, page_url);
    html::links(doc)
        .iter()
        .filter_map(|href| crate::filter::normalize_url(&base, href))
        .filter(|u| matches!(u.scheme(), "http" | "https") && filter.is_same_origin(u))
        .map(|u| u.to_string())
        .collect()
}
