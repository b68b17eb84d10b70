use crate::parsers::text;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never reaches the reader
const HIDDEN_TEXT_PARENTS: [&str; 4] = ["script", "style", "noscript", "template"];

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Text of the `<title>` element, if present and not blank
pub fn title(doc: &Html) -> Option<String> {
    let sel = selector("title")?;
    doc.select(&sel)
        .next()
        .map(|e| text::normalize_whitespace_in_segment(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Content of `<meta name="description">`, if present and not blank
pub fn meta_description(doc: &Html) -> Option<String> {
    let sel = selector("meta[name]")?;
    doc.select(&sel)
        .find(|e| {
            e.value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|e| e.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Number of elements matching a CSS selector
pub fn count(doc: &Html, css: &str) -> Option<usize> {
    let sel = selector(css)?;
    Some(doc.select(&sel).count())
}

/// `<img>` elements with a missing or blank `alt`
pub fn images_without_alt(doc: &Html) -> Option<usize> {
    let sel = selector("img")?;
    Some(
        doc.select(&sel)
            .filter(|img| img.value().attr("alt").is_none_or(|alt| alt.trim().is_empty()))
            .count(),
    )
}

/// Raw `href` values of every anchor on the page
pub fn links(doc: &Html) -> Vec<String> {
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };
    let links: Vec<String> = doc
        .select(&sel)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    ::log::debug!("HTML parser found {} links", links.len());
    links
}

/// The URL relative links resolve against: `<base href>` if declared, else the page URL
pub fn link_base(doc: &Html, page_url: &Url) -> Url {
    selector("base[href]")
        .and_then(|sel| doc.select(&sel).next())
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Visible text of the body, skipping script and style content
pub fn body_text(doc: &Html) -> String {
    let Some(body) = selector("body").and_then(|sel| doc.select(&sel).next()) else {
        return String::new();
    };
    text::parse(&visible_text(body))
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_ascii_lowercase()))
            .is_some_and(|name| HIDDEN_TEXT_PARENTS.contains(&name.as_str()));
        if !hidden {
            out.push_str(fragment);
            out.push(' ');
        }
    }
    out
}

/// Links to `.xml` files in an HTML page, resolved against `page_url`.
///
/// Used when a server answers a sitemap request with an HTML listing.
pub fn sitemap_links(html: &str, page_url: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let base = link_base(&doc, page_url);
    links(&doc)
        .into_iter()
        .filter(|href| href.ends_with(".xml"))
        .filter_map(|href| base.join(&href).ok())
        .map(|u| u.to_string())
        .collect()
}
