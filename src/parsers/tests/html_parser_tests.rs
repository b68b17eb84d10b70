use crate::parsers::html;
use scraper::Html;
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
      <head>
        <title>  Acme   Widgets </title>
        <meta name="Description" content=" Widgets for every occasion. ">
        <style>body { color: red; }</style>
      </head>
      <body>
        <h1>Widgets</h1>
        <h1>More widgets</h1>
        <p>Buy our widgets today.</p>
        <script>var tracking = "not words";</script>
        <img src="a.png" alt="A widget">
        <img src="b.png" alt="">
        <img src="c.png" alt="   ">
        <img src="d.png">
        <a href="/about">About</a>
        <a href="https://other.com/">Elsewhere</a>
        <a href="">Empty</a>
      </body>
    </html>"#;

    #[test]
    fn test_title_and_meta() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(html::title(&doc).as_deref(), Some("Acme Widgets"));
        assert_eq!(
            html::meta_description(&doc).as_deref(),
            Some("Widgets for every occasion.")
        );
    }

    #[test]
    fn test_missing_title_and_meta_are_none() {
        let doc = Html::parse_document("<html><head><title> </title></head><body></body></html>");
        assert_eq!(html::title(&doc), None);
        assert_eq!(html::meta_description(&doc), None);
    }

    #[test]
    fn test_counts() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(html::count(&doc, "h1"), Some(2));
        assert_eq!(html::images_without_alt(&doc), Some(3));
    }

    #[test]
    fn test_links_skip_empty_hrefs() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(html::links(&doc), vec!["/about", "https://other.com/"]);
    }

    #[test]
    fn test_body_text_ignores_scripts_and_styles() {
        let doc = Html::parse_document(PAGE);
        let text = html::body_text(&doc);
        assert_eq!(
            text,
            "Widgets More widgets Buy our widgets today. About Elsewhere Empty"
        );
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn test_link_base_honours_base_element() {
        let page_url = Url::parse("https://ex.com/blog/post").unwrap();
        let doc = Html::parse_document(r#"<html><head><base href="/docs/"></head></html>"#);
        assert_eq!(html::link_base(&doc, &page_url).as_str(), "https://ex.com/docs/");

        let doc = Html::parse_document("<html></html>");
        assert_eq!(html::link_base(&doc, &page_url), page_url);
    }

    #[test]
    fn test_sitemap_links_from_html_listing() {
        let listing = r#"<html><body>
            <a href="post-sitemap.xml">Posts</a>
            <a href="/page-sitemap.xml">Pages</a>
            <a href="/feed.rss">Feed</a>
        </body></html>"#;
        let url = Url::parse("https://ex.com/sitemaps/index").unwrap();
        assert_eq!(
            html::sitemap_links(listing, &url),
            vec![
                "https://ex.com/sitemaps/post-sitemap.xml",
                "https://ex.com/page-sitemap.xml"
            ]
        );
    }
}
