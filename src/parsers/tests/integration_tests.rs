use crate::parsers::{Parser, ParserType};
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_type_from_content_type() {
        let types = [
            ("application/xml", ParserType::Xml),
            ("text/xml; charset=UTF-8", ParserType::Xml),
            ("Text/HTML", ParserType::Html),
            ("application/xhtml+xml", ParserType::Xml),
            ("text/plain", ParserType::Other),
            ("", ParserType::Other),
        ];

        for (content_type, expected) in types {
            assert_eq!(
                ParserType::from_content_type(content_type),
                expected,
                "content type {:?}",
                content_type
            );
        }
    }

    #[test]
    fn test_parse_sitemap_dispatches_on_content_type() {
        let url = Url::parse("https://ex.com/sitemap.xml").unwrap();

        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>https://ex.com/a</loc></url></urlset>"#;
        let entries = Parser::parse_sitemap(xml, "application/xml", &url).unwrap();
        assert_eq!(entries.pages, vec!["https://ex.com/a"]);

        let html = r#"<html><body><a href="/child.xml">child</a></body></html>"#;
        let entries = Parser::parse_sitemap(html, "text/html", &url).unwrap();
        assert!(entries.pages.is_empty());
        assert_eq!(entries.sitemaps, vec!["https://ex.com/child.xml"]);

        let entries = Parser::parse_sitemap("https://ex.com/a", "text/plain", &url).unwrap();
        assert!(entries.pages.is_empty() && entries.sitemaps.is_empty());
    }
}
