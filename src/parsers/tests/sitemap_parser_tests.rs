use crate::parsers::{robots, sitemap};
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlset_locs_are_pages() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc> https://ex.com/ </loc><lastmod>2024-01-01</lastmod></url>
          <url><loc>https://ex.com/search?q=a&amp;page=2</loc></url>
          <url><loc><![CDATA[https://ex.com/cdata]]></loc></url>
        </urlset>"#;

        let entries = sitemap::parse(xml).unwrap();
        assert_eq!(
            entries.pages,
            vec![
                "https://ex.com/",
                "https://ex.com/search?q=a&page=2",
                "https://ex.com/cdata"
            ]
        );
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn test_sitemap_index_locs_are_nested_sitemaps() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>https://ex.com/posts.xml</loc></sitemap>
          <sitemap><loc>https://ex.com/pages.xml</loc></sitemap>
        </sitemapindex>"#;

        let entries = sitemap::parse(xml).unwrap();
        assert!(entries.pages.is_empty());
        assert_eq!(
            entries.sitemaps,
            vec!["https://ex.com/posts.xml", "https://ex.com/pages.xml"]
        );
    }

    #[test]
    fn test_prefixed_namespace_is_accepted() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sm:url><sm:loc>https://ex.com/a</sm:loc></sm:url>
        </sm:urlset>"#;
        assert_eq!(sitemap::parse(xml).unwrap().pages, vec!["https://ex.com/a"]);
    }

    #[test]
    fn test_locs_outside_the_sitemap_namespace_are_ignored() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                             xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
          <url>
            <loc>https://ex.com/gallery</loc>
            <image:image><image:loc>https://ex.com/photo.jpg</image:loc></image:image>
          </url>
        </urlset>"#;
        let entries = sitemap::parse(xml).unwrap();
        assert_eq!(entries.pages, vec!["https://ex.com/gallery"]);
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://ex.com/a</url>
        </urlset>"#;
        let err = sitemap::parse(xml).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_truncated_document_is_rejected_whole() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>https://ex.com/a</loc></url><url><loc>https://ex.com/b"#;
        let err = sitemap::parse(xml).unwrap_err();
        assert_eq!(err.kind(), "parse");

        assert!(sitemap::parse("").is_err());
        assert!(sitemap::parse("   ").is_err());
    }

    #[test]
    fn test_robots_sitemap_directives() {
        let robots_url = Url::parse("https://ex.com/robots.txt").unwrap();
        let body = "User-agent: *\n\
                    Disallow: /private\n\
                    SITEMAP: /sitemap_index.xml\n\
                    sitemap: https://cdn.ex.com/extra.xml\n\
                    Sitemap: /sitemap_index.xml\n\
                    Sitemap:\n";
        assert_eq!(
            robots::sitemap_directives(body, &robots_url),
            vec![
                "https://ex.com/sitemap_index.xml",
                "https://cdn.ex.com/extra.xml"
            ]
        );
        assert!(robots::sitemap_directives("User-agent: *", &robots_url).is_empty());
    }
}
