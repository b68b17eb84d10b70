use url::Url;

/// Sitemap URLs declared in a robots.txt body.
///
/// Directive names are matched case-insensitively; relative paths are resolved
/// against the robots.txt URL. Duplicates are dropped, first occurrence wins.
pub fn sitemap_directives(body: &str, robots_url: &Url) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("sitemap") {
            continue;
        }

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match robots_url.join(value) {
            Ok(url) => {
                let url = url.to_string();
                if !found.contains(&url) {
                    found.push(url);
                }
            }
            Err(e) => ::log::debug!("Ignoring unusable sitemap directive {:?}: {}", value, e),
        }
    }

    found
}
