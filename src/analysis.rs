use crate::results::{CrawlOutput, PageResult};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};

/// Pages with fewer words than this are flagged as thin content
pub const LOW_WORD_COUNT_THRESHOLD: usize = 100;

/// Load time in seconds above which a page is flagged as slow
pub const SLOW_LOAD_SECONDS: f64 = 2.5;

/// Problems the analyzer can flag on a page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeoIssue {
    MissingTitle,
    DuplicateTitle,
    MissingMeta,
    DuplicateDescription,
    LowWordCount,
    H1CountMismatch(usize),
    ImagesMissingAlt,
    BrokenLink(u16),
    RedirectChain(usize),
    NotMobileFriendly,
    SlowLoad(f64),
}

impl SeoIssue {
    /// Tag written to reports, e.g. `brokenLink:404`
    pub fn tag(&self) -> String {
        match self {
            SeoIssue::MissingTitle => "missingTitle".to_string(),
            SeoIssue::DuplicateTitle => "duplicateTitle".to_string(),
            SeoIssue::MissingMeta => "missingMeta".to_string(),
            SeoIssue::DuplicateDescription => "duplicateDescription".to_string(),
            SeoIssue::LowWordCount => "lowWordCount".to_string(),
            SeoIssue::H1CountMismatch(count) => format!("h1CountMismatch:{count}"),
            SeoIssue::ImagesMissingAlt => "imagesMissingAlt".to_string(),
            SeoIssue::BrokenLink(status) => format!("brokenLink:{status}"),
            SeoIssue::RedirectChain(hops) => format!("redirectChain:{hops}"),
            SeoIssue::NotMobileFriendly => "notMobileFriendly".to_string(),
            SeoIssue::SlowLoad(seconds) => format!("slowLoad:{seconds:.2}s"),
        }
    }

    pub fn penalty(&self) -> u32 {
        match self {
            SeoIssue::MissingTitle => 30,
            SeoIssue::DuplicateTitle => 20,
            SeoIssue::MissingMeta => 20,
            SeoIssue::DuplicateDescription => 10,
            SeoIssue::LowWordCount => 10,
            SeoIssue::H1CountMismatch(_) => 10,
            SeoIssue::ImagesMissingAlt => 5,
            SeoIssue::BrokenLink(_) => 30,
            SeoIssue::RedirectChain(_) => 10,
            SeoIssue::NotMobileFriendly => 15,
            SeoIssue::SlowLoad(_) => 10,
        }
    }
}

impl Serialize for SeoIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

/// 100 minus the issues' penalties, never below 0
pub fn seo_score(issues: &[SeoIssue]) -> u8 {
    let penalty: u32 = issues.iter().map(SeoIssue::penalty).sum();
    100u32.saturating_sub(penalty) as u8
}

/// A crawled page with its issues and score
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPage {
    #[serde(flatten)]
    pub page: PageResult,
    pub issues: Vec<SeoIssue>,
    pub seo_score: u8,
}

/// Flags SEO issues on pages, using site-wide title and description counts
/// to detect duplicates
pub struct Analyzer {
    title_counts: HashMap<String, usize>,
    description_counts: HashMap<String, usize>,
}

impl Analyzer {
    pub fn new(pages: &[PageResult]) -> Self {
        let mut title_counts = HashMap::new();
        let mut description_counts = HashMap::new();
        for page in pages {
            if let Some(title) = non_blank(&page.title) {
                *title_counts.entry(title.to_string()).or_insert(0) += 1;
            }
            if let Some(description) = non_blank(&page.meta_description) {
                *description_counts.entry(description.to_string()).or_insert(0) += 1;
            }
        }
        Self {
            title_counts,
            description_counts,
        }
    }

    pub fn issues(&self, page: &PageResult) -> Vec<SeoIssue> {
        let mut issues = Vec::new();

        match non_blank(&page.title) {
            None => issues.push(SeoIssue::MissingTitle),
            Some(title) if self.title_counts.get(title).copied().unwrap_or(0) > 1 => {
                issues.push(SeoIssue::DuplicateTitle)
            }
            Some(_) => {}
        }

        match non_blank(&page.meta_description) {
            None => issues.push(SeoIssue::MissingMeta),
            Some(description)
                if self.description_counts.get(description).copied().unwrap_or(0) > 1 =>
            {
                issues.push(SeoIssue::DuplicateDescription)
            }
            Some(_) => {}
        }

        if page.word_count < LOW_WORD_COUNT_THRESHOLD {
            issues.push(SeoIssue::LowWordCount);
        }
        if page.h1_count != 1 {
            issues.push(SeoIssue::H1CountMismatch(page.h1_count));
        }
        if page.images_without_alt_count > 0 {
            issues.push(SeoIssue::ImagesMissingAlt);
        }
        if page.is_broken() {
            issues.push(SeoIssue::BrokenLink(page.http_status));
        }
        if page.redirect_chain.len() > 1 {
            issues.push(SeoIssue::RedirectChain(page.redirect_chain.len()));
        }
        if !page.has_viewport {
            issues.push(SeoIssue::NotMobileFriendly);
        }
        if page.load_time > SLOW_LOAD_SECONDS {
            issues.push(SeoIssue::SlowLoad(page.load_time));
        }

        issues
    }

    pub fn analyze(&self, page: PageResult) -> AnalyzedPage {
        let issues = self.issues(&page);
        let seo_score = seo_score(&issues);
        AnalyzedPage {
            page,
            issues,
            seo_score,
        }
    }

    /// Analyze every page, keeping their order
    pub fn run(pages: Vec<PageResult>) -> Vec<AnalyzedPage> {
        let analyzer = Analyzer::new(&pages);
        pages.into_iter().map(|page| analyzer.analyze(page)).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Site-level totals over analyzed pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub total_pages: usize,
    pub missing_titles: usize,
    pub low_word_count_pages: usize,
    pub broken_links: usize,
    /// Distinct titles shared by more than one page
    pub duplicate_titles: usize,
    /// Distinct descriptions shared by more than one page
    pub duplicate_descriptions: usize,
    pub redirect_chains: usize,
    pub mobile_friendly_pages: usize,
    pub non_mobile_pages: usize,
    pub pages_with_slow_load: usize,
    /// Sitemap URLs the crawl never reached
    pub orphan_pages: usize,
    pub average_seo_score: u8,
}

pub fn summarize(
    pages: &[AnalyzedPage],
    sitemap_urls: &BTreeSet<String>,
    crawled_urls: &BTreeSet<String>,
) -> CrawlSummary {
    let count = |matches: fn(&SeoIssue) -> bool| {
        pages
            .iter()
            .filter(|p| p.issues.iter().any(matches))
            .count()
    };

    let duplicate_titles: BTreeSet<&str> = pages
        .iter()
        .filter(|p| p.issues.contains(&SeoIssue::DuplicateTitle))
        .filter_map(|p| non_blank(&p.page.title))
        .collect();
    let duplicate_descriptions: BTreeSet<&str> = pages
        .iter()
        .filter(|p| p.issues.contains(&SeoIssue::DuplicateDescription))
        .filter_map(|p| non_blank(&p.page.meta_description))
        .collect();

    let mobile_friendly_pages = pages.iter().filter(|p| p.page.has_viewport).count();

    let average_seo_score = if pages.is_empty() {
        100
    } else {
        let total: u32 = pages.iter().map(|p| u32::from(p.seo_score)).sum();
        (f64::from(total) / pages.len() as f64).round() as u8
    };

    CrawlSummary {
        total_pages: pages.len(),
        missing_titles: count(|i| matches!(i, SeoIssue::MissingTitle)),
        low_word_count_pages: count(|i| matches!(i, SeoIssue::LowWordCount)),
        broken_links: count(|i| matches!(i, SeoIssue::BrokenLink(_))),
        duplicate_titles: duplicate_titles.len(),
        duplicate_descriptions: duplicate_descriptions.len(),
        redirect_chains: count(|i| matches!(i, SeoIssue::RedirectChain(_))),
        mobile_friendly_pages,
        non_mobile_pages: pages.len() - mobile_friendly_pages,
        pages_with_slow_load: count(|i| matches!(i, SeoIssue::SlowLoad(_))),
        orphan_pages: sitemap_urls.difference(crawled_urls).count(),
        average_seo_score,
    }
}

/// Analyzed pages plus their summary, as written by the CLI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub pages: Vec<AnalyzedPage>,
    pub summary: CrawlSummary,
}

impl AuditReport {
    pub fn from_output(output: CrawlOutput) -> Self {
        let crawled_urls = output.crawled_urls();
        let pages = Analyzer::run(output.pages);
        let summary = summarize(&pages, &output.sitemap_urls, &crawled_urls);
        Self { pages, summary }
    }
}
