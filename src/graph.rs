use crate::results::PageResult;
use std::collections::{BTreeMap, BTreeSet};

/// Forward links recorded during a crawl, from which backlinks are derived afterwards.
///
/// Edges are only recorded for pages that were fetched. The reverse map is built in
/// one pass once the crawl is over, so `linkedFrom` does not depend on fetch order.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outbound links of a fetched page
    pub fn record<'a>(&mut self, source: &str, targets: impl IntoIterator<Item = &'a String>) {
        self.forward
            .entry(source.to_string())
            .or_default()
            .extend(targets.into_iter().cloned());
    }

    pub fn outbound(&self, source: &str) -> Option<&BTreeSet<String>> {
        self.forward.get(source)
    }

    /// Target URL -> URLs linking to it, for every URL ever referenced
    pub fn backlinks(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut reverse: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (source, targets) in &self.forward {
            for target in targets {
                reverse
                    .entry(target.clone())
                    .or_default()
                    .insert(source.clone());
            }
        }
        reverse
    }

    /// Overwrite `linked_from` on every page with its referrers
    pub fn annotate(&self, pages: &mut [PageResult]) {
        let reverse = self.backlinks();
        for page in pages.iter_mut() {
            page.linked_from = reverse
                .get(&page.url)
                .map(|sources| sources.iter().cloned().collect())
                .unwrap_or_default();
        }
    }
}
