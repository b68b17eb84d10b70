use crate::error::Result;
use crate::extraction::Extraction;
use async_trait::async_trait;

/// Loads one page and extracts its data.
///
/// `Err` means the page could not be loaded at all and is left out of the results.
/// A page that loads with an HTTP error status is still `Ok`, with a status-only result.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch(&mut self, url: &str, depth: usize) -> Result<Extraction>;

    /// Release whatever the fetcher holds (browser session, connections)
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
