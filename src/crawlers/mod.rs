pub mod browser;
pub mod crawler;
pub mod web;

pub use browser::{BrowserFetcher, BrowserSession};
pub use crawler::PageFetcher;
