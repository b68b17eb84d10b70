//! Runs whole crawls in separate worker processes under a hard deadline.
//!
//! The parent talks to each worker over newline-delimited JSON: one `CrawlJob`
//! line on the worker's stdin, then `WorkerReply` lines back on its stdout. A
//! `BrowserOpened` notice may come before the final reply so that the parent
//! can close the browser session of a worker it had to kill.

pub mod pool;
pub mod protocol;
pub mod worker;

pub use pool::{WorkerCommand, WorkerPool, run_isolated, run_isolated_with};
pub use protocol::{CrawlJob, WorkerReply};
