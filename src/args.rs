use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crawl-audit")]
#[command(about = "Crawls a site in a mobile browser and reports per-page SEO signals")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Args {
    /// Base URL to crawl (absolute http or https)
    #[arg(required = true)]
    pub url: Option<String>,

    /// How many links deep below the base URL to follow
    #[arg(short, long, default_value_t = 2)]
    pub depth: usize,

    /// Total timeout in seconds (maximum runtime), overrides the config file
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only list the crawled pages (url, status, title, depth, sitemap membership)
    #[arg(long, conflicts_with = "analyze")]
    pub discover: bool,

    /// Score every page and add a site summary
    #[arg(long)]
    pub analyze: bool,

    /// Keep only these URLs in the result
    #[arg(long, num_args = 1..)]
    pub select: Vec<String>,

    /// Crawl in this process instead of a supervised worker
    #[arg(long)]
    pub in_process: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve crawl jobs on stdin/stdout (used by the worker pool)
    #[command(hide = true)]
    Worker,
}
