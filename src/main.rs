use clap::Parser;
use crawl_audit::analysis::AuditReport;
use crawl_audit::isolation::worker;
use crawl_audit::{Audit, CrawlError, Execution};
use std::process::ExitCode;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; env_logger writes to stderr, stdout carries results
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Some(Command::Worker) = args.command {
        return match worker::serve_stdio().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                ::log::error!("Worker stopped: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match audit(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn audit(args: &Args) -> crawl_audit::Result<()> {
    let url = args
        .url
        .clone()
        .ok_or_else(|| CrawlError::InvalidUrl("no URL given".to_string()))?;
    ::log::info!("Starting audit for URL: {}", url);

    eprintln!("Note: crawling requires a WebDriver server (e.g., ChromeDriver).");
    eprintln!("Set WEBDRIVER_URL if not using the default http://localhost:4444");

    let mut builder = Audit::new(url).with_max_depth(args.depth);
    if let Some(path) = &args.config {
        builder = builder.with_config_file(path)?;
    }
    if let Some(timeout) = args.timeout {
        builder = builder.with_total_timeout(timeout);
    }
    if args.in_process {
        builder = builder.with_execution(Execution::InProcess);
    }

    let start_time = std::time::Instant::now();
    let mut output = builder.run().await?;
    ::log::info!(
        "Crawling complete - {} pages in {:.2} seconds",
        output.pages.len(),
        start_time.elapsed().as_secs_f64()
    );

    if !args.select.is_empty() {
        output.retain_selected(&args.select);
        if output.pages.is_empty() {
            return Err(CrawlError::InvalidUrl(
                "none of the selected URLs were crawled".to_string(),
            ));
        }
    }

    let json = if args.discover {
        serde_json::to_string_pretty(&output.discovered())?
    } else if args.analyze {
        serde_json::to_string_pretty(&AuditReport::from_output(output))?
    } else {
        serde_json::to_string_pretty(&output)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            ::log::info!("Wrote results to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
