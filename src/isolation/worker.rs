use crate::crawlers::BrowserSession;
use crate::crawlers::web;
use crate::error::{CrawlError, Result};
use crate::isolation::protocol::{CrawlJob, WorkerReply};
use crate::results::CrawlOutput;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};

/// Worker loop over this process's stdin and stdout
pub async fn serve_stdio() -> Result<()> {
    serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Answer crawl jobs read from `input` until it closes
pub async fn serve<R, W>(input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    serve_with(input, output, |job: CrawlJob, sessions| async move {
        web::run(&job.base_url, job.max_depth, &job.config, Some(sessions)).await
    })
    .await
}

/// Same as `serve`, with the crawl itself supplied by `runner`.
///
/// Each job runs in its own task, so an error or a panic becomes a `Failed`
/// reply and the loop keeps serving. Browser sessions the runner reports are
/// announced with a `BrowserOpened` line ahead of the job's reply.
pub async fn serve_with<R, W, F, Fut>(input: R, mut output: W, runner: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(CrawlJob, UnboundedSender<BrowserSession>) -> Fut,
    Fut: Future<Output = Result<CrawlOutput>> + Send + 'static,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<CrawlJob>(&line) {
            Ok(job) => run_job(job, &runner, &mut output).await?,
            Err(e) => {
                ::log::error!("Unreadable crawl job: {}", e);
                WorkerReply::failed(0, &CrawlError::from(e))
            }
        };

        write_reply(&mut output, &reply).await?;
    }

    ::log::debug!("Job input closed, worker exiting");
    Ok(())
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &WorkerReply) -> Result<()> {
    let mut encoded = serde_json::to_string(reply)?;
    encoded.push('\n');
    output.write_all(encoded.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

async fn run_job<W, F, Fut>(job: CrawlJob, runner: &F, output: &mut W) -> Result<WorkerReply>
where
    W: AsyncWrite + Unpin,
    F: Fn(CrawlJob, UnboundedSender<BrowserSession>) -> Fut,
    Fut: Future<Output = Result<CrawlOutput>> + Send + 'static,
{
    let id = job.id;
    ::log::info!("Worker starting job {} for {}", id, job.base_url);

    let (sessions, mut opened) = mpsc::unbounded_channel();
    let mut task = tokio::spawn(runner(job, sessions));
    let joined = loop {
        tokio::select! {
            Some(session) = opened.recv() => {
                ::log::debug!("Job {} opened browser session {}", id, session.session_id);
                write_reply(output, &WorkerReply::BrowserOpened { id, session }).await?;
            }
            joined = &mut task => break joined,
        }
    };
    while let Ok(session) = opened.try_recv() {
        write_reply(output, &WorkerReply::BrowserOpened { id, session }).await?;
    }

    Ok(match joined {
        Ok(Ok(output)) => {
            ::log::info!("Job {} finished with {} pages", id, output.pages.len());
            WorkerReply::Completed { id, output }
        }
        Ok(Err(e)) => {
            ::log::error!("Job {} failed: {}", id, e);
            WorkerReply::failed(id, &e)
        }
        Err(join_error) => {
            ::log::error!("Job {} aborted: {}", id, join_error);
            WorkerReply::Failed {
                id,
                kind: "panic".to_string(),
                message: join_error.to_string(),
            }
        }
    })
}
