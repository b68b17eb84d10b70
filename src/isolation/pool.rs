use crate::crawlers::BrowserSession;
use crate::error::{CrawlError, Result};
use crate::isolation::protocol::{CrawlJob, WorkerReply};
use crate::results::CrawlOutput;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;

/// How long a worker gets to exit on its own after its stdin is closed
const GRACEFUL_EXIT: Duration = Duration::from_secs(2);

/// Program and arguments that start one worker process
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new<I, A>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// This binary's hidden `worker` subcommand
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, ["worker"]))
    }

    fn spawn(&self) -> Result<Worker> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let missing = |pipe: &str| CrawlError::ProcessCrash {
            job: 0,
            message: format!("worker started without {pipe}"),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        ::log::debug!("Spawned worker {:?} (pid {:?})", self.program, child.id());
        Ok(Worker {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            browser: None,
        })
    }
}

/// A live worker process and its protocol pipes
struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Browser session of the job in flight, until the worker replies
    browser: Option<BrowserSession>,
}

impl Worker {
    /// Send one job and read lines until its final reply
    async fn exchange(&mut self, job: &CrawlJob) -> Result<WorkerReply> {
        let mut line = serde_json::to_string(job)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let mut reply = String::new();
            if self.stdout.read_line(&mut reply).await? == 0 {
                let status = self.child.try_wait().ok().flatten();
                return Err(CrawlError::ProcessCrash {
                    job: job.id,
                    message: match status {
                        Some(status) => format!("worker exited ({status}) without replying"),
                        None => "worker closed its output without replying".to_string(),
                    },
                });
            }

            let reply: WorkerReply =
                serde_json::from_str(reply.trim()).map_err(|e| CrawlError::ProcessCrash {
                    job: job.id,
                    message: format!("unreadable reply: {e}"),
                })?;
            if reply.id() != job.id {
                return Err(CrawlError::ProcessCrash {
                    job: job.id,
                    message: format!("reply for job {} instead of {}", reply.id(), job.id),
                });
            }

            match reply {
                WorkerReply::BrowserOpened { session, .. } => {
                    ::log::debug!("Job {} runs in browser session {}", job.id, session.session_id);
                    self.browser = Some(session);
                }
                reply => {
                    self.browser = None;
                    return Ok(reply);
                }
            }
        }
    }

    /// Force-kill and reap
    async fn kill(mut self) {
        if let Err(e) = self.child.kill().await {
            ::log::warn!("Failed to kill worker {:?}: {}", self.child.id(), e);
        }
    }

    /// Close stdin so the worker can exit, killing it if it does not
    async fn stop(self) {
        let Worker {
            mut child,
            stdin,
            stdout,
            ..
        } = self;
        drop(stdin);
        drop(stdout);

        match timeout(GRACEFUL_EXIT, child.wait()).await {
            Ok(Ok(status)) => ::log::debug!("Worker exited with {}", status),
            Ok(Err(e)) => ::log::warn!("Failed to wait for worker: {}", e),
            Err(_) => {
                ::log::warn!("Worker did not exit after stdin closed, killing it");
                let _ = child.kill().await;
            }
        }
    }
}

/// A bounded set of long-lived crawl worker processes.
///
/// Each worker handles one job at a time. A worker that times out, dies or
/// answers garbage is killed and reaped; its slot gets a fresh worker on the
/// next job.
pub struct WorkerPool {
    command: WorkerCommand,
    slots: Semaphore,
    idle: Mutex<Vec<Worker>>,
    live: AtomicUsize,
}

impl WorkerPool {
    pub fn new(command: WorkerCommand, size: usize) -> Self {
        let size = size.max(1);
        ::log::debug!("Worker pool with {} slot(s)", size);
        Self {
            command,
            slots: Semaphore::new(size),
            idle: Mutex::new(Vec::with_capacity(size)),
            live: AtomicUsize::new(0),
        }
    }

    /// Run one crawl job in a worker, bounded by `deadline`.
    ///
    /// Exactly one outcome is delivered: the worker's output, its reported failure,
    /// or `ProcessTimeout`/`ProcessCrash` after the worker has been terminated.
    pub async fn run(&self, job: CrawlJob, deadline: Duration) -> Result<CrawlOutput> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| CrawlError::ProcessCrash {
                job: job.id,
                message: "worker pool is closed".to_string(),
            })?;

        let mut worker = self.checkout().await?;
        ::log::info!("Running crawl job {} for {}", job.id, job.base_url);

        match timeout(deadline, worker.exchange(&job)).await {
            Ok(Ok(reply)) => {
                self.idle.lock().await.push(worker);
                reply.into_result()
            }
            Ok(Err(e)) => {
                ::log::error!("Worker failed on job {}: {}", job.id, e);
                self.retire(worker).await;
                Err(match e {
                    CrawlError::ProcessCrash { .. } => e,
                    other => CrawlError::ProcessCrash {
                        job: job.id,
                        message: other.to_string(),
                    },
                })
            }
            Err(_) => {
                ::log::error!(
                    "Crawl job {} exceeded {}s, terminating worker",
                    job.id,
                    deadline.as_secs()
                );
                self.retire(worker).await;
                Err(CrawlError::ProcessTimeout {
                    job: job.id,
                    deadline,
                })
            }
        }
    }

    /// Run several jobs across the pool's workers, returning outcomes in job order
    pub async fn run_all(
        self: Arc<Self>,
        jobs: Vec<CrawlJob>,
        deadline: Duration,
    ) -> Vec<Result<CrawlOutput>> {
        let ids: Vec<u64> = jobs.iter().map(|job| job.id).collect();
        let mut tasks = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let pool = Arc::clone(&self);
            tasks.spawn(async move { (index, pool.run(job, deadline).await) });
        }

        let mut outcomes: Vec<Option<Result<CrawlOutput>>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => ::log::error!("Supervisor task failed: {}", e),
            }
        }

        outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, job)| {
                outcome.unwrap_or_else(|| {
                    Err(CrawlError::ProcessCrash {
                        job,
                        message: "supervisor task failed".to_string(),
                    })
                })
            })
            .collect()
    }

    /// Worker processes currently alive
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Stop every idle worker
    pub async fn shutdown(&self) {
        let workers: Vec<Worker> = self.idle.lock().await.drain(..).collect();
        for worker in workers {
            worker.stop().await;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn checkout(&self) -> Result<Worker> {
        if let Some(worker) = self.idle.lock().await.pop() {
            return Ok(worker);
        }
        let worker = self.command.spawn()?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(worker)
    }

    /// Kill a worker that cannot be trusted with another job, then close the
    /// browser session it left behind
    async fn retire(&self, mut worker: Worker) {
        let browser = worker.browser.take();
        worker.kill().await;
        self.live.fetch_sub(1, Ordering::SeqCst);

        if let Some(session) = browser {
            ::log::info!("Closing browser session {} of terminated worker", session.session_id);
            if let Err(e) = session.close().await {
                ::log::warn!("Browser session {} may still be open: {}", session.session_id, e);
            }
        }
    }
}

/// Run a single crawl in a fresh worker process of this binary
pub async fn run_isolated(job: CrawlJob, deadline: Duration) -> Result<CrawlOutput> {
    run_isolated_with(WorkerCommand::current_exe()?, job, deadline).await
}

/// Run a single crawl in a fresh worker started by `command`
pub async fn run_isolated_with(
    command: WorkerCommand,
    job: CrawlJob,
    deadline: Duration,
) -> Result<CrawlOutput> {
    let pool = WorkerPool::new(command, 1);
    let outcome = pool.run(job, deadline).await;
    pool.shutdown().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMPLETED: &str = r#"{"status":"completed","id":7,"output":{"pages":[],"sitemapUrls":["https://ex.com/a"]}}"#;

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommand::new("sh", ["-c", script])
    }

    fn job(id: u64) -> CrawlJob {
        CrawlJob::new(id, "https://ex.com", 1, CrawlerConfig::default())
    }

    fn process_exists(pid: &str) -> bool {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Announces a browser session on `server` for job 1, then runs `rest`
    fn browser_worker(server: &MockServer, rest: &str) -> WorkerCommand {
        let opened = format!(
            r#"{{"status":"browserOpened","id":1,"session":{{"webdriverUrl":"{}","sessionId":"s-9"}}}}"#,
            server.uri()
        );
        sh(&format!("read line; echo '{opened}'; {rest}"))
    }

    async fn expect_session_delete(server: &MockServer, times: u64) {
        Mock::given(method("DELETE"))
            .and(path("/session/s-9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_unresponsive_worker_is_terminated_at_deadline() {
        let pid_file = tempfile::NamedTempFile::new().unwrap();
        let script = format!("echo $$ > {}; exec cat > /dev/null", pid_file.path().display());
        let pool = WorkerPool::new(sh(&script), 1);
        let started = Instant::now();

        let err = pool.run(job(1), Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, CrawlError::ProcessTimeout { job: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(pool.live_workers(), 0);

        let pid = std::fs::read_to_string(pid_file.path()).unwrap();
        let pid = pid.trim();
        assert!(!pid.is_empty());
        assert!(!process_exists(pid), "worker {pid} still running");
    }

    #[tokio::test]
    async fn test_timed_out_worker_browser_session_is_closed() {
        let server = MockServer::start().await;
        expect_session_delete(&server, 1).await;

        let pool = WorkerPool::new(browser_worker(&server, "exec cat > /dev/null"), 1);
        let err = pool.run(job(1), Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, CrawlError::ProcessTimeout { job: 1, .. }));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_crashed_worker_browser_session_is_closed() {
        let server = MockServer::start().await;
        expect_session_delete(&server, 1).await;

        let pool = WorkerPool::new(browser_worker(&server, "exit 1"), 1);
        let err = pool.run(job(1), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CrawlError::ProcessCrash { job: 1, .. }));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_replying_worker_session_is_left_to_the_worker() {
        let server = MockServer::start().await;
        expect_session_delete(&server, 0).await;

        let reply = r#"{"status":"completed","id":1,"output":{"pages":[],"sitemapUrls":[]}}"#;
        let rest = format!("echo '{reply}'; cat > /dev/null");
        let pool = WorkerPool::new(browser_worker(&server, &rest), 1);
        assert!(pool.run(job(1), Duration::from_secs(5)).await.is_ok());

        pool.shutdown().await;
        server.verify().await;
    }

    #[tokio::test]
    async fn test_worker_is_reused_between_jobs() {
        let script = format!("while read line; do echo '{COMPLETED}'; done");
        let pool = WorkerPool::new(sh(&script), 1);

        for _ in 0..2 {
            let output = pool.run(job(7), Duration::from_secs(5)).await.unwrap();
            assert!(output.sitemap_urls.contains("https://ex.com/a"));
            assert_eq!(pool.live_workers(), 1);
        }

        pool.shutdown().await;
        assert_eq!(pool.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_jobs_spread_over_bounded_workers() {
        // answers each job with its own id
        let script = r#"while read line; do
            id=$(printf '%s' "$line" | sed 's/^{"id":\([0-9]*\).*/\1/')
            printf '{"status":"completed","id":%s,"output":{"pages":[],"sitemapUrls":[]}}\n' "$id"
        done"#;
        let pool = Arc::new(WorkerPool::new(sh(script), 2));

        let outcomes = Arc::clone(&pool)
            .run_all(vec![job(11), job(12), job(13)], Duration::from_secs(5))
            .await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert!(pool.live_workers() <= 2);

        pool.shutdown().await;
        assert_eq!(pool.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_worker_exit_is_a_crash() {
        let pool = WorkerPool::new(sh("read line; exit 3"), 1);
        let err = pool.run(job(2), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CrawlError::ProcessCrash { job: 2, .. }));
        assert_eq!(pool.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_garbage_reply_is_a_crash() {
        let pool = WorkerPool::new(sh("read line; echo not-json; sleep 30"), 1);
        let err = pool.run(job(3), Duration::from_secs(5)).await.unwrap_err();
        match err {
            CrawlError::ProcessCrash { job, message } => {
                assert_eq!(job, 3);
                assert!(message.contains("unreadable reply"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pool.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_reported_failure_is_passed_through() {
        let script = r#"read line; echo '{"status":"failed","id":5,"kind":"webdriver","message":"no browser"}'; cat > /dev/null"#;
        let err = run_isolated_with(sh(script), job(5), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CrawlError::WorkerFailed { kind, message } => {
                assert_eq!(kind, "webdriver");
                assert_eq!(message, "no browser");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_worker_program_fails_to_spawn() {
        let command = WorkerCommand::new("/nonexistent/crawl-worker", Vec::<String>::new());
        let err = run_isolated_with(command, job(6), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Io(_)));
    }
}
