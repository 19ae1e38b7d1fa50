//! Concurrent service runner with graceful shutdown.
//!
//! Spawns long-running processes, cancels them all on SIGTERM/SIGINT or
//! on the first process failure, then runs cleanup closers under a
//! bounded timeout. `run` returns the first process error so `main`
//! decides the exit code.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process. Receives a cancellation token and is expected
/// to return promptly once it fires.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Cleanup run after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            token: CancellationToken::new(),
        }
    }

    pub fn with_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes.push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Adds an already-boxed process, as produced by worker
    /// `into_runner_processes` helpers.
    pub fn with_boxed_process(mut self, process: AppProcess) -> Self {
        self.processes.push(process);
        self
    }

    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Overrides the internal cancellation token, for callers that need
    /// to trigger shutdown themselves (tests, embedded use).
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Runs everything to completion and returns the first process error,
    /// if any. Closers always run, even when a process failed.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.token;
        let mut join_set = JoinSet::new();

        for process in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { process(process_token).await });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("process completed"),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        error!(error = %e, "process failed, shutting down");
                        first_error = Some(e);
                    }
                    token.cancel();
                }
                Err(e) => {
                    error!(error = %e, "process panicked, shutting down");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", e));
                    }
                    token.cancel();
                }
            }
        }

        if !self.closers.is_empty() {
            info!(timeout_secs = self.closer_timeout.as_secs(), "running closers");
            if tokio::time::timeout(self.closer_timeout, run_closers(self.closers))
                .await
                .is_err()
            {
                error!("closers timed out");
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("runner stopped cleanly");
                Ok(())
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received interrupt signal");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "failed to install interrupt handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("closer completed"),
            Ok(Err(e)) => error!(error = %e, "closer failed"),
            Err(e) => error!(error = %e, "closer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_cancels_siblings_and_runs_closers() {
        let closer_runs = Arc::new(AtomicUsize::new(0));
        let closer_runs_clone = Arc::clone(&closer_runs);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = Runner::new()
            .with_cancellation_token(token)
            .with_process(|ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_process(|ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(move || {
                let runs = Arc::clone(&closer_runs_clone);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_closer_timeout(Duration::from_secs(1))
            .run()
            .await;

        assert!(result.is_ok());
        assert_eq!(closer_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_returns_first_process_error() {
        let closer_runs = Arc::new(AtomicUsize::new(0));
        let closer_runs_clone = Arc::clone(&closer_runs);

        let result = Runner::new()
            .with_process(|_ctx| async move { Err(anyhow::anyhow!("boom")) })
            .with_process(|ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(move || {
                let runs = Arc::clone(&closer_runs_clone);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), "boom");
        // Closers still ran despite the failure.
        assert_eq!(closer_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_with_no_processes_exits_immediately() {
        let result = Runner::new().run().await;
        assert!(result.is_ok());
    }
}
