//! Tokio runtime ownership and crawl-wide cancellation.
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct StorecrawlHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct StorecrawlRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl StorecrawlRuntime {
    /// Build a multi-thread runtime with its own cancellation token.
    ///
    /// ```
    /// use storecrawl_runtime::StorecrawlRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = StorecrawlRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// ```
    /// use storecrawl_runtime::StorecrawlRuntime;
    ///
    /// let runtime = StorecrawlRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert!(!handle.cancellation().is_cancelled());
    /// ```
    pub fn handle(&self) -> StorecrawlHandle {
        StorecrawlHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel the token on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        info!(target: "runtime", "interrupt received, cancelling crawl");
                        cancel.cancel();
                    }
                    Err(e) => warn!(target: "runtime", error = %e, "cannot listen for Ctrl-C"),
                },
            }
        })
    }

    /// Cancel outstanding work and shut the runtime down.
    ///
    /// ```
    /// use storecrawl_runtime::StorecrawlRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = StorecrawlRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let listener = runtime.cancel_on_ctrl_c();
    /// runtime.shutdown(Duration::from_millis(5));
    /// drop(listener);
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl StorecrawlHandle {
    /// ```
    /// use storecrawl_runtime::StorecrawlRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = StorecrawlRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let task = runtime.handle().spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Token shared by every task of this runtime.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_cancels_handles() {
        let runtime = StorecrawlRuntime::build("test-runtime", Some(1)).unwrap();
        let cancel = runtime.handle().cancellation();
        assert!(!cancel.is_cancelled());
        runtime.shutdown(Duration::from_millis(5));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn spawned_task_observes_cancellation() {
        let runtime = StorecrawlRuntime::build("test-cancel", Some(1)).unwrap();
        let handle = runtime.handle();
        let cancel = handle.cancellation();
        let task = handle.spawn({
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                "stopped"
            }
        });
        cancel.cancel();
        let outcome = runtime.block_on(async move { task.await.unwrap() });
        assert_eq!(outcome, "stopped");
        runtime.shutdown(Duration::from_millis(5));
    }
}
