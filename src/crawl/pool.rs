use std::{
    any::Any,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam::queue::SegQueue;
use futures::FutureExt as _;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::cancel::CancelToken;
use crate::{
    Error, ErrorContext, ErrorDetail,
    progress::{EntryStatus, ProgressReporter},
};

pub(super) trait Job: Send + 'static {
    /// Name shown in progress output and logs.
    fn label(&self) -> String;
}

/// Result of a drained pool.
pub(super) struct Outcome {
    pub written: Vec<PathBuf>,
    pub skipped: usize,
    pub first_error: Option<Error>,
}

struct Shared {
    cancel: CancelToken,
    fail_fast: bool,
    reporter: Arc<dyn ProgressReporter>,
    written: SegQueue<PathBuf>,
    skipped: AtomicUsize,
    errors: async_channel::Sender<Error>,
}

impl Shared {
    fn skip(&self, label: &str) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.reporter.update_entry(label, EntryStatus::Skipped);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Fixed set of workers fed through a bounded queue.
///
/// Submitting waits while the queue is full. Workers only report failures;
/// the first one reported is returned by [`Pool::join`]. A panicking job
/// counts as a failed one.
pub(super) struct Pool<J> {
    queue: async_channel::Sender<J>,
    workers: JoinSet<()>,
    errors: async_channel::Receiver<Error>,
    shared: Arc<Shared>,
}

impl<J: Job> Pool<J> {
    pub fn spawn<H, F>(
        concurrency: usize,
        fail_fast: bool,
        cancel: CancelToken,
        reporter: Arc<dyn ProgressReporter>,
        handler: H,
    ) -> Self
    where
        H: Fn(J) -> F + Send + Sync + 'static,
        F: Future<Output = Result<PathBuf, Error>> + Send + 'static,
    {
        let concurrency = concurrency.max(1);
        let (queue, jobs) = async_channel::bounded::<J>(concurrency);
        let (error_tx, errors) = async_channel::unbounded();
        let shared = Arc::new(Shared {
            cancel,
            fail_fast,
            reporter,
            written: SegQueue::new(),
            skipped: AtomicUsize::new(0),
            errors: error_tx,
        });
        let handler = Arc::new(handler);

        let mut workers = JoinSet::new();
        for worker in 0..concurrency {
            let jobs = jobs.clone();
            let shared = shared.clone();
            let handler = handler.clone();
            workers.spawn(async move {
                while let Ok(job) = jobs.recv().await {
                    let label = job.label();
                    if shared.cancel.is_cancelled() {
                        shared.skip(&label);
                        continue;
                    }
                    shared
                        .reporter
                        .update_entry(&label, EntryStatus::Processing);
                    let run = AssertUnwindSafe(handler(job)).catch_unwind();
                    let outcome = tokio::select! {
                        biased;
                        result = run => Some(result.unwrap_or_else(|payload| {
                            Err(ErrorContext::new(&label).error(ErrorDetail::Panicked(
                                panic_message(&*payload).to_owned(),
                            )))
                        })),
                        _ = shared.cancel.cancelled() => None,
                    };
                    match outcome {
                        Some(Ok(path)) => {
                            shared.written.push(path);
                            shared.reporter.update_entry(&label, EntryStatus::Done);
                        }
                        Some(Err(e)) => {
                            error!(%e, worker, entry = %label, "job failed");
                            shared
                                .reporter
                                .update_entry(&label, EntryStatus::Failed(e.to_string()));
                            let _ = shared.errors.try_send(e);
                            if shared.fail_fast {
                                shared.cancel.cancel();
                            }
                        }
                        None => shared.skip(&label),
                    }
                }
                debug!(worker, "worker finished");
            });
        }

        Self {
            queue,
            workers,
            errors,
            shared,
        }
    }

    /// Queue a job. Returns `false` once the pool no longer accepts work.
    pub async fn submit(&self, job: J) -> bool {
        let label = job.label();
        self.shared.reporter.add_entry(&label);
        self.shared
            .reporter
            .update_entry(&label, EntryStatus::Queued);
        self.queue.send(job).await.is_ok()
    }

    /// Close the queue and wait for every worker to drain it.
    pub async fn join(mut self) -> Outcome {
        self.queue.close();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(%e, "worker panicked");
            }
        }

        let mut first_error = None;
        while let Ok(e) = self.errors.try_recv() {
            if first_error.is_none() {
                first_error = Some(e);
            } else {
                debug!(%e, "discard later failure");
            }
        }

        let mut written = Vec::with_capacity(self.shared.written.len());
        while let Some(path) = self.shared.written.pop() {
            written.push(path);
        }
        written.sort();
        Outcome {
            written,
            skipped: self.shared.skipped.load(Ordering::Relaxed),
            first_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use super::{Job, Pool};
    use crate::{
        ErrorContext, ErrorDetail, crawl::cancel::CancelToken, progress::NullReporter,
    };

    struct Numbered(usize);

    impl Job for Numbered {
        fn label(&self) -> String {
            self.0.to_string()
        }
    }

    fn spawn(concurrency: usize, fail_fast: bool) -> Pool<Numbered> {
        Pool::spawn(
            concurrency,
            fail_fast,
            CancelToken::new(),
            Arc::new(NullReporter),
            |Numbered(n)| async move {
                if n % 3 == 0 {
                    Err(ErrorContext::new(n.to_string())
                        .error(ErrorDetail::Validation("multiple of three".into())))
                } else {
                    Ok(PathBuf::from(format!("{n}.md")))
                }
            },
        )
    }

    #[tokio::test]
    async fn collects_outputs_and_first_error() {
        let pool = spawn(1, false);
        for n in 1..=7 {
            assert!(pool.submit(Numbered(n)).await);
        }
        let outcome = pool.join().await;
        assert_eq!(outcome.written.len(), 5);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.first_error.unwrap().context.token, "3");
    }

    #[tokio::test]
    async fn fail_fast_skips_the_rest() {
        let pool = spawn(1, true);
        for n in 1..=5 {
            pool.submit(Numbered(n)).await;
        }
        let outcome = pool.join().await;
        assert_eq!(
            outcome.written,
            [PathBuf::from("1.md"), PathBuf::from("2.md")]
        );
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.first_error.unwrap().context.token, "3");
    }

    #[tokio::test]
    async fn panicking_job_is_reported_as_a_failure() {
        let pool = Pool::spawn(
            2,
            false,
            CancelToken::new(),
            Arc::new(NullReporter),
            |Numbered(n)| async move {
                if n == 2 {
                    panic!("broken job {n}");
                }
                Ok(PathBuf::from(format!("{n}.md")))
            },
        );
        for n in 1..=4 {
            assert!(pool.submit(Numbered(n)).await);
        }
        let outcome = pool.join().await;
        assert_eq!(
            outcome.written,
            [PathBuf::from("1.md"), PathBuf::from("3.md"), PathBuf::from("4.md")]
        );
        let error = outcome.first_error.unwrap();
        assert_eq!(error.context.token, "2");
        assert!(matches!(&*error.detail, ErrorDetail::Panicked(msg) if msg == "broken job 2"));
    }

    #[tokio::test]
    async fn finished_job_wins_over_a_late_cancel() {
        let cancel = CancelToken::new();
        let pool = Pool::spawn(1, true, cancel.clone(), Arc::new(NullReporter), {
            let cancel = cancel.clone();
            move |Numbered(n)| {
                let cancel = cancel.clone();
                async move {
                    cancel.cancel();
                    Ok(PathBuf::from(format!("{n}.md")))
                }
            }
        });
        assert!(pool.submit(Numbered(1)).await);
        let outcome = pool.join().await;
        assert_eq!(outcome.written, [PathBuf::from("1.md")]);
        assert_eq!(outcome.skipped, 0);
    }
}
