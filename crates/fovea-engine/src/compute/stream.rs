use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::fence::{Fence, FenceValue};
use crate::error::{CompositorError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Ordered execution stream for compute work.
///
/// Jobs run one at a time on a dedicated worker thread, in the order they were
/// submitted. Each job completes a fence value; waiters block on the shared
/// [`Fence`] rather than on the data the job writes.
///
/// Dropping the stream drains the queue and joins the worker.
pub struct ComputeStream {
    label: String,

    /// Serializes value assignment with enqueueing so fence order equals queue order.
    submit: Mutex<Submitter>,

    fence: Arc<Fence>,
    worker: Option<JoinHandle<()>>,
}

struct Submitter {
    sender: Option<flume::Sender<(FenceValue, Job)>>,
    issued: u64,
}

impl ComputeStream {
    /// Starts a stream with its worker thread.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let (sender, receiver) = flume::unbounded::<(FenceValue, Job)>();
        let fence = Arc::new(Fence::new());

        let worker_fence = Arc::clone(&fence);
        let worker_label = label.clone();
        let worker = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                for (value, job) in receiver.iter() {
                    // The fence must advance even if a job panics, or waiters hang.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!(
                            "compute job {} on stream `{worker_label}` panicked",
                            value.get()
                        );
                    }
                    worker_fence.signal(value);
                }
                log::trace!("compute stream `{worker_label}` drained");
            })
            .map_err(|e| CompositorError::ComputeStream {
                label: label.clone(),
                reason: e.to_string(),
            })?;

        log::debug!("compute stream `{label}` started");

        Ok(Self {
            label,
            submit: Mutex::new(Submitter {
                sender: Some(sender),
                issued: 0,
            }),
            fence,
            worker: Some(worker),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueues `job` and returns the fence value that completes with it.
    pub fn submit<F>(&self, job: F) -> FenceValue
    where
        F: FnOnce() + Send + 'static,
    {
        let mut submit = self.submit.lock();
        submit.issued += 1;
        let value = FenceValue(submit.issued);

        let sent = match submit.sender.as_ref() {
            Some(sender) => sender.send((value, Box::new(job))).is_ok(),
            None => false,
        };

        if !sent {
            // Worker is gone; complete the value so nobody waits forever.
            log::error!("compute stream `{}` is closed; job {} dropped", self.label, value.get());
            self.fence.signal(value);
        }

        value
    }

    pub fn fence(&self) -> &Arc<Fence> {
        &self.fence
    }

    /// Value of the most recent submission.
    pub fn last_submitted(&self) -> FenceValue {
        FenceValue(self.submit.lock().issued)
    }

    /// Blocks until every submitted job has completed.
    pub fn synchronize(&self) {
        self.fence.wait(self.last_submitted());
    }

    pub fn is_idle(&self) -> bool {
        self.fence.is_complete(self.last_submitted())
    }
}

impl Drop for ComputeStream {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit.
        self.submit.get_mut().sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("compute stream `{}` worker panicked", self.label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn jobs_run_in_submission_order() {
        let stream = ComputeStream::new("test-order").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..16 {
            let log = Arc::clone(&log);
            stream.submit(move || {
                if i % 4 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                log.lock().push(i);
            });
        }
        stream.synchronize();

        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn fence_values_increase() {
        let stream = ComputeStream::new("test-values").unwrap();
        let a = stream.submit(|| {});
        let b = stream.submit(|| {});
        assert!(b > a);
        stream.fence().wait(b);
        assert!(stream.is_idle());
    }

    #[test]
    fn panicking_job_still_signals() {
        let stream = ComputeStream::new("test-panic").unwrap();
        let ran = Arc::new(AtomicU32::new(0));

        stream.submit(|| panic!("kernel fault"));
        let after = Arc::clone(&ran);
        let value = stream.submit(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });

        assert!(stream.fence().wait_timeout(value, Duration::from_secs(5)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_finishes_queued_work() {
        let ran = Arc::new(AtomicU32::new(0));
        {
            let stream = ComputeStream::new("test-drop").unwrap();
            for _ in 0..8 {
                let ran = Arc::clone(&ran);
                stream.submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(ran.load(Ordering::SeqCst), 8);
    }
}
