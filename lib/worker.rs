// Operation scheduling: a process-wide serial worker and an unbounded thread-per-op pool
use std::io;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use netcat_core::{Dispatch, OpKind};
use once_cell::sync::Lazy;
use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct SerialWorker {
    jobs: Option<Sender<Job>>,
}

impl SerialWorker {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        let spawned = thread::Builder::new()
            .name("netcat-serial".to_string())
            .spawn(move || Self::worker_thread(rx));

        match spawned {
            Ok(_) => SerialWorker { jobs: Some(tx) },
            Err(e) => {
                error!("Failed to spawn serial worker: {}", e);
                SerialWorker { jobs: None }
            }
        }
    }

    // Jobs run strictly one after another, in submission order
    fn worker_thread(jobs: Receiver<Job>) {
        for job in jobs {
            job();
        }
    }

    fn submit(&self, job: Job) -> io::Result<()> {
        let unavailable = || io::Error::new(io::ErrorKind::Other, "serial worker is not running");
        self.jobs
            .as_ref()
            .ok_or_else(unavailable)?
            .send(job)
            .map_err(|_| unavailable())
    }
}

// Shared by every executor in the process, initialized on first use
static SERIAL_WORKER: Lazy<SerialWorker> = Lazy::new(SerialWorker::new);

/// Run `job` on the serial worker or on a thread of its own.
pub(crate) fn submit<F>(dispatch: Dispatch, op: OpKind, job: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    match dispatch {
        Dispatch::Serial => SERIAL_WORKER.submit(Box::new(job)),
        Dispatch::Parallel => thread::Builder::new()
            .name(format!("netcat-{}", op.to_string().to_lowercase()))
            .spawn(job)
            .map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::time::Duration;

    #[test]
    fn serial_jobs_keep_submission_order() {
        let (tx, rx) = unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            submit(Dispatch::Serial, OpKind::Send, move || {
                let _ = tx.send(i);
            })
            .unwrap();
        }
        let seen: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn parallel_jobs_do_not_wait_for_each_other() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded(1);

        // The first job blocks until the second one has run
        submit(Dispatch::Parallel, OpKind::Receive, move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        })
        .unwrap();
        submit(Dispatch::Parallel, OpKind::Listen, move || {
            let _ = release_tx.send(());
            let _ = done_tx.send(());
        })
        .unwrap();

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
