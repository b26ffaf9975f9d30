// Notification dispatch: one thread owns the listener slot and delivers
// operation events in the order they were issued
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use netcat_core::{OpKind, OpResult, State};
use tracing::debug;

/// Receiver of operation progress and outcomes.
///
/// Callbacks run on the dispatcher thread, never on the thread doing the I/O,
/// so a listener may issue further operations from inside a callback.
pub trait NetCatListener: Send + Sync {
    /// The operation was issued.
    fn started(&self, _op: OpKind) {}

    /// The session moved to `state` while `op` was running.
    fn progress(&self, _op: OpKind, _state: State) {}

    /// The operation ended without a failure cause.
    fn completed(&self, result: OpResult);

    /// The operation ended with a failure cause.
    fn failed(&self, result: OpResult);
}

pub(crate) enum Notice {
    Started(OpKind),
    Progress(OpKind, State),
    Finished(OpResult),
    Register(Option<Arc<dyn NetCatListener>>),
}

/// Sending side of the dispatcher, bound to one operation.
#[derive(Clone)]
pub(crate) struct TaskReporter {
    op: OpKind,
    notices: Sender<Notice>,
}

impl TaskReporter {
    pub fn new(op: OpKind, notices: Sender<Notice>) -> Self {
        TaskReporter { op, notices }
    }

    pub fn started(&self) {
        let _ = self.notices.send(Notice::Started(self.op));
    }

    pub fn progress(&self, state: State) {
        let _ = self.notices.send(Notice::Progress(self.op, state));
    }

    pub fn finish(&self, result: OpResult) {
        let _ = self.notices.send(Notice::Finished(result));
    }
}

pub(crate) fn spawn_dispatcher() -> io::Result<Sender<Notice>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("netcat-notify".to_string())
        .spawn(move || dispatcher_thread(rx))?;
    Ok(tx)
}

// Events issued while the slot is empty wait for the next listener
fn dispatcher_thread(notices: Receiver<Notice>) {
    let mut listener: Option<Arc<dyn NetCatListener>> = None;
    let mut pending: VecDeque<Notice> = VecDeque::new();

    for notice in notices {
        match notice {
            Notice::Register(next) => {
                listener = next;
                if let Some(l) = &listener {
                    while let Some(queued) = pending.pop_front() {
                        deliver(l.as_ref(), queued);
                    }
                }
            }
            other => match &listener {
                Some(l) => deliver(l.as_ref(), other),
                None => pending.push_back(other),
            },
        }
    }

    if !pending.is_empty() {
        debug!("Dropping {} undelivered notifications", pending.len());
    }
}

fn deliver(listener: &dyn NetCatListener, notice: Notice) {
    match notice {
        Notice::Started(op) => listener.started(op),
        Notice::Progress(op, state) => listener.progress(op, state),
        Notice::Finished(result) if result.is_success() => listener.completed(result),
        Notice::Finished(result) => listener.failed(result),
        Notice::Register(_) => {}
    }
}
