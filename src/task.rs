//! Background workers with an ordered update channel
//!
//! Every long-running operation executes on its own worker thread; the
//! initiating thread receives a [`Task`] handle immediately and polls it.
//! Updates arrive in the exact order the worker produced them. The caller
//! never blocks unless it chooses to [`Task::wait`], and a worker failure -
//! returned error or panic - is captured and re-raised on the joining
//! thread, never silently dropped.
//!
//! ## Example
//!
//! ```rust
//! use snapvault::progress::Update;
//! use snapvault::task;
//!
//! let task = task::spawn(|updates| {
//!     updates.send(Update::status("working")).ok();
//!     Ok::<_, snapvault::VaultError>(42)
//! });
//! // ... poll task.try_next() from a UI loop, or:
//! let answer = task.wait().unwrap();
//! assert_eq!(answer, 42);
//! ```

use crate::error::{Result, VaultError};
use crate::progress::Update;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

/// Sender half of a task's update channel
///
/// Workers send progress through this; send failures (receiver dropped)
/// are ignored, since a caller that stopped listening must not fail the
/// operation itself.
pub type UpdateSender = Sender<Update>;

/// Handle to a running background operation
///
/// Dropping a `Task` detaches the worker; it runs to completion on its own.
/// There is no cancellation - callers either poll until the worker finishes
/// or join it with [`Task::wait`].
#[derive(Debug)]
pub struct Task<T> {
    handle: JoinHandle<Result<T>>,
    updates: Receiver<Update>,
}

/// Spawn a worker thread running `f` with a fresh update channel
///
/// Returns immediately; the worker's result is retrieved via
/// [`Task::wait`].
pub fn spawn<T, F>(f: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce(&UpdateSender) -> Result<T> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = std::thread::spawn(move || f(&tx));
    Task {
        handle,
        updates: rx,
    }
}

impl<T> Task<T> {
    /// Non-blocking poll for the next queued update
    ///
    /// Returns `None` when the queue is currently empty, whether or not the
    /// worker is still running.
    pub fn try_next(&self) -> Option<Update> {
        match self.updates.try_recv() {
            Ok(update) => Some(update),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Whether the worker thread is still executing
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Direct access to the update channel, for `select`-style consumers
    pub fn updates(&self) -> &Receiver<Update> {
        &self.updates
    }

    /// Join the worker and return its result
    ///
    /// An error returned by the worker is re-raised here; a panic inside
    /// the worker surfaces as [`VaultError::WorkerPanic`]. Updates still
    /// queued at join time remain readable via the receiver obtained from
    /// [`Task::updates`] before calling this.
    pub fn wait(self) -> Result<T> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => Err(VaultError::WorkerPanic(panic_message(&panic))),
        }
    }

    /// Drain all currently queued updates, then join the worker
    ///
    /// Convenience for callers that want the remaining updates delivered to
    /// `sink` in order before the result is returned.
    pub fn drain_and_wait(self, mut sink: impl FnMut(Update)) -> Result<T> {
        let updates = self.updates.clone();
        let result = self.wait();
        while let Ok(update) = updates.try_recv() {
            sink(update);
        }
        result
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let task = spawn(|updates| {
            for i in 0..4 {
                updates.send(Update::major(format!("major {i}"), i, 4)).ok();
                updates.send(Update::minor(format!("minor {i}"))).ok();
            }
            Ok::<_, VaultError>("done")
        });
        let mut seen = Vec::new();
        let result = task.drain_and_wait(|u| seen.push(u)).unwrap();
        assert_eq!(result, "done");
        assert_eq!(seen.len(), 8);
        let majors: Vec<usize> = seen
            .iter()
            .filter(|u| !u.is_minor())
            .map(|u| u.current)
            .collect();
        assert_eq!(majors, vec![0, 1, 2, 3]);
        // Each minor follows its major
        assert!(seen[0].message.starts_with("major"));
        assert!(seen[1].is_minor());
    }

    #[test]
    fn test_error_reraised_on_wait() {
        let task = spawn(|_updates| Err::<(), _>(VaultError::internal("worker failed")));
        let err = task.wait().unwrap_err();
        assert!(matches!(err, VaultError::Internal(_)));
    }

    #[test]
    fn test_panic_captured() {
        let task = spawn(|_updates| -> Result<()> { panic!("boom") });
        let err = task.wait().unwrap_err();
        match err {
            VaultError::WorkerPanic(msg) => assert_eq!(msg, "boom"),
            other => panic!("expected WorkerPanic, got {other:?}"),
        }
    }

    #[test]
    fn test_try_next_nonblocking() {
        let task = spawn(|updates| {
            updates.send(Update::status("only")).ok();
            Ok::<_, VaultError>(())
        });
        // Poll without blocking until the single update shows up.
        let update = loop {
            if let Some(update) = task.try_next() {
                break update;
            }
            if !task.is_running() {
                // Worker finished; the message must already be queued.
                break task.try_next().expect("update was queued before exit");
            }
            std::thread::yield_now();
        };
        assert_eq!(update.message, "only");
        task.wait().unwrap();
    }
}
