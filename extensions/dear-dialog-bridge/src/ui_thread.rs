//! UI-thread task queue.
//!
//! A [`UiThread`] is bound to the thread that owns the event loop. Other
//! threads hold a cloneable [`UiHandle`] and post closures onto it; the owner
//! runs them when it pumps the queue (typically once per event-loop turn).
use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::core::BridgeError;

/// Work item executed on the UI thread.
pub type UiTask = Box<dyn FnOnce(&UiThread) + Send + 'static>;

/// How long [`UiThread::run_until`] sleeps on an empty queue before
/// re-checking its predicate.
const IDLE_TICK: Duration = Duration::from_millis(5);

/// The event-loop side of the UI task queue.
///
/// Not `Clone`: exactly one value represents the UI-owning thread. It records
/// the identity of the thread that created it; presenting from any other
/// thread is rejected.
///
/// Not `Send` either, so it never leaves the thread it was bound on; other
/// threads reach it through a [`UiHandle`].
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<dear_dialog_bridge::UiThread>();
/// ```
pub struct UiThread {
    owner: ThreadId,
    tx: Sender<UiTask>,
    rx: Receiver<UiTask>,
    _not_send: PhantomData<*const ()>,
}

impl std::fmt::Debug for UiThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiThread")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .finish()
    }
}

impl UiThread {
    /// Bind the calling thread as the UI-owning thread.
    pub fn bind_current() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            owner: thread::current().id(),
            tx,
            rx,
            _not_send: PhantomData,
        }
    }

    /// A queue that claims `owner` as its UI thread.
    #[cfg(test)]
    pub(crate) fn bound_to(owner: ThreadId) -> Self {
        let mut ui = Self::bind_current();
        ui.owner = owner;
        ui
    }

    /// Identity of the UI-owning thread.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Whether the caller is running on the UI-owning thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// A handle other threads can use to post work.
    pub fn handle(&self) -> UiHandle {
        UiHandle {
            owner: self.owner,
            tx: self.tx.clone(),
        }
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every queued task without blocking. Returns the number of tasks run.
    ///
    /// Tasks posted while pumping are run in the same call.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(self);
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for work, then run everything queued.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task(self);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Keep dispatching tasks until `done` returns `true`.
    ///
    /// `done` is checked before every task and at least once per idle tick.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.pump_timeout(IDLE_TICK);
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        // Queued tasks are dropped unrun so anything they own is released now,
        // not when the last handle goes away.
        while let Ok(task) = self.rx.try_recv() {
            drop(task);
        }
    }
}

/// Cloneable, `Send` handle for posting work onto a [`UiThread`].
#[derive(Clone)]
pub struct UiHandle {
    owner: ThreadId,
    tx: Sender<UiTask>,
}

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl UiHandle {
    /// Identity of the UI-owning thread.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Whether the caller is running on the UI-owning thread.
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queue `task` to run on the UI thread.
    ///
    /// Fails with [`BridgeError::UiThreadGone`] once the [`UiThread`] has been
    /// dropped; the task is dropped without running.
    pub fn post<F>(&self, task: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&UiThread) + Send + 'static,
    {
        self.tx
            .send(Box::new(task))
            .map_err(|_| BridgeError::UiThreadGone)
    }
}
