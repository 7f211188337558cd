use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};

use crate::core::DialogOutcome;

#[derive(Default)]
struct SlotState {
    outcome: Option<DialogOutcome>,
    wakers: Vec<Waker>,
}

/// Single-slot handoff of a [`DialogOutcome`] from the UI thread to a requester.
///
/// The first stored outcome wins; later stores are ignored. The outcome is
/// written under the lock before any waiter is notified, so a released waiter
/// always sees it. Every blocked [`OutcomeSlot::wait_for_outcome`] caller and
/// every pending [`OutcomeFuture`] is released.
#[derive(Default)]
pub struct OutcomeSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl std::fmt::Debug for OutcomeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeSlot")
            .field("outcome", &self.state.lock().outcome)
            .finish_non_exhaustive()
    }
}

impl OutcomeSlot {
    /// Create an unsignaled slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `outcome` and release waiters.
    ///
    /// Returns `false` (and drops `outcome`) if the slot was already signaled.
    pub fn store_and_signal(&self, outcome: DialogOutcome) -> bool {
        let wakers = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            std::mem::take(&mut state.wakers)
        };
        self.ready.notify_all();
        wakers.into_iter().for_each(Waker::wake);
        true
    }

    /// Block until signaled and return the stored outcome.
    ///
    /// Returns immediately (with the same outcome) once the slot is signaled.
    pub fn wait_for_outcome(&self) -> DialogOutcome {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.outcome.as_ref() {
                return outcome.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    /// The stored outcome, without blocking.
    pub fn try_outcome(&self) -> Option<DialogOutcome> {
        self.state.lock().outcome.clone()
    }

    /// Whether an outcome has been stored.
    pub fn is_signaled(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<DialogOutcome> {
        let mut state = self.state.lock();
        if let Some(outcome) = state.outcome.as_ref() {
            return Poll::Ready(outcome.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Future resolving to the outcome of an [`OutcomeSlot`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct OutcomeFuture {
    slot: Arc<OutcomeSlot>,
}

impl OutcomeFuture {
    pub(crate) fn new(slot: Arc<OutcomeSlot>) -> Self {
        Self { slot }
    }
}

impl Future for OutcomeFuture {
    type Output = DialogOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.slot.poll_outcome(cx)
    }
}
