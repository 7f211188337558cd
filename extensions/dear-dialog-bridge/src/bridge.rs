//! The dialog bridge.
//!
//! A [`DialogBridge`] is created on a requester thread, presented on the UI
//! thread with [`DialogBridge::present_on_ui_thread`], and waited on with
//! [`DialogBridge::wait`]. Every presentation path ends in exactly one
//! store+signal of the outcome, including picker failures.
//!
//! Callers must eventually present every bridge they wait on: there is no
//! timeout, and a bridge that is never presented blocks its waiter forever.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

#[cfg(feature = "tracing")]
use tracing::{debug, error, trace, warn};

use crate::core::{BridgeError, DialogOutcome, DialogRequest};
use crate::filter::EntryFilter;
use crate::handoff::{OutcomeFuture, OutcomeSlot};
use crate::picker::{DismissCallback, NativePicker, PanelConfig, PanelResponse, PickerError};
use crate::ui_thread::{UiHandle, UiThread};

struct BridgeInner {
    request: DialogRequest,
    slot: Arc<OutcomeSlot>,
    presented: AtomicBool,
}

impl BridgeInner {
    /// Turn the picker result into the outcome and publish it.
    fn finish(&self, result: Result<PanelResponse, PickerError>) {
        let outcome = match result {
            Ok(PanelResponse::Accepted(mut paths)) => {
                if !self.request.allows_multiple_selection && paths.len() > 1 {
                    #[cfg(feature = "tracing")]
                    warn!(
                        count = paths.len(),
                        "picker returned several paths for a single-selection dialog"
                    );
                    paths.truncate(1);
                }
                DialogOutcome::accepted(paths)
            }
            Ok(PanelResponse::Canceled) => DialogOutcome::canceled(),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!(error = %_err, "file picker failed to initialize; treating as canceled");
                DialogOutcome::canceled()
            }
        };

        if !self.publish(outcome.clone()) {
            return;
        }
        if let Some(peer) = self.request.handle() {
            if catch_unwind(AssertUnwindSafe(|| peer.dialog_closed(&outcome))).is_err() {
                #[cfg(feature = "tracing")]
                warn!("dialog peer panicked while receiving the outcome");
            }
        }
    }

    /// Store and signal `outcome` without telling the peer. Returns `false` if
    /// an outcome was already published.
    fn publish(&self, outcome: DialogOutcome) -> bool {
        #[cfg(feature = "tracing")]
        let (response, paths) = (outcome.response(), outcome.selected_paths().len());
        if !self.slot.store_and_signal(outcome) {
            return false;
        }
        #[cfg(feature = "tracing")]
        trace!(event = "bridge.signaled", response = ?response, paths);
        true
    }
}

/// Cross-thread handle for one file dialog request.
///
/// Clones share the same request and outcome, so one clone can travel to the
/// UI thread while the requester keeps another.
#[derive(Clone)]
pub struct DialogBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for DialogBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogBridge")
            .field("request", &self.inner.request)
            .field("presented", &self.inner.presented.load(Ordering::Acquire))
            .field("slot", &self.inner.slot)
            .finish()
    }
}

impl DialogBridge {
    /// Capture `request`. Nothing is shown yet.
    pub fn create(request: DialogRequest) -> Result<Self, BridgeError> {
        request.validate()?;
        #[cfg(feature = "tracing")]
        trace!(event = "bridge.created", mode = ?request.mode(), modality = ?request.modality());
        Ok(Self {
            inner: Arc::new(BridgeInner {
                request,
                slot: Arc::new(OutcomeSlot::new()),
                presented: AtomicBool::new(false),
            }),
        })
    }

    /// The captured request.
    pub fn request(&self) -> &DialogRequest {
        &self.inner.request
    }

    /// Present the dialog. Must be called on the thread that owns `ui`, at most
    /// once per bridge.
    ///
    /// Modal requests return after the user dismissed the picker. Sheet
    /// requests return right away and complete through the picker's dismissal
    /// callback; without a live owner window they are run modally instead.
    ///
    /// Picker failures are not errors here: they complete the bridge as
    /// canceled.
    pub fn present_on_ui_thread(
        &self,
        ui: &UiThread,
        picker: &mut dyn NativePicker,
    ) -> Result<(), BridgeError> {
        if !ui.is_current() {
            let err = BridgeError::WrongThread {
                expected: ui.owner(),
                actual: thread::current().id(),
            };
            #[cfg(feature = "tracing")]
            error!(error = %err, "dialog presented off the UI thread");
            return Err(err);
        }
        if self.inner.presented.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::AlreadyPresented);
        }

        let req = &self.inner.request;
        let config = PanelConfig::from_request(req);
        let filter = EntryFilter::for_request(req);
        #[cfg(feature = "tracing")]
        debug!(
            event = "bridge.presented",
            modality = ?req.modality(),
            filtered = filter.is_some()
        );

        let owner = if req.modality().is_sheet() {
            req.owner()
        } else {
            None
        };
        match owner {
            Some(owner) => {
                let inner = self.inner.clone();
                let on_dismiss = DismissCallback::new(move |result| inner.finish(result));
                if let Err(err) = picker.begin_sheet(&config, filter, owner.as_ref(), on_dismiss)
                {
                    self.inner.finish(Err(err));
                }
            }
            None => {
                #[cfg(feature = "tracing")]
                if req.modality().is_sheet() {
                    debug!("no live owner window; presenting sheet request modally");
                }
                let result = picker.run_modal(&config, filter);
                self.inner.finish(result);
            }
        }
        Ok(())
    }

    /// Block until the dialog is dismissed and return its outcome.
    ///
    /// May be called before presentation. Calling it again returns the same
    /// outcome. Do not call it on the UI thread while a modal presentation is
    /// pending there: that deadlocks.
    pub fn wait(&self) -> DialogOutcome {
        self.inner.slot.wait_for_outcome()
    }

    /// Await the outcome without blocking a thread.
    pub fn wait_async(&self) -> OutcomeFuture {
        OutcomeFuture::new(self.inner.slot.clone())
    }

    /// The outcome if the dialog has already been dismissed.
    pub fn try_outcome(&self) -> Option<DialogOutcome> {
        self.inner.slot.try_outcome()
    }

    /// Paths of the outcome; empty when canceled or not yet dismissed.
    ///
    /// Meant to be called after [`DialogBridge::wait`] returned.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.inner
            .slot
            .try_outcome()
            .map(DialogOutcome::into_paths)
            .unwrap_or_default()
    }

    /// Run a complete dialog from a requester thread.
    ///
    /// Posts the presentation onto `ui` (building the picker there with
    /// `make_picker`) and blocks until the outcome is available. Fails with
    /// [`BridgeError::WaitOnUiThread`] when called on the UI thread itself and
    /// with [`BridgeError::UiThreadGone`] when the UI queue is closed.
    pub fn open_on<F, P>(
        ui: &UiHandle,
        request: DialogRequest,
        make_picker: F,
    ) -> Result<DialogOutcome, BridgeError>
    where
        F: FnOnce() -> P + Send + 'static,
        P: NativePicker + 'static,
    {
        if ui.is_ui_thread() {
            return Err(BridgeError::WaitOnUiThread(ui.owner()));
        }
        let bridge = Self::create(request)?;
        let guard = CancelUnlessPresented {
            inner: Some(bridge.inner.clone()),
            ui: ui.owner(),
        };
        let presenter = bridge.clone();
        ui.post(move |ui_thread| {
            let mut picker = make_picker();
            match presenter.present_on_ui_thread(ui_thread, &mut picker) {
                Ok(()) => guard.disarm(),
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    error!(error = %_err, "posted dialog could not be presented");
                }
            }
        })?;
        Ok(bridge.wait())
    }
}

/// Completes the bridge as canceled unless a posted presentation got under
/// way: the task was dropped unrun, presenting failed, or the picker panicked.
///
/// The peer only hears about it when the guard dies on the UI thread. A guard
/// dropped anywhere else belongs to a task that was never queued, and
/// `open_on` reports that as [`BridgeError::UiThreadGone`] instead.
struct CancelUnlessPresented {
    inner: Option<Arc<BridgeInner>>,
    ui: ThreadId,
}

impl CancelUnlessPresented {
    fn disarm(mut self) {
        self.inner = None;
    }
}

impl Drop for CancelUnlessPresented {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        if thread::current().id() == self.ui {
            inner.finish(Ok(PanelResponse::Canceled));
        } else {
            inner.publish(DialogOutcome::canceled());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DialogMode, EntryKind, Modality, OwnerWindow, ResponseCode, WindowId};
    use crate::filter::{DialogPeer, PeerError};
    use crate::picker::{Presentation, ScriptedPicker};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    struct Window;

    impl OwnerWindow for Window {
        fn window_id(&self) -> WindowId {
            WindowId(1)
        }
    }

    /// Picker that ignores the single-selection setting.
    struct Overeager;

    impl NativePicker for Overeager {
        fn run_modal(
            &mut self,
            _config: &PanelConfig,
            _filter: Option<EntryFilter>,
        ) -> Result<PanelResponse, PickerError> {
            Ok(PanelResponse::Accepted(vec!["/a".into(), "/b".into()]))
        }

        fn begin_sheet(
            &mut self,
            _config: &PanelConfig,
            _filter: Option<EntryFilter>,
            _owner: &dyn OwnerWindow,
            _on_dismiss: DismissCallback,
        ) -> Result<(), PickerError> {
            Err(PickerError::Unavailable)
        }
    }

    /// Picker that forgets the dismissal callback.
    struct Forgetful;

    impl NativePicker for Forgetful {
        fn run_modal(
            &mut self,
            _config: &PanelConfig,
            _filter: Option<EntryFilter>,
        ) -> Result<PanelResponse, PickerError> {
            Ok(PanelResponse::Canceled)
        }

        fn begin_sheet(
            &mut self,
            _config: &PanelConfig,
            _filter: Option<EntryFilter>,
            _owner: &dyn OwnerWindow,
            on_dismiss: DismissCallback,
        ) -> Result<(), PickerError> {
            drop(on_dismiss);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ClosedCounter {
        closed: AtomicUsize,
        closed_on: parking_lot::Mutex<Vec<ThreadId>>,
    }

    impl DialogPeer for ClosedCounter {
        fn should_show(&self, _path: &Path, _kind: EntryKind) -> Result<bool, PeerError> {
            Ok(true)
        }

        fn dialog_closed(&self, _outcome: &DialogOutcome) {
            self.closed.fetch_add(1, Ordering::SeqCst);
            self.closed_on.lock().push(thread::current().id());
        }
    }

    struct ExplodingPeer;

    impl DialogPeer for ExplodingPeer {
        fn dialog_closed(&self, _outcome: &DialogOutcome) {
            panic!("peer torn down");
        }
    }

    fn open_request() -> DialogRequest {
        DialogRequest::builder(DialogMode::Open).build().unwrap()
    }

    #[test]
    fn modal_presentation_signals_before_returning() {
        let ui = UiThread::bind_current();
        let bridge = DialogBridge::create(open_request()).unwrap();
        assert!(bridge.try_outcome().is_none());
        assert!(bridge.selected_paths().is_empty());

        let mut picker = ScriptedPicker::new()
            .files(["/a/x.txt"])
            .then_accept(["/a/x.txt"]);
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();

        let outcome = bridge.wait();
        assert_eq!(outcome.response(), ResponseCode::Accepted);
        assert_eq!(bridge.selected_paths(), vec![PathBuf::from("/a/x.txt")]);
        assert_eq!(bridge.wait(), outcome);
    }

    #[test]
    fn second_presentation_is_rejected() {
        let ui = UiThread::bind_current();
        let bridge = DialogBridge::create(open_request()).unwrap();
        let mut picker = ScriptedPicker::new();
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        let err = bridge.present_on_ui_thread(&ui, &mut picker).unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyPresented));
        assert_eq!(picker.presentations().len(), 1);
    }

    #[test]
    fn wrong_thread_is_rejected_without_signaling() {
        let elsewhere = thread::spawn(|| thread::current().id()).join().unwrap();
        let ui = UiThread::bound_to(elsewhere);
        let bridge = DialogBridge::create(open_request()).unwrap();
        let mut picker = ScriptedPicker::new();
        let res = bridge.present_on_ui_thread(&ui, &mut picker);
        match res {
            Err(BridgeError::WrongThread { expected, actual }) => {
                assert_eq!(expected, elsewhere);
                assert_eq!(actual, thread::current().id());
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(picker.presentations().is_empty());
        assert!(bridge.try_outcome().is_none());
    }

    #[test]
    fn single_selection_is_enforced() {
        let ui = UiThread::bind_current();
        let bridge = DialogBridge::create(open_request()).unwrap();
        bridge.present_on_ui_thread(&ui, &mut Overeager).unwrap();
        assert_eq!(bridge.selected_paths(), vec![PathBuf::from("/a")]);
    }

    #[test]
    fn sheet_without_owner_falls_back_to_modal() {
        let ui = UiThread::bind_current();
        let req = DialogRequest::builder(DialogMode::Open)
            .modality(Modality::DocumentModal)
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        let mut picker = ScriptedPicker::new();
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        assert_eq!(picker.presentations(), &[Presentation::Modal]);
        assert_eq!(bridge.wait(), DialogOutcome::canceled());
    }

    #[test]
    fn sheet_with_dropped_owner_falls_back_to_modal() {
        let ui = UiThread::bind_current();
        let window = Arc::new(Window);
        let req = DialogRequest::builder(DialogMode::Open)
            .owner(&window)
            .modality(Modality::NonModal)
            .build()
            .unwrap();
        drop(window);
        let bridge = DialogBridge::create(req).unwrap();
        let mut picker = ScriptedPicker::new();
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        assert_eq!(picker.presentations(), &[Presentation::Modal]);
    }

    #[test]
    fn non_modal_sheet_attaches_to_live_owner() {
        let ui = UiThread::bind_current();
        let window = Arc::new(Window);
        let req = DialogRequest::builder(DialogMode::Open)
            .owner(&window)
            .modality(Modality::NonModal)
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        let mut picker = ScriptedPicker::new()
            .files(["/a/x.txt"])
            .then_accept(["/a/x.txt"]);
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        assert_eq!(picker.presentations(), &[Presentation::Sheet(WindowId(1))]);
        assert_eq!(bridge.wait(), DialogOutcome::accepted(["/a/x.txt"]));
    }

    #[test]
    fn sheet_init_failure_cancels() {
        let ui = UiThread::bind_current();
        let window = Arc::new(Window);
        let req = DialogRequest::builder(DialogMode::Open)
            .owner(&window)
            .modality(Modality::DocumentModal)
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        bridge.present_on_ui_thread(&ui, &mut Overeager).unwrap();
        assert_eq!(bridge.wait(), DialogOutcome::canceled());
    }

    #[test]
    fn forgotten_dismissal_cancels() {
        let ui = UiThread::bind_current();
        let window = Arc::new(Window);
        let req = DialogRequest::builder(DialogMode::Open)
            .owner(&window)
            .modality(Modality::DocumentModal)
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        bridge.present_on_ui_thread(&ui, &mut Forgetful).unwrap();
        assert_eq!(bridge.wait(), DialogOutcome::canceled());
    }

    #[test]
    fn peer_is_told_exactly_once() {
        let ui = UiThread::bind_current();
        let peer = Arc::new(ClosedCounter::default());
        let req = DialogRequest::builder(DialogMode::Open)
            .handle(peer.clone())
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        let mut picker = ScriptedPicker::new()
            .files(["/a/x.txt"])
            .then_accept(["/a/x.txt"]);
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        // A late store from another path must not notify again.
        bridge.inner.finish(Ok(PanelResponse::Canceled));
        assert_eq!(peer.closed.load(Ordering::SeqCst), 1);
        assert!(bridge.wait().is_accepted());
    }

    #[test]
    fn panicking_peer_does_not_lose_the_outcome() {
        let ui = UiThread::bind_current();
        let req = DialogRequest::builder(DialogMode::Open)
            .handle(Arc::new(ExplodingPeer))
            .build()
            .unwrap();
        let bridge = DialogBridge::create(req).unwrap();
        let mut picker = ScriptedPicker::new()
            .files(["/a/x.txt"])
            .then_accept(["/a/x.txt"]);
        bridge.present_on_ui_thread(&ui, &mut picker).unwrap();
        assert_eq!(bridge.wait(), DialogOutcome::accepted(["/a/x.txt"]));
        assert_eq!(bridge.selected_paths(), vec![PathBuf::from("/a/x.txt")]);
    }

    #[test]
    fn open_on_ui_thread_is_rejected() {
        let ui = UiThread::bind_current();
        let err = DialogBridge::open_on(&ui.handle(), open_request(), ScriptedPicker::new)
            .unwrap_err();
        assert!(matches!(err, BridgeError::WaitOnUiThread(_)));
    }

    #[test]
    fn open_on_dropped_queue_does_not_hang() {
        let ui = UiThread::bind_current();
        let handle = ui.handle();
        let peer = Arc::new(ClosedCounter::default());
        let req = DialogRequest::builder(DialogMode::Open)
            .handle(peer.clone())
            .build()
            .unwrap();
        let requester = thread::spawn(move || {
            DialogBridge::open_on(&handle, req, || {
                ScriptedPicker::new()
                    .files(["/a/x.txt"])
                    .then_accept(["/a/x.txt"])
            })
        });
        // Wait until the task is queued, then tear the UI thread down unpumped.
        while ui.pending() == 0 {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        let ui_id = ui.owner();
        drop(ui);
        let outcome = requester.join().unwrap().unwrap();
        assert_eq!(outcome, DialogOutcome::canceled());
        assert_eq!(*peer.closed_on.lock(), vec![ui_id]);
    }

    #[test]
    fn open_on_closed_queue_leaves_peer_alone() {
        let ui = UiThread::bind_current();
        let handle = ui.handle();
        drop(ui);
        let peer = Arc::new(ClosedCounter::default());
        let req = DialogRequest::builder(DialogMode::Open)
            .handle(peer.clone())
            .build()
            .unwrap();
        let res = thread::spawn(move || DialogBridge::open_on(&handle, req, ScriptedPicker::new))
            .join()
            .unwrap();
        assert!(matches!(res, Err(BridgeError::UiThreadGone)));
        assert_eq!(peer.closed.load(Ordering::SeqCst), 0);
        assert!(peer.closed_on.lock().is_empty());
    }
}
