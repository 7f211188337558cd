#![deny(missing_docs)]
//! Cross-thread file dialogs for `dear-imgui-rs` applications.
//!
//! Native file pickers must be driven from the thread that owns the UI event
//! loop, while the code that needs a path often runs elsewhere. This crate
//! bridges the two:
//!
//! - a requester thread builds a [`DialogRequest`] and a [`DialogBridge`],
//! - the UI thread presents it with [`DialogBridge::present_on_ui_thread`]
//!   (usually from a task posted through a [`UiHandle`]),
//! - the requester blocks in [`DialogBridge::wait`] (or awaits
//!   [`DialogBridge::wait_async`]) until the user accepts or cancels.
//!
//! While the picker lists entries it may ask an [`EntryFilter`] whether each
//! one is selectable; the filter forwards to the caller's [`DialogPeer`] on
//! the UI thread and fails closed.
//!
//! ```no_run
//! use dear_dialog_bridge::{DialogBridge, DialogMode, DialogRequest, ScriptedPicker, UiThread};
//!
//! let ui = UiThread::bind_current();
//! let handle = ui.handle();
//! let requester = std::thread::spawn(move || {
//!     let request = DialogRequest::builder(DialogMode::Open)
//!         .multi_select(true)
//!         .build()?;
//!     DialogBridge::open_on(&handle, request, || {
//!         ScriptedPicker::new().files(["/a/x.txt"]).then_accept(["/a/x.txt"])
//!     })
//! });
//! ui.run_until(|| requester.is_finished());
//! ```

mod bridge;
mod core;
mod filter;
mod handoff;
#[cfg(feature = "native-rfd")]
mod native;
mod picker;
mod ui_thread;

pub use bridge::DialogBridge;
pub use core::{
    BridgeError, DialogMode, DialogOutcome, DialogRequest, DialogRequestBuilder, EntryKind,
    Modality, OwnerWindow, ResponseCode, WindowId, WindowRef,
};
pub use filter::{DialogHandle, DialogPeer, EntryFilter, PeerError};
pub use handoff::{OutcomeFuture, OutcomeSlot};
#[cfg(feature = "native-rfd")]
pub use native::RfdPicker;
pub use picker::{
    DismissCallback, NativePicker, PanelConfig, PanelResponse, PickerError, Presentation,
    ScriptedPicker,
};
pub use ui_thread::{UiHandle, UiTask, UiThread};
