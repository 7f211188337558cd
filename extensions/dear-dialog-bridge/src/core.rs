use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use thiserror::Error;

use crate::filter::{DialogHandle, DialogPeer};

/// Dialog mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogMode {
    /// Pick one or more existing entries
    Open,
    /// Choose a destination path
    Save,
}

/// How the dialog is attached to the rest of the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Modality {
    /// Application-modal: the UI thread runs the dialog until it is dismissed.
    #[default]
    Modal,
    /// Attached to the owner window as a sheet; only that window is blocked.
    DocumentModal,
    /// Attached to the owner window without blocking anything.
    NonModal,
}

impl Modality {
    /// Whether this modality presents asynchronously relative to the event loop.
    pub fn is_sheet(self) -> bool {
        matches!(self, Self::DocumentModal | Self::NonModal)
    }
}

/// Kind of filesystem entry offered by the picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Bundle-like directory (e.g. `Foo.app`) shown as a single item.
    Package,
}

impl EntryKind {
    /// Best-effort classification of an on-disk path.
    ///
    /// Missing paths are classified as files (the save case). Bundles are not
    /// detected, so this never returns [`EntryKind::Package`].
    pub fn of_path(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(md) if md.is_dir() => Self::Dir,
            _ => Self::File,
        }
    }
}

/// Identifier of an owner window, as understood by the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Window a dialog can be anchored to.
///
/// The bridge only ever holds a weak reference and never mutates the window.
pub trait OwnerWindow: Send + Sync {
    /// Host identifier of the window.
    fn window_id(&self) -> WindowId;
}

/// Weak back reference to an owner window.
pub type WindowRef = Weak<dyn OwnerWindow>;

/// Outcome of one dialog interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    /// The user confirmed a selection.
    Accepted,
    /// The user dismissed the dialog (or the picker could not be shown).
    Canceled,
}

/// Terminal result of one dialog request.
///
/// `selected_paths` is non-empty exactly when the response is
/// [`ResponseCode::Accepted`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogOutcome {
    response: ResponseCode,
    selected_paths: Vec<PathBuf>,
}

impl DialogOutcome {
    /// A canceled outcome with no paths.
    pub fn canceled() -> Self {
        Self {
            response: ResponseCode::Canceled,
            selected_paths: Vec::new(),
        }
    }

    /// An accepted outcome. An empty path list yields [`DialogOutcome::canceled`].
    pub fn accepted<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let selected_paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if selected_paths.is_empty() {
            return Self::canceled();
        }
        Self {
            response: ResponseCode::Accepted,
            selected_paths,
        }
    }

    /// Response code.
    pub fn response(&self) -> ResponseCode {
        self.response
    }

    /// Whether the user accepted a selection.
    pub fn is_accepted(&self) -> bool {
        self.response == ResponseCode::Accepted
    }

    /// Selected paths in picker order.
    pub fn selected_paths(&self) -> &[PathBuf] {
        &self.selected_paths
    }

    /// Consume the outcome and return its paths.
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.selected_paths
    }
}

/// Errors returned by the dialog bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request cannot be presented as configured
    #[error("invalid dialog configuration: {0}")]
    InvalidConfiguration(String),
    /// Presentation attempted off the UI-owning thread
    #[error("dialog presented on thread {actual:?}, but the UI thread is {expected:?}")]
    WrongThread {
        /// Thread that owns the UI event loop
        expected: ThreadId,
        /// Thread that made the call
        actual: ThreadId,
    },
    /// Blocking wait requested on the UI-owning thread
    #[error("cannot block the UI thread {0:?} waiting for its own dialog")]
    WaitOnUiThread(ThreadId),
    /// The bridge was already presented once
    #[error("dialog bridge already presented")]
    AlreadyPresented,
    /// The UI thread stopped accepting work
    #[error("UI thread is no longer running")]
    UiThreadGone,
}

/// Immutable configuration of one dialog invocation.
///
/// Built with [`DialogRequest::builder`].
#[derive(Clone)]
pub struct DialogRequest {
    pub(crate) owner: Option<WindowRef>,
    pub(crate) has_filter: bool,
    pub(crate) allowed_file_types: Option<Vec<String>>,
    pub(crate) handle: Option<DialogHandle>,
    pub(crate) title: Option<String>,
    pub(crate) directory: Option<PathBuf>,
    pub(crate) file_name: Option<String>,
    pub(crate) mode: DialogMode,
    pub(crate) modality: Modality,
    pub(crate) allows_multiple_selection: bool,
    pub(crate) navigates_into_packages: bool,
    pub(crate) can_choose_directories: bool,
    pub(crate) can_choose_files: bool,
    pub(crate) can_create_directories: bool,
}

impl std::fmt::Debug for DialogRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogRequest")
            .field("mode", &self.mode)
            .field("modality", &self.modality)
            .field("title", &self.title)
            .field("directory", &self.directory)
            .field("file_name", &self.file_name)
            .field("has_owner", &self.owner.is_some())
            .field("has_filter", &self.has_filter)
            .field("has_handle", &self.handle.is_some())
            .field("allowed_file_types", &self.allowed_file_types)
            .field("allows_multiple_selection", &self.allows_multiple_selection)
            .field("navigates_into_packages", &self.navigates_into_packages)
            .field("can_choose_directories", &self.can_choose_directories)
            .field("can_choose_files", &self.can_choose_files)
            .field("can_create_directories", &self.can_create_directories)
            .finish()
    }
}

impl DialogRequest {
    /// Start building a request for the given mode.
    pub fn builder(mode: DialogMode) -> DialogRequestBuilder {
        DialogRequestBuilder::new(mode)
    }

    /// Dialog mode.
    pub fn mode(&self) -> DialogMode {
        self.mode
    }
    /// Requested modality.
    pub fn modality(&self) -> Modality {
        self.modality
    }
    /// Owner window, if it is still alive.
    pub fn owner(&self) -> Option<Arc<dyn OwnerWindow>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }
    /// Whether the filtering policy is consulted per entry.
    pub fn has_filter(&self) -> bool {
        self.has_filter
    }
    /// Allowed file types (lowercase, without dot). `None` means unrestricted.
    pub fn allowed_file_types(&self) -> Option<&[String]> {
        self.allowed_file_types.as_deref()
    }
    /// Opaque caller handle.
    pub fn handle(&self) -> Option<&DialogHandle> {
        self.handle.as_ref()
    }
    /// Dialog title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
    /// Initial directory.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
    /// Initial file name.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
    /// Whether several entries may be selected.
    pub fn allows_multiple_selection(&self) -> bool {
        self.allows_multiple_selection
    }
    /// Whether packages are traversable.
    pub fn navigates_into_packages(&self) -> bool {
        self.navigates_into_packages
    }
    /// Whether directories are selectable.
    pub fn can_choose_directories(&self) -> bool {
        self.can_choose_directories
    }
    /// Whether files are selectable.
    pub fn can_choose_files(&self) -> bool {
        self.can_choose_files
    }
    /// Whether the "new folder" affordance is offered.
    pub fn can_create_directories(&self) -> bool {
        self.can_create_directories
    }

    pub(crate) fn validate(&self) -> Result<(), BridgeError> {
        if !self.can_choose_files && !self.can_choose_directories {
            return Err(BridgeError::InvalidConfiguration(
                "neither files nor directories can be chosen".into(),
            ));
        }
        if self.has_filter && self.handle.is_none() && self.allowed_file_types.is_none() {
            return Err(BridgeError::InvalidConfiguration(
                "filter requested without a dialog handle or allowed file types".into(),
            ));
        }
        if self.mode == DialogMode::Save && self.allows_multiple_selection {
            return Err(BridgeError::InvalidConfiguration(
                "save dialogs select a single path".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`DialogRequest`].
#[derive(Clone)]
pub struct DialogRequestBuilder {
    req: DialogRequest,
}

impl DialogRequestBuilder {
    fn new(mode: DialogMode) -> Self {
        Self {
            req: DialogRequest {
                owner: None,
                has_filter: false,
                allowed_file_types: None,
                handle: None,
                title: None,
                directory: None,
                file_name: None,
                mode,
                modality: Modality::Modal,
                allows_multiple_selection: false,
                navigates_into_packages: false,
                can_choose_directories: false,
                can_choose_files: true,
                can_create_directories: false,
            },
        }
    }

    /// Anchor the dialog to a window (held weakly).
    pub fn owner<W: OwnerWindow + 'static>(mut self, window: &Arc<W>) -> Self {
        let weak: Weak<W> = Arc::downgrade(window);
        self.req.owner = Some(weak);
        self
    }
    /// Anchor the dialog to an already type-erased window reference.
    pub fn owner_ref(mut self, window: WindowRef) -> Self {
        self.req.owner = Some(window);
        self
    }
    /// Set the modality
    pub fn modality(mut self, modality: Modality) -> Self {
        self.req.modality = modality;
        self
    }
    /// Set the dialog title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.req.title = Some(title.into());
        self
    }
    /// Set initial directory
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.req.directory = Some(dir.into());
        self
    }
    /// Set initial file name
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.req.file_name = Some(name.into());
        self
    }
    /// Allow selecting several entries (Open mode only)
    pub fn multi_select(mut self, yes: bool) -> Self {
        self.req.allows_multiple_selection = yes;
        self
    }
    /// Traverse packages instead of treating them as files
    pub fn navigate_packages(mut self, yes: bool) -> Self {
        self.req.navigates_into_packages = yes;
        self
    }
    /// Allow choosing files
    pub fn choose_files(mut self, yes: bool) -> Self {
        self.req.can_choose_files = yes;
        self
    }
    /// Allow choosing directories
    pub fn choose_directories(mut self, yes: bool) -> Self {
        self.req.can_choose_directories = yes;
        self
    }
    /// Offer directory creation
    pub fn create_directories(mut self, yes: bool) -> Self {
        self.req.can_create_directories = yes;
        self
    }
    /// Restrict the dialog to the given extensions.
    ///
    /// Tokens are trimmed, lowercased and stripped of a leading dot. Wildcard
    /// patterns and empty tokens are ignored; duplicates keep their first
    /// position. An empty result means "no restriction".
    pub fn allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in types {
            if let Some(ext) = normalize_file_type(t.as_ref()) {
                if !out.contains(&ext) {
                    out.push(ext);
                }
            }
        }
        self.req.allowed_file_types = if out.is_empty() { None } else { Some(out) };
        self
    }
    /// Attach the caller handle without enabling per-entry filtering.
    ///
    /// The handle still receives the outcome.
    pub fn handle(mut self, handle: DialogHandle) -> Self {
        self.req.handle = Some(handle);
        self
    }
    /// Attach the caller handle and consult it for every entry.
    pub fn filter(mut self, handle: DialogHandle) -> Self {
        self.req.handle = Some(handle);
        self.req.has_filter = true;
        self
    }
    /// Convenience for [`Self::filter`] with a concrete peer.
    pub fn filter_with<P: DialogPeer + 'static>(self, peer: P) -> Self {
        self.filter(Arc::new(peer))
    }
    /// Filter entries by the allowed file types instead of a peer predicate.
    pub fn filter_by_types(mut self, yes: bool) -> Self {
        self.req.has_filter = yes;
        self
    }

    /// Validate and build the request.
    pub fn build(self) -> Result<DialogRequest, BridgeError> {
        self.req.validate()?;
        Ok(self.req)
    }
}

fn normalize_file_type(token: &str) -> Option<String> {
    let t = token.trim();
    if t.contains('*') || t.contains('?') {
        return None;
    }
    let t = t.trim_start_matches('.');
    if t.is_empty() {
        return None;
    }
    Some(t.to_lowercase())
}
