use std::path::PathBuf;

use thiserror::Error;

use crate::core::{DialogMode, DialogRequest, EntryKind, OwnerWindow, WindowId};
use crate::filter::EntryFilter;
use crate::ui_thread::UiHandle;

/// Presentation parameters handed to a [`NativePicker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    /// Open or save panel.
    pub mode: DialogMode,
    /// Window title.
    pub title: Option<String>,
    /// Starting directory.
    pub directory: Option<PathBuf>,
    /// Pre-filled file name.
    pub file_name: Option<String>,
    /// Multi-selection enabled.
    pub allows_multiple_selection: bool,
    /// Files are selectable.
    pub can_choose_files: bool,
    /// Directories are selectable.
    pub can_choose_directories: bool,
    /// "New folder" affordance offered.
    pub can_create_directories: bool,
    /// Packages are browsed as directories.
    pub navigates_into_packages: bool,
    /// Coarse extension restriction (lowercase, no dot).
    pub allowed_file_types: Option<Vec<String>>,
}

impl PanelConfig {
    pub(crate) fn from_request(req: &DialogRequest) -> Self {
        Self {
            mode: req.mode,
            title: req.title.clone(),
            directory: req.directory.clone(),
            file_name: req.file_name.clone(),
            allows_multiple_selection: req.allows_multiple_selection,
            can_choose_files: req.can_choose_files,
            can_choose_directories: req.can_choose_directories,
            can_create_directories: req.can_create_directories,
            navigates_into_packages: req.navigates_into_packages,
            allowed_file_types: req.allowed_file_types.clone(),
        }
    }

    /// Whether an entry of `kind` is selectable under this configuration.
    pub fn allows_kind(&self, kind: EntryKind) -> bool {
        match kind {
            EntryKind::File => self.can_choose_files,
            EntryKind::Dir => self.can_choose_directories,
            EntryKind::Package if self.navigates_into_packages => self.can_choose_directories,
            EntryKind::Package => self.can_choose_files,
        }
    }
}

/// How the user left the picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelResponse {
    /// Confirmed with these paths.
    Accepted(Vec<PathBuf>),
    /// Dismissed.
    Canceled,
}

/// Picker failed to come up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PickerError {
    /// Starting directory is missing or not a directory
    #[error("invalid starting directory: {0}")]
    InvalidDirectory(PathBuf),
    /// No picker implementation is available in this environment
    #[error("file picker unavailable")]
    Unavailable,
    /// Backend-specific failure
    #[error("picker backend error: {0}")]
    Backend(String),
}

type DismissFn = dyn FnOnce(Result<PanelResponse, PickerError>) + Send + 'static;

/// One-shot completion callback for sheet presentations.
///
/// Must be invoked on the UI thread. Dropping it without calling
/// [`DismissCallback::dismiss`] reports [`PanelResponse::Canceled`].
pub struct DismissCallback {
    inner: Option<Box<DismissFn>>,
}

impl std::fmt::Debug for DismissCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DismissCallback")
            .field("pending", &self.inner.is_some())
            .finish()
    }
}

impl DismissCallback {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(Result<PanelResponse, PickerError>) + Send + 'static,
    {
        Self {
            inner: Some(Box::new(f)),
        }
    }

    /// Report how the sheet was dismissed.
    pub fn dismiss(mut self, result: Result<PanelResponse, PickerError>) {
        if let Some(f) = self.inner.take() {
            f(result);
        }
    }
}

impl Drop for DismissCallback {
    fn drop(&mut self) {
        if let Some(f) = self.inner.take() {
            f(Ok(PanelResponse::Canceled));
        }
    }
}

/// The platform file picker, as seen by the bridge.
///
/// Both entry points are called on the UI thread. When a filter is supplied,
/// the picker must consult it synchronously for each candidate entry.
pub trait NativePicker {
    /// Show the picker application-modally and return once it is dismissed.
    fn run_modal(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
    ) -> Result<PanelResponse, PickerError>;

    /// Attach the picker to `owner` and return without waiting.
    ///
    /// `on_dismiss` is invoked later, on the UI thread. When this returns an
    /// error, the picker must not have invoked `on_dismiss` with a different
    /// result.
    fn begin_sheet(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
        owner: &dyn OwnerWindow,
        on_dismiss: DismissCallback,
    ) -> Result<(), PickerError>;
}

/// How a [`ScriptedPicker`] was presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Via [`NativePicker::run_modal`].
    Modal,
    /// Via [`NativePicker::begin_sheet`] on the given window.
    Sheet(WindowId),
}

#[derive(Clone, Debug)]
enum UserAction {
    Accept(Vec<PathBuf>),
    Cancel,
}

/// Headless picker that replays a scripted user interaction.
///
/// It lists its entries through the filter exactly like a real picker would,
/// then either accepts the scripted paths that ended up selectable or cancels.
/// If none of the scripted paths is selectable the user cannot confirm, so the
/// interaction ends canceled.
#[derive(Clone, Debug)]
pub struct ScriptedPicker {
    entries: Vec<(PathBuf, EntryKind)>,
    action: UserAction,
    init_error: Option<PickerError>,
    dismiss_via: Option<UiHandle>,
    listing: Vec<(PathBuf, bool)>,
    presentations: Vec<Presentation>,
    last_config: Option<PanelConfig>,
}

impl Default for ScriptedPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPicker {
    /// A picker with no entries that cancels.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            action: UserAction::Cancel,
            init_error: None,
            dismiss_via: None,
            listing: Vec::new(),
            presentations: Vec::new(),
            last_config: None,
        }
    }

    /// List an entry.
    pub fn entry(mut self, path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        self.entries.push((path.into(), kind));
        self
    }

    /// List several regular files.
    pub fn files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.entries
            .extend(paths.into_iter().map(|p| (p.into(), EntryKind::File)));
        self
    }

    /// Select `paths` (in order) and confirm.
    ///
    /// In save mode the first path is taken as the typed destination.
    pub fn then_accept<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.action = UserAction::Accept(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Dismiss without choosing.
    pub fn then_cancel(mut self) -> Self {
        self.action = UserAction::Cancel;
        self
    }

    /// Fail to initialize with `err`.
    pub fn fail_with(mut self, err: PickerError) -> Self {
        self.init_error = Some(err);
        self
    }

    /// Deliver sheet dismissals on a later turn of the given UI queue instead
    /// of before `begin_sheet` returns.
    pub fn dismiss_via(mut self, handle: UiHandle) -> Self {
        self.dismiss_via = Some(handle);
        self
    }

    /// Entries from the last presentation with their selectability.
    pub fn listing(&self) -> &[(PathBuf, bool)] {
        &self.listing
    }

    /// Number of entries that were selectable in the last presentation.
    pub fn selectable_count(&self) -> usize {
        self.listing.iter().filter(|(_, ok)| *ok).count()
    }

    /// Every presentation so far.
    pub fn presentations(&self) -> &[Presentation] {
        &self.presentations
    }

    /// Configuration of the last presentation.
    pub fn last_config(&self) -> Option<&PanelConfig> {
        self.last_config.as_ref()
    }

    fn interact(&mut self, config: &PanelConfig, filter: Option<&EntryFilter>) -> PanelResponse {
        self.last_config = Some(config.clone());
        self.listing = self
            .entries
            .iter()
            .map(|(path, kind)| {
                let ok = config.allows_kind(*kind)
                    && filter.is_none_or(|f| f.should_enable(path, *kind));
                (path.clone(), ok)
            })
            .collect();

        let wanted = match &self.action {
            UserAction::Cancel => return PanelResponse::Canceled,
            UserAction::Accept(paths) => paths,
        };
        if config.mode == DialogMode::Save {
            return match wanted.first() {
                Some(p) => PanelResponse::Accepted(vec![p.clone()]),
                None => PanelResponse::Canceled,
            };
        }
        let mut chosen: Vec<PathBuf> = wanted
            .iter()
            .filter(|p| self.listing.iter().any(|(lp, ok)| *ok && lp == *p))
            .cloned()
            .collect();
        if !config.allows_multiple_selection {
            chosen.truncate(1);
        }
        if chosen.is_empty() {
            PanelResponse::Canceled
        } else {
            PanelResponse::Accepted(chosen)
        }
    }
}

impl NativePicker for ScriptedPicker {
    fn run_modal(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
    ) -> Result<PanelResponse, PickerError> {
        if let Some(err) = self.init_error.clone() {
            return Err(err);
        }
        self.presentations.push(Presentation::Modal);
        Ok(self.interact(config, filter.as_ref()))
    }

    fn begin_sheet(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
        owner: &dyn OwnerWindow,
        on_dismiss: DismissCallback,
    ) -> Result<(), PickerError> {
        if let Some(err) = self.init_error.clone() {
            return Err(err);
        }
        self.presentations.push(Presentation::Sheet(owner.window_id()));
        let response = self.interact(config, filter.as_ref());
        match &self.dismiss_via {
            Some(handle) => {
                // If the queue is gone the callback is dropped, which cancels.
                let _ = handle.post(move |_| on_dismiss.dismiss(Ok(response)));
            }
            None => on_dismiss.dismiss(Ok(response)),
        }
        Ok(())
    }
}
