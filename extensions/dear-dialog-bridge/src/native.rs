//! Native (rfd) picker.
//!
//! [`RfdPicker`] shows the OS file dialog through the `rfd` crate. Most
//! platforms require these dialogs to run on the main thread, which is what
//! the bridge guarantees.
//!
//! Notes
//! - `rfd` has no per-entry hook, so the entry filter is applied to the paths
//!   the user confirmed; rejected paths are dropped and an empty result is
//!   reported as canceled.
//! - Returned paths are classified with [`EntryKind::of_path`], which only
//!   knows files and directories: bundles such as `.app` reach the filter as
//!   [`EntryKind::Dir`], never [`EntryKind::Package`].
//! - Sheets are not supported by `rfd`: `begin_sheet` runs the dialog modally
//!   and reports the dismissal before returning.
use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::core::{DialogMode, EntryKind, OwnerWindow};
use crate::filter::EntryFilter;
use crate::picker::{DismissCallback, NativePicker, PanelConfig, PanelResponse, PickerError};

/// [`NativePicker`] backed by `rfd::FileDialog`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RfdPicker;

impl RfdPicker {
    fn to_rfd(config: &PanelConfig) -> rfd::FileDialog {
        let mut d = rfd::FileDialog::new().set_can_create_directories(config.can_create_directories);
        if let Some(title) = &config.title {
            d = d.set_title(title);
        }
        if let Some(dir) = &config.directory {
            d = d.set_directory(dir);
        }
        if let Some(name) = &config.file_name {
            d = d.set_file_name(name);
        }
        if let Some(types) = &config.allowed_file_types {
            let exts: Vec<&str> = types.iter().map(|s| s.as_str()).collect();
            if !exts.is_empty() {
                d = d.add_filter("Allowed files", &exts);
            }
        }
        d
    }
}

impl NativePicker for RfdPicker {
    fn run_modal(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
    ) -> Result<PanelResponse, PickerError> {
        if let Some(dir) = &config.directory {
            if !dir.is_dir() {
                return Err(PickerError::InvalidDirectory(dir.clone()));
            }
        }
        #[cfg(feature = "tracing")]
        trace!(mode = ?config.mode, multi = config.allows_multiple_selection, "rfd blocking open");

        let d = Self::to_rfd(config);
        let folders = config.can_choose_directories && !config.can_choose_files;
        let picked: Vec<PathBuf> = match (config.mode, folders, config.allows_multiple_selection) {
            (DialogMode::Save, _, _) => d.save_file().into_iter().collect(),
            (DialogMode::Open, true, true) => d.pick_folders().unwrap_or_default(),
            (DialogMode::Open, true, false) => d.pick_folder().into_iter().collect(),
            (DialogMode::Open, false, true) => d.pick_files().unwrap_or_default(),
            (DialogMode::Open, false, false) => d.pick_file().into_iter().collect(),
        };

        let kept: Vec<PathBuf> = match (&filter, config.mode) {
            (Some(f), DialogMode::Open) => picked
                .into_iter()
                .filter(|p| f.should_enable(p, EntryKind::of_path(p)))
                .collect(),
            _ => picked,
        };
        if kept.is_empty() {
            Ok(PanelResponse::Canceled)
        } else {
            Ok(PanelResponse::Accepted(kept))
        }
    }

    fn begin_sheet(
        &mut self,
        config: &PanelConfig,
        filter: Option<EntryFilter>,
        _owner: &dyn OwnerWindow,
        on_dismiss: DismissCallback,
    ) -> Result<(), PickerError> {
        let result = self.run_modal(config, filter)?;
        on_dismiss.dismiss(Ok(result));
        Ok(())
    }
}
