use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::warn;

use crate::core::{DialogOutcome, DialogRequest, EntryKind};

/// Failure reported by a [`DialogPeer`] while deciding on an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("filter callback failed: {message}")]
pub struct PeerError {
    message: String,
}

impl PeerError {
    /// Create an error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Caller-side context a dialog reports back to.
///
/// This is the counterpart of the opaque handle carried by a
/// [`DialogRequest`]. The bridge never inspects it; it only forwards entry
/// queries and the final outcome.
///
/// Both methods are called on the UI thread. Implementations must not wait on
/// the requesting thread.
pub trait DialogPeer: Send + Sync {
    /// Decide whether `path` may be selected.
    fn should_show(&self, path: &Path, kind: EntryKind) -> Result<bool, PeerError> {
        let _ = (path, kind);
        Ok(true)
    }

    /// Called once after the outcome has been published.
    fn dialog_closed(&self, outcome: &DialogOutcome) {
        let _ = outcome;
    }
}

/// Shared, type-erased caller handle.
pub type DialogHandle = Arc<dyn DialogPeer>;

#[derive(Clone)]
enum FilterSource {
    Peer(DialogHandle),
    Types {
        types: Arc<[String]>,
        packages_traversable: bool,
    },
}

/// Per-entry selectability hook handed to a picker.
///
/// Every call reaches the policy; nothing is cached since directory contents
/// may change while the dialog is open. Failures of the policy make the entry
/// non-selectable.
#[derive(Clone)]
pub struct EntryFilter {
    source: FilterSource,
}

impl std::fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            FilterSource::Peer(_) => f.debug_struct("EntryFilter").field("source", &"peer").finish(),
            FilterSource::Types {
                types,
                packages_traversable,
            } => f
                .debug_struct("EntryFilter")
                .field("types", types)
                .field("packages_traversable", packages_traversable)
                .finish(),
        }
    }
}

impl EntryFilter {
    /// Filter delegating to a peer predicate.
    pub fn from_peer(handle: DialogHandle) -> Self {
        Self {
            source: FilterSource::Peer(handle),
        }
    }

    /// Filter matching lowercase extensions without dot.
    ///
    /// Directories always pass so the user can navigate; packages are treated
    /// as files unless [`EntryFilter::traverse_packages`] is set.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: FilterSource::Types {
                types: types.into_iter().map(Into::into).collect(),
                packages_traversable: false,
            },
        }
    }

    /// Let packages pass type matching like directories. No effect on a peer
    /// filter.
    pub fn traverse_packages(mut self, yes: bool) -> Self {
        if let FilterSource::Types {
            packages_traversable,
            ..
        } = &mut self.source
        {
            *packages_traversable = yes;
        }
        self
    }

    /// Build the hook for a request, or `None` when filtering is disabled.
    ///
    /// A peer takes precedence over the allowed file types.
    pub(crate) fn for_request(req: &DialogRequest) -> Option<Self> {
        if !req.has_filter() {
            return None;
        }
        if let Some(handle) = req.handle() {
            return Some(Self::from_peer(handle.clone()));
        }
        req.allowed_file_types().map(|types| {
            Self::from_types(types.iter().cloned())
                .traverse_packages(req.navigates_into_packages())
        })
    }

    /// Whether the picker should enable `path`.
    pub fn should_enable(&self, path: &Path, kind: EntryKind) -> bool {
        match &self.source {
            FilterSource::Types {
                types,
                packages_traversable,
            } => matches_types(types, *packages_traversable, path, kind),
            FilterSource::Peer(peer) => {
                match catch_unwind(AssertUnwindSafe(|| peer.should_show(path, kind))) {
                    Ok(Ok(show)) => show,
                    Ok(Err(_err)) => {
                        #[cfg(feature = "tracing")]
                        warn!(path = %path.display(), error = %_err, "entry filter failed");
                        false
                    }
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        warn!(path = %path.display(), "entry filter panicked");
                        false
                    }
                }
            }
        }
    }
}

fn matches_types(
    types: &[String],
    packages_traversable: bool,
    path: &Path,
    kind: EntryKind,
) -> bool {
    match kind {
        EntryKind::Dir => return true,
        EntryKind::Package if packages_traversable => return true,
        EntryKind::File | EntryKind::Package => {}
    }
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext {
        Some(e) => types.iter().any(|t| *t == e),
        None => false,
    }
}
