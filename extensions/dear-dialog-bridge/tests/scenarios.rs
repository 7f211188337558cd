use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use dear_dialog_bridge::{
    BridgeError, DialogBridge, DialogMode, DialogOutcome, DialogPeer, DialogRequest, EntryKind,
    PeerError, PickerError, ResponseCode, ScriptedPicker, UiThread,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct RejectAll;

impl DialogPeer for RejectAll {
    fn should_show(&self, _path: &Path, _kind: EntryKind) -> Result<bool, PeerError> {
        Ok(false)
    }
}

/// Runs `request` on a requester thread while the test thread acts as the UI thread.
fn run_dialog(request: DialogRequest, picker: ScriptedPicker) -> DialogOutcome {
    init_tracing();
    let ui = UiThread::bind_current();
    let handle = ui.handle();
    let requester =
        thread::spawn(move || DialogBridge::open_on(&handle, request, move || picker));
    ui.run_until(|| requester.is_finished());
    requester.join().unwrap().unwrap()
}

#[test]
fn open_two_files_and_accept() {
    let request = DialogRequest::builder(DialogMode::Open)
        .multi_select(true)
        .choose_files(true)
        .choose_directories(false)
        .build()
        .unwrap();
    let picker = ScriptedPicker::new()
        .files(["/a/x.txt", "/a/y.txt", "/a/z.txt"])
        .entry("/a/sub", EntryKind::Dir)
        .then_accept(["/a/x.txt", "/a/y.txt"]);

    let outcome = run_dialog(request, picker);
    assert_eq!(outcome.response(), ResponseCode::Accepted);
    assert_eq!(
        outcome.selected_paths(),
        &[PathBuf::from("/a/x.txt"), PathBuf::from("/a/y.txt")]
    );
}

#[test]
fn save_then_cancel() {
    let request = DialogRequest::builder(DialogMode::Save)
        .choose_files(true)
        .file_name("untitled.txt")
        .build()
        .unwrap();
    let outcome = run_dialog(request, ScriptedPicker::new().then_cancel());
    assert_eq!(outcome, DialogOutcome::canceled());
    assert!(outcome.selected_paths().is_empty());
}

#[test]
fn save_accepts_typed_destination() {
    let request = DialogRequest::builder(DialogMode::Save)
        .directory("/a")
        .build()
        .unwrap();
    let outcome = run_dialog(request, ScriptedPicker::new().then_accept(["/a/new.txt"]));
    assert_eq!(outcome.selected_paths(), &[PathBuf::from("/a/new.txt")]);
}

#[test]
fn single_selection_yields_one_path() {
    let request = DialogRequest::builder(DialogMode::Open).build().unwrap();
    let picker = ScriptedPicker::new()
        .files(["/a/x.txt", "/a/y.txt"])
        .then_accept(["/a/y.txt", "/a/x.txt"]);
    let outcome = run_dialog(request, picker);
    assert!(outcome.is_accepted());
    assert_eq!(outcome.selected_paths(), &[PathBuf::from("/a/y.txt")]);
}

#[test]
fn reject_all_filter_leaves_nothing_selectable() {
    init_tracing();
    let ui = UiThread::bind_current();
    let request = DialogRequest::builder(DialogMode::Open)
        .multi_select(true)
        .filter(Arc::new(RejectAll))
        .build()
        .unwrap();
    let bridge = DialogBridge::create(request).unwrap();
    let mut picker = ScriptedPicker::new()
        .files(["/a/x.txt", "/a/y.txt"])
        .then_accept(["/a/x.txt"]);

    bridge.present_on_ui_thread(&ui, &mut picker).unwrap();

    assert_eq!(picker.listing().len(), 2);
    assert_eq!(picker.selectable_count(), 0);
    assert_eq!(bridge.wait().response(), ResponseCode::Canceled);
    assert!(bridge.selected_paths().is_empty());
}

#[test]
fn type_filter_limits_selection() {
    let request = DialogRequest::builder(DialogMode::Open)
        .multi_select(true)
        .allowed_file_types(["png"])
        .filter_by_types(true)
        .build()
        .unwrap();
    let picker = ScriptedPicker::new()
        .files(["/img/a.png", "/img/b.txt", "/img/c.PNG"])
        .then_accept(["/img/a.png", "/img/b.txt", "/img/c.PNG"]);
    let outcome = run_dialog(request, picker);
    assert_eq!(
        outcome.selected_paths(),
        &[PathBuf::from("/img/a.png"), PathBuf::from("/img/c.PNG")]
    );
}

#[test]
fn type_filter_lets_traversable_packages_through() {
    let request = DialogRequest::builder(DialogMode::Open)
        .choose_directories(true)
        .navigate_packages(true)
        .allowed_file_types(["png"])
        .filter_by_types(true)
        .build()
        .unwrap();
    let picker = ScriptedPicker::new()
        .entry("/Apps/Foo.app", EntryKind::Package)
        .then_accept(["/Apps/Foo.app"]);
    let outcome = run_dialog(request, picker);
    assert_eq!(outcome.response(), ResponseCode::Accepted);
    assert_eq!(outcome.selected_paths(), &[PathBuf::from("/Apps/Foo.app")]);
}

#[test]
fn directory_only_request_cannot_pick_files() {
    let request = DialogRequest::builder(DialogMode::Open)
        .choose_files(false)
        .choose_directories(true)
        .build()
        .unwrap();
    let picker = ScriptedPicker::new()
        .files(["/a/x.txt"])
        .entry("/a/sub", EntryKind::Dir)
        .then_accept(["/a/x.txt", "/a/sub"]);
    let outcome = run_dialog(request, picker);
    assert_eq!(outcome.selected_paths(), &[PathBuf::from("/a/sub")]);
}

#[test]
fn picker_init_failure_is_a_cancel() {
    let request = DialogRequest::builder(DialogMode::Open)
        .directory("/does/not/exist")
        .build()
        .unwrap();
    let picker = ScriptedPicker::new()
        .fail_with(PickerError::InvalidDirectory("/does/not/exist".into()))
        .files(["/a/x.txt"])
        .then_accept(["/a/x.txt"]);
    let outcome = run_dialog(request, picker);
    assert_eq!(outcome, DialogOutcome::canceled());
}

#[test]
fn invalid_request_never_reaches_the_ui_thread() {
    let err = DialogRequest::builder(DialogMode::Open)
        .choose_files(false)
        .choose_directories(false)
        .multi_select(true)
        .navigate_packages(true)
        .create_directories(true)
        .title("Nothing to choose")
        .build()
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidConfiguration(_)));
}
