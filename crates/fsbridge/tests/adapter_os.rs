//! Adapter behaviour against the host filesystem.
//!
//! Each test builds its own fixture tree in a fresh temp directory, mounts a
//! [`BasePathBackend`] over it and uses the temp directory as the adapter
//! root, so tests are free to mutate the tree and run in parallel.

use std::fs;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fsbridge::{
    path, Adapter, Backend, BasePathBackend, Capability, OpenFlags, OsBackend, DEFAULT_CREATE_MODE,
    DEFAULT_DIRECTORY_MODE,
};
use tempfile::TempDir;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ROOT_FILE_CONT: &str = "I'm in the root path";
const DIR_FILE_CONT1: &str = "I'm in a directory";
const DIR_FILE_CONT2: &str = "";
const DIR_FILE_CONT3: &str = "also in a directory";
const NESTED_FILE_CONT: &str = "I'm in a deeply nested path";

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    _dir: TempDir,
    root: String,
    fs: Adapter,
}

impl Fixture {
    /// Read a file through the restricted backend, bypassing the adapter.
    fn read(&self, name: &str) -> String {
        let mut buf = String::new();
        self.fs
            .backend()
            .open_file(name, OpenFlags::read(), 0)
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        buf
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

fn write(backend: &dyn Backend, name: &str, content: &str) {
    let mut f = backend
        .open_file(name, OpenFlags::create_truncate(), DEFAULT_CREATE_MODE)
        .unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn setup() -> Fixture {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let root = path::to_slash(&dir.path().to_string_lossy());
    let base: Arc<dyn Backend> =
        Arc::new(BasePathBackend::new(Arc::new(OsBackend::new()), &root).unwrap());

    for d in ["dir", "nested/test/dir", "dir/nested/test/folder"] {
        base.mkdir_all(d, DEFAULT_DIRECTORY_MODE).unwrap();
    }
    write(base.as_ref(), "root.file", ROOT_FILE_CONT);
    write(base.as_ref(), "dir/file1", DIR_FILE_CONT1);
    write(base.as_ref(), "dir/file.2", DIR_FILE_CONT2);
    write(base.as_ref(), "dir/3file", DIR_FILE_CONT3);
    write(base.as_ref(), "nested/test/dir/file", NESTED_FILE_CONT);
    write(base.as_ref(), "dir/nested/deleteMe", DIR_FILE_CONT1);
    write(base.as_ref(), "dir/nested/renameMe", DIR_FILE_CONT1);
    write(base.as_ref(), "dir/nested/test/folder/file1", DIR_FILE_CONT1);
    write(base.as_ref(), "dir/nested/test/folder/file2", DIR_FILE_CONT2);
    write(base.as_ref(), "dir/nested/test/folder/file3", DIR_FILE_CONT3);
    base.linker()
        .unwrap()
        .symlink("dir/file1", "dir/nested/test/symlink")
        .unwrap();

    let fs = Adapter::new(base, root.clone());
    Fixture { _dir: dir, root, fs }
}

fn assert_dir_listing(entries: &[fsbridge::Metadata]) {
    let listing: Vec<(&str, bool)> = entries
        .iter()
        .map(|m| (m.name.as_str(), m.is_dir()))
        .collect();
    assert_eq!(
        listing,
        vec![("3file", false), ("file.2", false), ("file1", false), ("nested", true)]
    );
}

// ============================================================================
// Filesystem tests
// ============================================================================

#[test]
fn test_create() {
    let fx = setup();
    let mut f = fx.fs.create("rootFile").unwrap();
    assert!(fx.fs.stat("rootFile").unwrap().is_file());

    f.write_all(DIR_FILE_CONT1.as_bytes()).unwrap();
    f.close().unwrap();
    assert_eq!(fx.read("rootFile"), DIR_FILE_CONT1);
}

#[test]
fn test_create_truncates_existing() {
    let fx = setup();
    let mut f = fx.fs.create("dir/3file").unwrap();
    f.write_all(b"short").unwrap();
    drop(f);
    assert_eq!(fx.read("dir/3file"), "short");
}

#[test]
fn test_create_makes_missing_parents() {
    let fx = setup();
    fx.fs.create("a/b/c/d/e/leaf").unwrap();
    let mut probe = fx.root.clone();
    for level in ["a", "b", "c", "d", "e"] {
        probe = format!("{probe}/{level}");
        assert!(fs::metadata(&probe).unwrap().is_dir(), "{probe} not created");
    }
}

#[test]
fn test_open_file() {
    let fx = setup();
    let mut f = fx.fs.open_file("root.file", OpenFlags::read(), 0).unwrap();
    let mut content = String::new();
    f.read_to_string(&mut content).unwrap();
    assert_eq!(content, ROOT_FILE_CONT);
}

#[test]
fn test_open_file_missing_read_only() {
    let fx = setup();
    assert!(fx.fs.open_file("no.file", OpenFlags::read(), 0).is_err());
}

#[test]
fn test_read_dir() {
    let fx = setup();
    assert_dir_listing(&fx.fs.read_dir("dir").unwrap());
    assert!(fx.fs.read_dir("missing").is_err());
}

#[test]
fn test_rename() {
    let fx = setup();
    fx.fs.rename("dir/nested/renameMe", "dir/nested/renamed").unwrap();
    assert_eq!(fx.read("dir/nested/renamed"), DIR_FILE_CONT1);
    assert!(fx.fs.stat("dir/nested/renameMe").is_err());
}

#[test]
fn test_rename_missing_source() {
    let fx = setup();
    assert!(fx.fs.rename("dir/nested/no", "dir/nested/fail").is_err());
    assert!(fx.fs.stat("dir/nested/fail").is_err());
}

#[test]
fn test_make_dir_all() {
    let fx = setup();
    fx.fs.make_dir_all("make/this/directory", DEFAULT_DIRECTORY_MODE).unwrap();
    assert!(fx.fs.stat("make/this/directory").unwrap().is_dir());
}

#[cfg(unix)]
#[test]
fn test_make_dir_all_ignores_mode() {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    let fx = setup();
    fx.fs.make_dir_all("restricted", 0o700).unwrap();
    fs::DirBuilder::new()
        .mode(DEFAULT_DIRECTORY_MODE)
        .create(format!("{}/reference", fx.root))
        .unwrap();

    let mode = |name: &str| {
        fs::metadata(format!("{}/{name}", fx.root))
            .unwrap()
            .permissions()
            .mode()
    };
    // both go through the same umask
    assert_eq!(mode("restricted"), mode("reference"));
}

#[test]
fn test_open() {
    let fx = setup();
    let mut f = fx.fs.open("dir/3file").unwrap();
    let mut data = String::new();
    f.read_to_string(&mut data).unwrap();
    assert_eq!(data, DIR_FILE_CONT3);

    assert!(fx.fs.open("no-file").is_err());
}

#[test]
fn test_open_is_read_only() {
    let fx = setup();
    let mut f = fx.fs.open("root.file").unwrap();
    assert!(f.write_all(b"nope").is_err());
}

#[test]
fn test_stat() {
    let fx = setup();
    let st = fx.fs.stat("nested/test/dir/file").unwrap();
    assert!(!st.is_dir());
    assert_eq!(st.size, NESTED_FILE_CONT.len() as u64);

    assert!(fx.fs.stat("nested/test/dir").unwrap().is_dir());
    assert!(fx.fs.stat("does-not-exist").unwrap_err().is_not_found());
}

#[test]
fn test_remove() {
    let fx = setup();
    fx.fs.remove("dir/nested/deleteMe").unwrap();
    assert!(fx.fs.stat("dir/nested/deleteMe").unwrap_err().is_not_found());
    assert!(fx.fs.remove("dir/nested/non-existant").unwrap_err().is_not_found());
}

#[test]
fn test_temp_file() {
    let fx = setup();
    let f = fx.fs.temp_file("dir/nested/test", "temp").unwrap();
    assert!(f.name().starts_with("/dir/nested/test/temp"), "{}", f.name());
    assert!(fx.fs.stat(f.name()).unwrap().is_file());
}

#[test]
fn test_temp_file_in_missing_dir() {
    let fx = setup();
    let f = fx.fs.temp_file("scratch/area", "t").unwrap();
    assert!(fx.fs.stat("scratch/area").unwrap().is_dir());
    assert!(fx.fs.stat(f.name()).is_ok());
}

#[test]
fn test_join() {
    let fx = setup();
    let cases: &[(&str, &[&str])] = &[
        ("test/join", &["test", "join"]),
        ("test/longer/join", &["test", "longer/join"]),
        ("test/join/fragment", &["test/join", "fragment"]),
        ("test/longer/join/fragment", &["test/longer", "join/fragment"]),
        ("join/test", &["join", "", "", "", "test"]),
        ("clean/join", &["clean///", "join"]),
        ("/absolute/join", &["///absolute////", "", "", "////join////"]),
    ];
    for (expected, input) in cases {
        assert_eq!(fx.fs.join(*input), *expected, "join of {input:?}");
    }
}

#[test]
fn test_remove_all() {
    let fx = setup();
    fx.fs.remove_all("dir/nested/test/folder").unwrap();
    assert!(fx.fs.stat("dir/nested/test/folder").is_err());
    fx.fs.remove_all("dir/nested/test/folder").unwrap();
    fx.fs.remove_all("not-there").unwrap();
}

#[test]
fn test_link_stat() {
    let fx = setup();
    let link = fx.fs.link_stat("dir/nested/test/symlink").unwrap();
    assert!(link.link_aware);
    assert!(link.metadata.is_symlink());

    let file = fx.fs.link_stat("dir/file1").unwrap();
    assert!(!file.metadata.is_symlink());

    assert!(fx.fs.link_stat("dir/not-real").is_err());
}

#[test]
fn test_symlink_to_file() {
    let fx = setup();
    fx.fs.symlink("dir/file1", "dir/nested/test/symlink2").unwrap();
    assert!(fx.fs.link_stat("dir/nested/test/symlink2").unwrap().metadata.is_symlink());
    assert_eq!(fx.read("dir/nested/test/symlink2"), DIR_FILE_CONT1);
}

#[test]
fn test_symlink_to_directory() {
    let fx = setup();
    fx.fs.symlink("dir", "symFolder").unwrap();
    assert!(fx.fs.link_stat("symFolder").unwrap().metadata.is_symlink());
    assert_dir_listing(&fx.fs.read_dir("symFolder").unwrap());
}

#[test]
fn test_symlink_dangling() {
    let fx = setup();
    fx.fs.symlink("not-there", "dir/nested/test/symlink3").unwrap();
    assert!(fx.fs.link_stat("dir/nested/test/symlink3").unwrap().metadata.is_symlink());
    assert!(fx.fs.open("dir/nested/test/symlink3").unwrap_err().is_not_found());
    assert!(fx.fs.stat("dir/nested/test/symlink3").unwrap_err().is_not_found());
}

#[test]
fn test_closed_handle_rejects_io() {
    let fx = setup();
    let mut f = fx.fs.create("dir/closing").unwrap();
    f.write_all(b"kept").unwrap();
    f.close().unwrap();

    assert!(f.write(b"lost").is_err());
    let mut buf = [0u8; 4];
    assert!(f.read(&mut buf).is_err());
    assert!(f.close().is_err());

    let mut content = String::new();
    fx.fs.open("dir/closing").unwrap().read_to_string(&mut content).unwrap();
    assert_eq!(content, "kept");
}

#[test]
fn test_symlink_creates_link_parents() {
    let fx = setup();
    fx.fs.symlink("dir/file1", "links/deep/l").unwrap();
    assert!(fx.fs.stat("links/deep").unwrap().is_dir());
}

#[test]
fn test_read_link() {
    let fx = setup();
    let dest = fx.fs.read_link("dir/nested/test/symlink").unwrap();
    assert_eq!(path::to_slash(&dest), "/dir/file1");
}

#[test]
fn test_chroot() {
    let fx = setup();
    let sub = fx.fs.chroot("dir").unwrap();
    assert_eq!(sub.root(), format!("{}/dir", fx.root));
    assert_dir_listing(&sub.read_dir("/").unwrap());

    let f = sub.create("inner").unwrap();
    assert_eq!(f.name(), "/inner");
    assert!(fs::metadata(format!("{}/dir/inner", fx.root)).is_ok());
}

#[test]
fn test_chroot_cannot_escape() {
    let fx = setup();
    let sub = fx.fs.chroot("dir").unwrap();
    assert!(sub.stat("../root.file").is_err());
    assert!(sub.open("../../etc/passwd").is_err());
}

#[test]
fn test_root() {
    let fx = setup();
    assert_eq!(fx.fs.root(), fx.root);
}

#[test]
fn test_capabilities() {
    let fx = setup();
    assert_eq!(fx.fs.capabilities(), Capability::DEFAULT);
    let caps = fx.fs.backend_capabilities();
    assert!(caps.lstat.is_supported());
    assert!(caps.readlink.is_supported());
}

// ============================================================================
// Handle names over the unrestricted host backend
// ============================================================================

#[test]
fn test_name_is_root_relative() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let root = path::to_slash(&dir.path().to_string_lossy());
    let fs = Adapter::new(Arc::new(OsBackend::new()), root.clone());

    let f = fs.create(&format!("{root}/sub/file.txt")).unwrap();
    assert_eq!(f.name(), "/sub/file.txt");

    let other = TempDir::new().unwrap();
    let outside = format!("{}/x", path::to_slash(&other.path().to_string_lossy()));
    let f = fs.create(&outside).unwrap();
    assert_eq!(f.name(), outside);
}

// ============================================================================
// File handle tests
// ============================================================================

#[test]
fn test_file_lock() {
    let fx = setup();
    let f = Arc::new(fx.fs.open("root.file").unwrap());
    f.lock().unwrap();

    let (tx, rx) = mpsc::channel();
    let second = Arc::clone(&f);
    let waiter = thread::spawn(move || {
        second.lock().unwrap();
        tx.send(()).unwrap();
        second.unlock().unwrap();
    });

    assert!(
        rx.recv_timeout(Duration::from_millis(50)).is_err(),
        "lock did not prevent another lock"
    );
    f.unlock().unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();

    assert!(f.unlock().is_err());
}

#[test]
fn test_separate_opens_lock_independently() {
    let fx = setup();
    let a = fx.fs.open("root.file").unwrap();
    let b = fx.fs.open("root.file").unwrap();
    a.lock().unwrap();
    assert!(b.try_lock());
    a.unlock().unwrap();
    b.unlock().unwrap();
}
