//! Filesystem backends.
//!
//! A backend supplies the storage primitives the [`Adapter`](crate::Adapter)
//! delegates to. Required operations live on [`Backend`]; link-aware
//! operations are optional and discovered at call time through the probe
//! methods (`lstater`, `linker`, `link_reader`), which return `None` when the
//! concrete backend does not implement them.
//!
//! Bundled implementations:
//!
//! - [`MemoryBackend`] - ephemeral in-memory store (link-aware)
//! - [`OsBackend`] - host filesystem paths
//! - [`BasePathBackend`] - view of another backend confined to a subtree

mod base_path;
mod memory;
mod os;

pub use base_path::BasePathBackend;
pub use memory::{MemoryBackend, MemoryFile};
pub use os::{OsBackend, OsFile};

use std::fmt::Debug;
use std::io::{Read, Seek, Write};

use rand::Rng;

use crate::error::{FsError, FsResult};
use crate::path;
use crate::types::{Metadata, OpenFlags};

/// Permission bits for files created by [`Backend::temp_file`].
pub const TEMP_FILE_MODE: u32 = 0o600;

/// Temp directory of backends without a host notion of one.
pub const DEFAULT_TEMP_DIR: &str = "/tmp";

const TEMP_FILE_ATTEMPTS: usize = 10_000;

/// An open file as returned by a backend.
///
/// Closing happens on drop; [`close`](BackendFile::close) exists for
/// backends that want to report a failure at that point.
pub trait BackendFile: Read + Write + Seek + Send + Debug {
    /// Path the file was opened under, in the backend's own form.
    fn name(&self) -> &str;

    /// Metadata of the open file.
    fn stat(&self) -> FsResult<Metadata>;

    /// Truncate or extend the file to `size` bytes.
    fn truncate(&mut self, size: u64) -> FsResult<()>;

    /// Flush contents to durable storage.
    fn sync_all(&mut self) -> FsResult<()> {
        Ok(())
    }

    /// Release the file. Further I/O may fail.
    fn close(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// Stat without following a terminal symlink.
pub trait Lstater {
    fn lstat(&self, path: &str) -> FsResult<Metadata>;
}

/// Symlink creation.
pub trait Linker {
    /// Create `link` pointing at `target`. `target` need not exist.
    fn symlink(&self, target: &str, link: &str) -> FsResult<()>;
}

/// Reading symlink targets.
pub trait LinkReader {
    fn read_link(&self, link: &str) -> FsResult<String>;
}

/// Storage primitives consumed by the adapter.
///
/// Paths are `/`-separated strings interpreted by the backend.
pub trait Backend: Send + Sync + Debug {
    /// Open `path` with the given flags, creating it with `perm` if asked to.
    fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn BackendFile>>;

    /// Metadata of `path`, following symlinks.
    fn stat(&self, path: &str) -> FsResult<Metadata>;

    /// Create `path` and any missing ancestors. Succeeds if it already is a
    /// directory.
    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()>;

    /// Rename `from` to `to`, replacing `to` if it is not a directory.
    fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &str) -> FsResult<()>;

    /// Remove `path` and everything below it. Succeeds if it does not exist.
    fn remove_all(&self, path: &str) -> FsResult<()>;

    /// Entries directly under `path`. Symlinks are reported as links.
    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>>;

    /// Directory used by [`temp_file`](Backend::temp_file) when it is given
    /// an empty `dir`.
    fn temp_dir(&self) -> String {
        DEFAULT_TEMP_DIR.to_string()
    }

    /// Create a new file in `dir` whose name starts with `prefix`. An empty
    /// `dir` means [`temp_dir`](Backend::temp_dir).
    ///
    /// The default implementation retries random names until an exclusive
    /// create succeeds.
    fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn BackendFile>> {
        let dir = if dir.is_empty() { self.temp_dir() } else { dir.to_string() };
        let dir = dir.as_str();
        for _ in 0..TEMP_FILE_ATTEMPTS {
            let name = temp_name(prefix);
            let candidate = path::join(&[dir, name.as_str()]);
            match self.open_file(&candidate, OpenFlags::create_exclusive(), TEMP_FILE_MODE) {
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                other => return other,
            }
        }
        Err(FsError::already_exists(format!(
            "no unused temp name for {prefix} in {dir}"
        )))
    }

    /// Link-aware stat, if supported.
    fn lstater(&self) -> Option<&dyn Lstater> {
        None
    }

    /// Symlink creation, if supported.
    fn linker(&self) -> Option<&dyn Linker> {
        None
    }

    /// Symlink reading, if supported.
    fn link_reader(&self) -> Option<&dyn LinkReader> {
        None
    }
}

/// `prefix` followed by nine random decimal digits.
fn temp_name(prefix: &str) -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{prefix}{n:09}")
}
