//! The filesystem adapter.
//!
//! [`Adapter`] exposes a generic filesystem contract on top of any
//! [`Backend`]. On the way through it:
//!
//! - creates missing parent directories before create, rename, symlink and
//!   temp-file calls
//! - renames returned handles to their root-relative path
//! - probes the backend for link support and degrades or reports
//!   [`FsError::Unsupported`] when it is missing
//! - wraps handles in a [`LockableFile`] carrying an advisory lock
//!
//! Parent directories created ahead of a mutating call stay behind if that
//! call then fails; nothing is rolled back.

use std::fmt;
use std::sync::Arc;

use crate::backend::{Backend, BackendFile, BasePathBackend};
use crate::error::{FsError, FsResult};
use crate::file::LockableFile;
use crate::observe::{OpEvent, Observer, TracingObserver};
use crate::path;
use crate::types::{
    BackendCapabilities, Capability, LinkMetadata, Metadata, OpenFlags, Support,
};

/// Mode for every directory the adapter creates.
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;
/// Mode for files created by [`Adapter::create`].
pub const DEFAULT_CREATE_MODE: u32 = 0o666;

/// Filesystem adapter over a shared backend.
///
/// Cheap to clone; clones share the backend and observer.
#[derive(Clone)]
pub struct Adapter {
    backend: Arc<dyn Backend>,
    root: String,
    observer: Arc<dyn Observer>,
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("backend", &self.backend)
            .field("root", &self.root)
            .finish()
    }
}

impl Adapter {
    /// Adapter over `backend` that reports operations through `tracing`.
    ///
    /// `root` is the prefix stripped from handle names; it should match how
    /// the backend reports paths (e.g. the host directory for an
    /// [`OsBackend`](crate::OsBackend)).
    pub fn new(backend: Arc<dyn Backend>, root: impl Into<String>) -> Self {
        Self::with_observer(backend, root, Arc::new(TracingObserver))
    }

    /// Adapter reporting operations to `observer`.
    pub fn with_observer(
        backend: Arc<dyn Backend>,
        root: impl Into<String>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            backend,
            root: root.into(),
            observer,
        }
    }

    fn observe(&self, op: &'static str, paths: &[&str]) {
        self.observer.on_op(&OpEvent { op, paths });
    }

    /// Create `filename` for reading and writing, truncating it if it exists.
    ///
    /// Missing parent directories are created first.
    pub fn create(&self, filename: &str) -> FsResult<LockableFile> {
        self.observe("create", &[filename]);
        self.open_file(filename, OpenFlags::create_truncate(), DEFAULT_CREATE_MODE)
    }

    /// Open `filename` read-only.
    pub fn open(&self, filename: &str) -> FsResult<LockableFile> {
        self.observe("open", &[filename]);
        self.open_file(filename, OpenFlags::read(), 0)
    }

    /// Generalized open. With `flags.create` set, missing parent directories
    /// are created before the backend is asked to open the file.
    pub fn open_file(&self, filename: &str, flags: OpenFlags, perm: u32) -> FsResult<LockableFile> {
        self.observe("open_file", &[filename]);
        if flags.create {
            self.create_parent_dirs(filename)?;
        }

        let file = self.backend.open_file(filename, flags, perm)?;
        Ok(self.wrap(file))
    }

    fn wrap(&self, file: Box<dyn BackendFile>) -> LockableFile {
        let name = path::strip_root(file.name(), &self.root);
        LockableFile::new(file, name)
    }

    /// Create every missing directory above `fullpath`.
    fn create_parent_dirs(&self, fullpath: &str) -> FsResult<()> {
        self.observe("create_dir", &[fullpath]);
        let dir = path::dir(fullpath);
        if dir != "." {
            self.backend.mkdir_all(&dir, DEFAULT_DIRECTORY_MODE)?;
        }
        Ok(())
    }

    /// Entries of directory `dirname`, sorted by name.
    pub fn read_dir(&self, dirname: &str) -> FsResult<Vec<Metadata>> {
        self.observe("read_dir", &[dirname]);
        let mut entries = self.backend.read_dir(dirname)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Rename `from` to `to`, creating the parent directories of `to`.
    ///
    /// Replaces `to` if it exists and is not a directory.
    pub fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        self.observe("rename", &[from, to]);
        self.create_parent_dirs(to)?;
        self.backend.rename(from, to)
    }

    /// Create `dir` and any missing ancestors; a no-op if it already is a
    /// directory.
    ///
    /// `perm` is accepted for interface compatibility but ignored: every
    /// directory is created with [`DEFAULT_DIRECTORY_MODE`].
    pub fn make_dir_all(&self, dir: &str, perm: u32) -> FsResult<()> {
        self.observe("make_dir_all", &[dir]);
        if perm != DEFAULT_DIRECTORY_MODE {
            tracing::trace!(
                requested = format_args!("{perm:o}"),
                applied = format_args!("{DEFAULT_DIRECTORY_MODE:o}"),
                "ignoring requested directory mode"
            );
        }
        self.backend.mkdir_all(dir, DEFAULT_DIRECTORY_MODE)
    }

    /// Metadata of `filename`, following symlinks.
    pub fn stat(&self, filename: &str) -> FsResult<Metadata> {
        self.observe("stat", &[filename]);
        self.backend.stat(filename)
    }

    /// Metadata of `filename` without following a terminal symlink.
    ///
    /// When the backend cannot stat links, falls back to [`stat`](Self::stat)
    /// and reports `link_aware: false`.
    pub fn link_stat(&self, filename: &str) -> FsResult<LinkMetadata> {
        self.observe("link_stat", &[filename]);
        match self.backend.lstater() {
            Some(lstater) => Ok(LinkMetadata {
                metadata: lstater.lstat(filename)?,
                link_aware: true,
            }),
            None => Ok(LinkMetadata {
                metadata: self.backend.stat(&path::clean(filename))?,
                link_aware: false,
            }),
        }
    }

    /// Remove a file or empty directory.
    pub fn remove(&self, filename: &str) -> FsResult<()> {
        self.observe("remove", &[filename]);
        self.backend.remove(filename)
    }

    /// Remove `path` and everything below it. Succeeds if it does not exist.
    pub fn remove_all(&self, path: &str) -> FsResult<()> {
        self.observe("remove_all", &[path]);
        self.backend.remove_all(&path::clean(path))
    }

    /// Create a uniquely named file in `dir` whose name begins with
    /// `prefix`, creating `dir` if needed. An empty `dir` means the
    /// backend's [`temp_dir`](Backend::temp_dir).
    ///
    /// The caller removes the file when done with it.
    pub fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<LockableFile> {
        self.observe("temp_file", &[dir, prefix]);
        let dir = if dir.is_empty() { self.backend.temp_dir() } else { dir.to_string() };
        self.create_parent_dirs(&format!("{dir}/"))?;

        let file = self.backend.temp_file(&dir, prefix)?;
        let file = self.wrap(file);
        self.observe("temp_file.created", &[file.name()]);
        Ok(file)
    }

    /// Join path elements with `/`, ignoring empty elements, and clean the
    /// result.
    pub fn join<S: AsRef<str>>(&self, elems: &[S]) -> String {
        path::join(elems)
    }

    /// Create `link` pointing at `target`, creating the parent directories
    /// of `link`.
    ///
    /// Fails with [`FsError::Unsupported`] if the backend cannot create
    /// symlinks; the parent directories are created regardless.
    pub fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        self.observe("symlink", &[target, link]);
        self.create_parent_dirs(link)?;

        match self.backend.linker() {
            Some(linker) => linker.symlink(target, link),
            None => Err(FsError::unsupported("symlink", target, link)),
        }
    }

    /// Target of symlink `link`.
    pub fn read_link(&self, link: &str) -> FsResult<String> {
        self.observe("read_link", &[link]);
        match self.backend.link_reader() {
            Some(reader) => reader.read_link(link),
            None => Err(FsError::unsupported("readlink", link, "")),
        }
    }

    /// A new adapter confined to `subpath` of this one.
    ///
    /// Its root is this root joined with `subpath`. Fails if the backend
    /// restriction cannot be built.
    pub fn chroot(&self, subpath: &str) -> FsResult<Adapter> {
        self.observe("chroot", &[subpath]);
        let restricted = BasePathBackend::new(Arc::clone(&self.backend), subpath)?;
        Ok(Adapter {
            backend: Arc::new(restricted),
            root: path::join(&[self.root.as_str(), subpath]),
            observer: Arc::clone(&self.observer),
        })
    }

    /// The root this adapter strips from handle names.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Operation classes supported by every adapter.
    pub fn capabilities(&self) -> Capability {
        Capability::DEFAULT
    }

    /// Optional capabilities of the backend behind this adapter.
    pub fn backend_capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            lstat: Support::from_probe(self.backend.lstater()),
            symlink: Support::from_probe(self.backend.linker()),
            readlink: Support::from_probe(self.backend.link_reader()),
        }
    }

    /// The backend this adapter delegates to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}
