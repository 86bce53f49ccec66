//! Subtree-restricted backend view.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use super::{Backend, BackendFile, DEFAULT_TEMP_DIR, LinkReader, Linker, Lstater};
use crate::error::{FsError, FsResult};
use crate::path;
use crate::types::{Metadata, OpenFlags};

/// A backend confined to `base` on an inner backend.
///
/// Every path is joined onto `base` before it reaches the inner backend and
/// rejected if the joined path leaves it. Names coming back out (file handle
/// names, symlink targets) have `base` stripped again, so callers only ever
/// see paths inside the view, rooted at `/`.
#[derive(Debug, Clone)]
pub struct BasePathBackend {
    inner: Arc<dyn Backend>,
    base: String,
}

impl BasePathBackend {
    /// Restrict `inner` to `base`.
    ///
    /// Fails if `base` is empty or climbs above the inner backend's starting
    /// point (a relative base beginning with `..`).
    pub fn new(inner: Arc<dyn Backend>, base: &str) -> FsResult<Self> {
        if base.is_empty() {
            return Err(FsError::invalid_path("empty base path"));
        }
        let base = path::clean(&path::to_slash(base));
        if base == ".." || base.starts_with("../") {
            return Err(FsError::path_escapes_root(base));
        }
        Ok(Self { inner, base })
    }

    /// The base path on the inner backend.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path on the inner backend for `name`.
    pub fn real_path(&self, name: &str) -> FsResult<String> {
        let full = path::join(&[self.base.as_str(), name]);
        if self.contains(&full) {
            Ok(full)
        } else {
            Err(FsError::path_escapes_root(name))
        }
    }

    fn contains(&self, full: &str) -> bool {
        match self.base.as_str() {
            "/" => full.starts_with('/'),
            "." => full != ".." && !full.starts_with("../") && !full.starts_with('/'),
            base => full == base || full.starts_with(&format!("{base}/")),
        }
    }

    /// Inner path with `base` removed, rooted at `/`.
    fn strip(&self, inner_path: &str) -> String {
        let inner_path = path::to_slash(inner_path);
        let rooted_base = format!("/{}", self.base.trim_start_matches('/'));
        let rest = match self.base.as_str() {
            "." | "/" => inner_path.as_str(),
            base => inner_path
                .strip_prefix(base)
                .or_else(|| inner_path.strip_prefix(rooted_base.as_str()))
                .unwrap_or(&inner_path),
        };
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        }
    }

    fn wrap(&self, file: Box<dyn BackendFile>) -> Box<dyn BackendFile> {
        let name = self.strip(file.name());
        Box::new(BasePathFile { inner: file, name })
    }
}

impl Backend for BasePathBackend {
    fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn BackendFile>> {
        let file = self.inner.open_file(&self.real_path(path)?, flags, perm)?;
        Ok(self.wrap(file))
    }

    fn stat(&self, path: &str) -> FsResult<Metadata> {
        self.inner.stat(&self.real_path(path)?)
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        self.inner.mkdir_all(&self.real_path(path)?, perm)
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        self.inner
            .rename(&self.real_path(from)?, &self.real_path(to)?)
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        self.inner.remove(&self.real_path(path)?)
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        self.inner.remove_all(&self.real_path(path)?)
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>> {
        self.inner.read_dir(&self.real_path(path)?)
    }

    /// Inside the view; the inner backend's temp directory is usually outside it.
    fn temp_dir(&self) -> String {
        DEFAULT_TEMP_DIR.to_string()
    }

    fn temp_file(&self, dir: &str, prefix: &str) -> FsResult<Box<dyn BackendFile>> {
        let dir = if dir.is_empty() { self.temp_dir() } else { dir.to_string() };
        let file = self.inner.temp_file(&self.real_path(&dir)?, prefix)?;
        Ok(self.wrap(file))
    }

    fn lstater(&self) -> Option<&dyn Lstater> {
        self.inner.lstater().map(|_| self as &dyn Lstater)
    }

    fn linker(&self) -> Option<&dyn Linker> {
        self.inner.linker().map(|_| self as &dyn Linker)
    }

    fn link_reader(&self) -> Option<&dyn LinkReader> {
        self.inner.link_reader().map(|_| self as &dyn LinkReader)
    }
}

impl Lstater for BasePathBackend {
    fn lstat(&self, path: &str) -> FsResult<Metadata> {
        let real = self.real_path(path)?;
        match self.inner.lstater() {
            Some(lstater) => lstater.lstat(&real),
            None => self.inner.stat(&real),
        }
    }
}

impl Linker for BasePathBackend {
    /// The target is placed inside the view too, so `target` names a path
    /// relative to the view's root rather than to the link.
    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        let linker = self
            .inner
            .linker()
            .ok_or_else(|| FsError::unsupported("symlink", target, link))?;
        linker.symlink(&self.real_path(target)?, &self.real_path(link)?)
    }
}

impl LinkReader for BasePathBackend {
    fn read_link(&self, link: &str) -> FsResult<String> {
        let reader = self
            .inner
            .link_reader()
            .ok_or_else(|| FsError::unsupported("readlink", link, ""))?;
        let target = reader.read_link(&self.real_path(link)?)?;
        Ok(self.strip(&target))
    }
}

/// File handle whose name is reported relative to the view.
#[derive(Debug)]
struct BasePathFile {
    inner: Box<dyn BackendFile>,
    name: String,
}

impl Read for BasePathFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BasePathFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for BasePathFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl BackendFile for BasePathFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> FsResult<Metadata> {
        self.inner.stat()
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.inner.truncate(size)
    }

    fn sync_all(&mut self) -> FsResult<()> {
        self.inner.sync_all()
    }

    fn close(&mut self) -> FsResult<()> {
        self.inner.close()
    }
}
