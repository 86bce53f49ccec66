//! In-memory filesystem backend.
//!
//! Used for testing and scratch space. All data is ephemeral.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::SystemTime;

use super::{Backend, BackendFile, LinkReader, Linker, Lstater};
use crate::error::{FsError, FsResult};
use crate::path;
use crate::types::{FileType, Metadata, OpenFlags};

/// Symlink hops allowed while resolving one path.
const MAX_LINK_HOPS: usize = 40;

/// Contents of a regular file, shared between the store and open handles.
#[derive(Debug)]
struct FileData {
    bytes: Vec<u8>,
    perm: u32,
    mtime: SystemTime,
}

type SharedData = Arc<RwLock<FileData>>;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: SharedData },
    Directory { perm: u32, mtime: SystemTime },
    Symlink { target: String, mtime: SystemTime },
}

impl Entry {
    fn directory(perm: u32) -> Self {
        Entry::Directory {
            perm,
            mtime: SystemTime::now(),
        }
    }

    fn metadata(&self, name: &str) -> Metadata {
        match self {
            Entry::File { data } => {
                let data = data.read();
                Metadata {
                    name: name.to_string(),
                    size: data.bytes.len() as u64,
                    kind: FileType::File,
                    perm: data.perm,
                    mtime: data.mtime,
                }
            }
            Entry::Directory { perm, mtime } => Metadata {
                mtime: *mtime,
                ..Metadata::directory(name, *perm)
            },
            Entry::Symlink { target, mtime } => Metadata {
                mtime: *mtime,
                ..Metadata::symlink(name, target.len() as u64)
            },
        }
    }
}

/// In-memory filesystem backend.
///
/// Keys are cleaned paths without a leading `/`; the empty key is the root
/// directory, which always exists. Thread-safe via an internal `RwLock`.
/// Symlinks are followed during resolution, relative targets against the
/// directory holding the link.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(String::new(), Entry::directory(0o755));
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Normalize a path to a store key.
    fn key(path: &str) -> String {
        path::clean(&format!("/{path}"))
            .trim_start_matches('/')
            .to_string()
    }

    fn child_key(parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        }
    }

    fn display(key: &str) -> String {
        format!("/{key}")
    }

    /// Resolve symlinks in `key`. The last element is followed only when
    /// `follow_last` is set. Missing elements are kept as-is so the caller's
    /// lookup reports not-found.
    fn resolve(entries: &HashMap<String, Entry>, key: &str, follow_last: bool) -> FsResult<String> {
        let mut pending: VecDeque<String> = key
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let mut resolved = String::new();
        let mut hops = 0;

        while let Some(component) = pending.pop_front() {
            if component == ".." {
                resolved = match resolved.rfind('/') {
                    Some(idx) => resolved[..idx].to_string(),
                    None => String::new(),
                };
                continue;
            }

            let candidate = Self::child_key(&resolved, &component);
            let is_last = pending.is_empty();
            match entries.get(&candidate) {
                Some(Entry::Symlink { target, .. }) if !is_last || follow_last => {
                    hops += 1;
                    if hops > MAX_LINK_HOPS {
                        return Err(FsError::TooManySymlinks(Self::display(key)));
                    }
                    if target.starts_with('/') {
                        resolved.clear();
                    }
                    for part in target.split('/').rev() {
                        if !part.is_empty() && part != "." {
                            pending.push_front(part.to_string());
                        }
                    }
                }
                _ => resolved = candidate,
            }
        }
        Ok(resolved)
    }

    fn parent_key(key: &str) -> &str {
        match key.rfind('/') {
            Some(idx) => &key[..idx],
            None => "",
        }
    }

    fn name_of(key: &str) -> &str {
        match key.rfind('/') {
            Some(idx) => &key[idx + 1..],
            None => key,
        }
    }

    /// Require the parent of `key` to be an existing directory.
    fn check_parent(entries: &HashMap<String, Entry>, key: &str) -> FsResult<()> {
        let parent = Self::parent_key(key);
        match entries.get(parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(_) => Err(FsError::not_a_directory(Self::display(parent))),
            None => Err(FsError::not_found(Self::display(parent))),
        }
    }

    fn has_children(entries: &HashMap<String, Entry>, key: &str) -> bool {
        entries
            .keys()
            .any(|k| k != key && Self::parent_key(k) == key)
    }

    fn is_descendant(key: &str, ancestor: &str) -> bool {
        (ancestor.is_empty() && !key.is_empty()) || key.starts_with(&format!("{ancestor}/"))
    }

    fn lookup(&self, path: &str, follow_last: bool) -> FsResult<Metadata> {
        let entries = self.entries.read();
        let key = Self::key(path);
        let resolved = Self::resolve(&entries, &key, follow_last)?;
        let name = if key.is_empty() { "/" } else { Self::name_of(&key) };
        entries
            .get(&resolved)
            .map(|e| e.metadata(name))
            .ok_or_else(|| FsError::not_found(Self::display(&key)))
    }
}

impl Backend for MemoryBackend {
    fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn BackendFile>> {
        let mut entries = self.entries.write();
        let key = Self::resolve(&entries, &Self::key(path), true)?;

        let data = match entries.get(&key) {
            Some(Entry::File { data }) => {
                if flags.create && flags.exclusive {
                    return Err(FsError::already_exists(Self::display(&key)));
                }
                let data = Arc::clone(data);
                if flags.truncate && flags.writable() {
                    let mut guard = data.write();
                    guard.bytes.clear();
                    guard.mtime = SystemTime::now();
                }
                data
            }
            Some(Entry::Directory { .. }) => {
                return Err(FsError::is_a_directory(Self::display(&key)));
            }
            Some(Entry::Symlink { .. }) => {
                return Err(FsError::other(format!(
                    "unresolved symlink: {}",
                    Self::display(&key)
                )));
            }
            None => {
                if !flags.create {
                    return Err(FsError::not_found(Self::display(&key)));
                }
                Self::check_parent(&entries, &key)?;
                let data = Arc::new(RwLock::new(FileData {
                    bytes: Vec::new(),
                    perm,
                    mtime: SystemTime::now(),
                }));
                entries.insert(
                    key.clone(),
                    Entry::File {
                        data: Arc::clone(&data),
                    },
                );
                data
            }
        };

        Ok(Box::new(MemoryFile {
            name: Self::display(&key),
            data,
            pos: 0,
            flags,
            closed: false,
        }))
    }

    fn stat(&self, path: &str) -> FsResult<Metadata> {
        self.lookup(path, true)
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        let mut entries = self.entries.write();
        let key = Self::key(path);

        let mut current = String::new();
        for component in key.split('/').filter(|c| !c.is_empty()) {
            let candidate = Self::child_key(&current, component);
            let target = Self::resolve(&entries, &candidate, true)?;
            match entries.get(&target) {
                Some(Entry::Directory { .. }) => current = target,
                Some(_) => return Err(FsError::not_a_directory(Self::display(&candidate))),
                // a dangling link occupies the name
                None if matches!(entries.get(&candidate), Some(Entry::Symlink { .. })) => {
                    return Err(FsError::already_exists(Self::display(&candidate)));
                }
                None => {
                    entries.insert(target.clone(), Entry::directory(perm));
                    current = target;
                }
            }
        }
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let mut entries = self.entries.write();
        let from_key = Self::resolve(&entries, &Self::key(from), false)?;
        let to_key = Self::resolve(&entries, &Self::key(to), false)?;

        if from_key.is_empty() || to_key.is_empty() {
            return Err(FsError::permission_denied("cannot rename root"));
        }
        let entry = entries
            .get(&from_key)
            .cloned()
            .ok_or_else(|| FsError::not_found(Self::display(&from_key)))?;
        if from_key == to_key {
            return Ok(());
        }
        Self::check_parent(&entries, &to_key)?;

        let is_dir = matches!(entry, Entry::Directory { .. });
        if is_dir && Self::is_descendant(&to_key, &from_key) {
            return Err(FsError::invalid_path(format!(
                "cannot move {} into itself",
                Self::display(&from_key)
            )));
        }
        match entries.get(&to_key) {
            Some(Entry::Directory { .. }) if !is_dir => {
                return Err(FsError::is_a_directory(Self::display(&to_key)));
            }
            Some(Entry::Directory { .. }) if Self::has_children(&entries, &to_key) => {
                return Err(FsError::directory_not_empty(Self::display(&to_key)));
            }
            Some(_) if is_dir => {
                return Err(FsError::not_a_directory(Self::display(&to_key)));
            }
            _ => {}
        }

        entries.remove(&from_key);
        if is_dir {
            let children: Vec<String> = entries
                .keys()
                .filter(|k| Self::is_descendant(k, &from_key))
                .cloned()
                .collect();
            for child in children {
                if let Some(child_entry) = entries.remove(&child) {
                    let relative = &child[from_key.len()..];
                    entries.insert(format!("{to_key}{relative}"), child_entry);
                }
            }
        }
        entries.insert(to_key, entry);
        Ok(())
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        let mut entries = self.entries.write();
        let key = Self::resolve(&entries, &Self::key(path), false)?;

        if key.is_empty() {
            return Err(FsError::permission_denied("cannot remove root"));
        }
        match entries.get(&key) {
            Some(Entry::Directory { .. }) if Self::has_children(&entries, &key) => {
                Err(FsError::directory_not_empty(Self::display(&key)))
            }
            Some(_) => {
                entries.remove(&key);
                Ok(())
            }
            None => Err(FsError::not_found(Self::display(&key))),
        }
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        let mut entries = self.entries.write();
        let key = Self::resolve(&entries, &Self::key(path), false)?;

        if !entries.contains_key(&key) {
            return Ok(());
        }
        entries.retain(|k, _| !Self::is_descendant(k, &key));
        if !key.is_empty() {
            entries.remove(&key);
        }
        Ok(())
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let entries = self.entries.read();
        let key = Self::resolve(&entries, &Self::key(path), true)?;

        match entries.get(&key) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(FsError::not_a_directory(Self::display(&key))),
            None => return Err(FsError::not_found(Self::display(&key))),
        }

        let mut result: Vec<Metadata> = entries
            .iter()
            .filter(|(k, _)| !k.is_empty() && Self::parent_key(k) == key && **k != key)
            .map(|(k, e)| e.metadata(Self::name_of(k)))
            .collect();

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn lstater(&self) -> Option<&dyn Lstater> {
        Some(self)
    }

    fn linker(&self) -> Option<&dyn Linker> {
        Some(self)
    }

    fn link_reader(&self) -> Option<&dyn LinkReader> {
        Some(self)
    }
}

impl Lstater for MemoryBackend {
    fn lstat(&self, path: &str) -> FsResult<Metadata> {
        self.lookup(path, false)
    }
}

impl Linker for MemoryBackend {
    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        let mut entries = self.entries.write();
        let key = Self::resolve(&entries, &Self::key(link), false)?;

        if entries.contains_key(&key) {
            return Err(FsError::already_exists(Self::display(&key)));
        }
        Self::check_parent(&entries, &key)?;
        entries.insert(
            key,
            Entry::Symlink {
                target: target.to_string(),
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }
}

impl LinkReader for MemoryBackend {
    fn read_link(&self, link: &str) -> FsResult<String> {
        let entries = self.entries.read();
        let key = Self::resolve(&entries, &Self::key(link), false)?;

        match entries.get(&key) {
            Some(Entry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(FsError::NotASymlink(Self::display(&key))),
            None => Err(FsError::not_found(Self::display(&key))),
        }
    }
}

/// Open handle on a [`MemoryBackend`] file.
///
/// Shares contents with the store, so writes are visible to other handles
/// and to later opens immediately.
#[derive(Debug)]
pub struct MemoryFile {
    name: String,
    data: SharedData,
    pos: u64,
    flags: OpenFlags,
    closed: bool,
}

impl MemoryFile {
    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other(format!("file already closed: {}", self.name)));
        }
        Ok(())
    }

    fn check_writable(&self) -> io::Result<()> {
        self.check_open()?;
        if !self.flags.writable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("file not open for writing: {}", self.name),
            ));
        }
        Ok(())
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        if !self.flags.read {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("file not open for reading: {}", self.name),
            ));
        }

        let data = self.data.read();
        let len = data.bytes.len();
        let start = (self.pos as usize).min(len);
        let n = buf.len().min(len - start);
        buf[..n].copy_from_slice(&data.bytes[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

fn too_large(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::FileTooLarge,
        format!("file size exceeds addressable memory: {name}"),
    )
}

/// Zero-extend `bytes` to `len`, failing instead of aborting when the
/// allocation cannot be satisfied.
fn grow(bytes: &mut Vec<u8>, len: usize) -> io::Result<()> {
    bytes
        .try_reserve_exact(len - bytes.len())
        .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
    bytes.resize(len, 0);
    Ok(())
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_writable()?;

        let mut data = self.data.write();
        if self.flags.append {
            self.pos = data.bytes.len() as u64;
        }
        let offset = usize::try_from(self.pos).map_err(|_| too_large(&self.name))?;
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(|| too_large(&self.name))?;
        if end > data.bytes.len() {
            grow(&mut data.bytes, end)?;
        }
        data.bytes[offset..end].copy_from_slice(buf);
        data.mtime = SystemTime::now();
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_open()
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open()?;

        let len = self.data.read().bytes.len() as i64;
        let next = match pos {
            SeekFrom::Start(n) => Some(n as i64),
            SeekFrom::End(off) => len.checked_add(off),
            SeekFrom::Current(off) => (self.pos as i64).checked_add(off),
        };
        match next {
            Some(n) if n >= 0 => {
                self.pos = n as u64;
                Ok(self.pos)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

impl BackendFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> FsResult<Metadata> {
        let data = self.data.read();
        Ok(Metadata {
            name: path::base(&self.name),
            size: data.bytes.len() as u64,
            kind: FileType::File,
            perm: data.perm,
            mtime: data.mtime,
        })
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.check_writable()?;
        let size = usize::try_from(size).map_err(|_| too_large(&self.name))?;
        let mut data = self.data.write();
        if size > data.bytes.len() {
            grow(&mut data.bytes, size)?;
        } else {
            data.bytes.truncate(size);
        }
        data.mtime = SystemTime::now();
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        self.check_open()?;
        self.closed = true;
        Ok(())
    }
}
