//! Host filesystem backend.
//!
//! Paths are passed to `std::fs` as given, so relative paths resolve against
//! the process working directory. Confine it with
//! [`BasePathBackend`](super::BasePathBackend) when callers must not reach
//! arbitrary host paths.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{Backend, BackendFile, LinkReader, Linker, Lstater};
use crate::error::FsResult;
use crate::path;
use crate::types::{FileType, Metadata, OpenFlags};

/// Host filesystem backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl OsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::fs::Metadata to Metadata.
    fn convert(name: &str, meta: &fs::Metadata) -> Metadata {
        let kind = if meta.file_type().is_symlink() {
            FileType::Symlink
        } else if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };

        Metadata {
            name: name.to_string(),
            size: meta.len(),
            kind,
            perm: Self::perm(meta),
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        }
    }

    #[cfg(unix)]
    fn perm(meta: &fs::Metadata) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    }

    #[cfg(not(unix))]
    fn perm(meta: &fs::Metadata) -> u32 {
        if meta.permissions().readonly() {
            0o444
        } else {
            0o666
        }
    }

    fn entry_name(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path::base(&path::to_slash(path)))
    }

    fn open_options(flags: OpenFlags, perm: u32) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        options
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate && flags.writable());
        if flags.create && flags.exclusive {
            options.create_new(true);
        } else {
            options.create(flags.create);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;

        options
    }
}

impl Backend for OsBackend {
    fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> FsResult<Box<dyn BackendFile>> {
        let file = Self::open_options(flags, perm).open(path)?;
        Ok(Box::new(OsFile {
            name: path.to_string(),
            file: Some(file),
        }))
    }

    fn stat(&self, path: &str) -> FsResult<Metadata> {
        let meta = fs::metadata(path)?;
        Ok(Self::convert(&Self::entry_name(path), &meta))
    }

    fn mkdir_all(&self, path: &str, perm: u32) -> FsResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(perm);
        }
        #[cfg(not(unix))]
        let _ = perm;

        builder.create(path)?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = fs::symlink_metadata(entry.path())?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::convert(&name, &meta));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn temp_dir(&self) -> String {
        path::to_slash(&std::env::temp_dir().to_string_lossy())
    }

    fn lstater(&self) -> Option<&dyn Lstater> {
        Some(self)
    }

    fn linker(&self) -> Option<&dyn Linker> {
        if cfg!(unix) { Some(self) } else { None }
    }

    fn link_reader(&self) -> Option<&dyn LinkReader> {
        Some(self)
    }
}

impl Lstater for OsBackend {
    fn lstat(&self, path: &str) -> FsResult<Metadata> {
        let meta = fs::symlink_metadata(path)?;
        Ok(Self::convert(&Self::entry_name(path), &meta))
    }
}

impl Linker for OsBackend {
    #[cfg(unix)]
    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        std::os::unix::fs::symlink(target, link)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn symlink(&self, target: &str, link: &str) -> FsResult<()> {
        Err(crate::FsError::unsupported("symlink", target, link))
    }
}

impl LinkReader for OsBackend {
    fn read_link(&self, link: &str) -> FsResult<String> {
        let target = fs::read_link(link)?;
        Ok(target.to_string_lossy().into_owned())
    }
}

/// Open handle on a host file. The descriptor is released by
/// [`close`](BackendFile::close) or on drop.
#[derive(Debug)]
pub struct OsFile {
    name: String,
    file: Option<fs::File>,
}

impl OsFile {
    fn file(&self) -> io::Result<&fs::File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::other(format!("file already closed: {}", self.name)))
    }

    fn file_mut(&mut self) -> io::Result<&mut fs::File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(io::Error::other(format!("file already closed: {}", self.name))),
        }
    }
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut()?.read(buf)
    }
}

impl Write for OsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Seek for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()?.seek(pos)
    }
}

impl BackendFile for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> FsResult<Metadata> {
        let meta = self.file()?.metadata()?;
        Ok(OsBackend::convert(&OsBackend::entry_name(&self.name), &meta))
    }

    fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.file()?.set_len(size)?;
        Ok(())
    }

    fn sync_all(&mut self) -> FsResult<()> {
        self.file()?.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        let file = self.file.take();
        match file {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(io::Error::other(format!("file already closed: {}", self.name)).into()),
        }
    }
}
