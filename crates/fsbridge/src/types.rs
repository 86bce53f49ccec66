//! Core filesystem types.
//!
//! Shared by the adapter, the backend traits and the bundled backends.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Mask selecting the file-type bits of [`Metadata::mode`].
pub const MODE_TYPE_MASK: u32 = 0o170000;
/// File-type bits of a regular file.
pub const MODE_FILE: u32 = 0o100000;
/// File-type bits of a directory.
pub const MODE_DIR: u32 = 0o040000;
/// File-type bits of a symbolic link.
pub const MODE_SYMLINK: u32 = 0o120000;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => MODE_FILE,
            FileType::Directory => MODE_DIR,
            FileType::Symlink => MODE_SYMLINK,
        }
    }
}

/// Entry metadata, as returned by stat, lstat and directory listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Base name of the entry (not the full path).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl Metadata {
    /// Metadata for a regular file.
    pub fn file(name: impl Into<String>, size: u64, perm: u32) -> Self {
        Self {
            name: name.into(),
            size,
            kind: FileType::File,
            perm,
            mtime: SystemTime::now(),
        }
    }

    /// Metadata for a directory.
    pub fn directory(name: impl Into<String>, perm: u32) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: FileType::Directory,
            perm,
            mtime: SystemTime::now(),
        }
    }

    /// Metadata for a symlink; its size is the length of the target.
    pub fn symlink(name: impl Into<String>, target_len: u64) -> Self {
        Self {
            name: name.into(),
            size: target_len,
            kind: FileType::Symlink,
            perm: 0o777,
            mtime: SystemTime::now(),
        }
    }

    /// Full mode: file-type bits combined with permission bits.
    pub fn mode(&self) -> u32 {
        self.kind.mode_bits() | (self.perm & 0o7777)
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// Result of [`Adapter::link_stat`](crate::Adapter::link_stat).
///
/// `link_aware` is false when the backend cannot stat a link without
/// following it; `metadata` then describes the link's target and can never
/// report [`FileType::Symlink`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMetadata {
    pub metadata: Metadata,
    pub link_aware: bool,
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Create with write access.
    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Append to an existing file, creating it if needed.
    pub fn append() -> Self {
        Self {
            read: false,
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    /// Returns true if the flags allow modifying file contents.
    pub fn writable(&self) -> bool {
        self.write || self.append
    }
}

bitflags! {
    /// Operation classes an adapter supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capability: u32 {
        const WRITE = 1 << 0;
        const READ = 1 << 1;
        const READ_AND_WRITE = 1 << 2;
        const SEEK = 1 << 3;
        const TRUNCATE = 1 << 4;
        const LOCK = 1 << 5;
    }
}

impl Capability {
    /// The static capability set every adapter reports.
    pub const DEFAULT: Capability = Capability::WRITE
        .union(Capability::READ)
        .union(Capability::READ_AND_WRITE)
        .union(Capability::SEEK)
        .union(Capability::TRUNCATE)
        .union(Capability::LOCK);
}

/// Availability of one optional backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Support {
    Supported,
    Unsupported,
}

impl Support {
    pub fn is_supported(&self) -> bool {
        matches!(self, Support::Supported)
    }

    pub(crate) fn from_probe<T: ?Sized>(probe: Option<&T>) -> Self {
        if probe.is_some() {
            Support::Supported
        } else {
            Support::Unsupported
        }
    }
}

/// Optional capabilities probed on a concrete backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Stat without following a terminal symlink.
    pub lstat: Support,
    /// Symlink creation.
    pub symlink: Support,
    /// Reading a symlink target.
    pub readlink: Support,
}
