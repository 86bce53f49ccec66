//! # fsbridge
//!
//! A filesystem adapter that puts one generic contract in front of
//! pluggable storage backends.
//!
//! Key components:
//!
//! - [`Adapter`] - The contract: create/open, directories, rename, removal,
//!   temp files, symlinks, chroot
//! - [`Backend`] - Trait a storage backend implements, with optional
//!   [`Lstater`], [`Linker`] and [`LinkReader`] capabilities
//! - [`MemoryBackend`] - In-memory filesystem (testing, scratch space)
//! - [`OsBackend`] - Host filesystem via `std::fs`
//! - [`BasePathBackend`] - A backend confined to a subtree
//! - [`LockableFile`] - Handle with a root-relative name and advisory lock
//!
//! ## Design Decisions
//!
//! - **Parents on demand**: create, rename, symlink and temp-file calls make
//!   missing parent directories first (mode `0o755`). Not transactional.
//! - **Capability probes**: optional backend features are discovered through
//!   `Option<&dyn Trait>` probes; missing ones degrade (`link_stat`) or
//!   fail with [`FsError::Unsupported`] (`symlink`, `read_link`).
//! - **Per-adapter observation**: operations are reported to an
//!   [`Observer`], `tracing` by default. There is no global switch.
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//! use fsbridge::{Adapter, MemoryBackend};
//!
//! let fs = Adapter::new(Arc::new(MemoryBackend::new()), "");
//! let mut f = fs.create("docs/notes/today.txt")?;
//! f.write_all(b"hello")?;
//! assert!(fs.stat("docs/notes")?.is_dir());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![feature(io_error_more)]

pub mod adapter;
pub mod backend;
pub mod config;
mod error;
mod file;
pub mod observe;
pub mod path;
mod types;

pub use adapter::{Adapter, DEFAULT_CREATE_MODE, DEFAULT_DIRECTORY_MODE};
pub use backend::{
    Backend, BackendFile, BasePathBackend, LinkReader, Linker, Lstater, MemoryBackend, OsBackend,
};
pub use config::{AdapterBuilder, AdapterConfig, ConfigError};
pub use error::{FsError, FsResult};
pub use file::LockableFile;
pub use observe::{NoopObserver, Observer, OpEvent, TracingObserver};
pub use types::{
    BackendCapabilities, Capability, FileType, LinkMetadata, Metadata, OpenFlags, Support,
    MODE_DIR, MODE_FILE, MODE_SYMLINK, MODE_TYPE_MASK,
};
