//! File handles returned by the adapter.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::backend::BackendFile;
use crate::error::{FsError, FsResult};
use crate::types::Metadata;

/// A backend file handle with a root-relative name and an advisory lock.
///
/// I/O is forwarded to the backend handle. `Read`, `Write` and `Seek` are
/// implemented for `&LockableFile` as well, so one handle can be shared
/// behind an `Arc` and used from several threads; each call takes the inner
/// handle for its duration only.
///
/// The advisory lock belongs to this handle instance. Two opens of the same
/// path get independent locks, and the backend never sees it.
pub struct LockableFile {
    inner: Mutex<Box<dyn BackendFile>>,
    name: String,
    locked: Mutex<bool>,
    released: Condvar,
}

impl fmt::Debug for LockableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockableFile")
            .field("name", &self.name)
            .field("locked", &*self.locked.lock())
            .finish()
    }
}

impl LockableFile {
    /// Wrap `file`, reporting `name` from [`name`](Self::name).
    pub fn new(file: Box<dyn BackendFile>, name: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(file),
            name: name.into(),
            locked: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Root-relative display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the handle's lock, blocking until it is free.
    ///
    /// Not reentrant: locking twice from the same thread without unlocking
    /// in between deadlocks.
    pub fn lock(&self) -> FsResult<()> {
        let mut locked = self.locked.lock();
        while *locked {
            self.released.wait(&mut locked);
        }
        *locked = true;
        Ok(())
    }

    /// Acquire the lock if it is free. Returns false if it is held.
    pub fn try_lock(&self) -> bool {
        let mut locked = self.locked.lock();
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    /// Release the handle's lock.
    ///
    /// Fails with [`FsError::NotLocked`] when the lock is not held.
    pub fn unlock(&self) -> FsResult<()> {
        let mut locked = self.locked.lock();
        if !*locked {
            return Err(FsError::NotLocked(self.name.clone()));
        }
        *locked = false;
        drop(locked);
        self.released.notify_one();
        Ok(())
    }

    /// Returns true while the lock is held.
    pub fn is_locked(&self) -> bool {
        *self.locked.lock()
    }

    /// Metadata of the open file.
    pub fn stat(&self) -> FsResult<Metadata> {
        self.inner.lock().stat()
    }

    /// Truncate or extend the file to `size` bytes.
    pub fn truncate(&self, size: u64) -> FsResult<()> {
        self.inner.lock().truncate(size)
    }

    /// Flush contents to durable storage.
    pub fn sync_all(&self) -> FsResult<()> {
        self.inner.lock().sync_all()
    }

    /// Close the backend handle.
    pub fn close(&self) -> FsResult<()> {
        self.inner.lock().close()
    }
}

impl Read for &LockableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.lock().read(buf)
    }
}

impl Write for &LockableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl Seek for &LockableFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

impl Read for LockableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut this: &LockableFile = self;
        this.read(buf)
    }
}

impl Write for LockableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &LockableFile = self;
        this.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut this: &LockableFile = self;
        this.flush()
    }
}

impl Seek for LockableFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut this: &LockableFile = self;
        this.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crate::types::OpenFlags;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn open(name: &str) -> LockableFile {
        let backend = MemoryBackend::new();
        let file = backend
            .open_file("f", OpenFlags::create_truncate(), 0o644)
            .unwrap();
        LockableFile::new(file, name)
    }

    #[test]
    fn test_name_override() {
        let f = open("/display/name");
        assert_eq!(f.name(), "/display/name");
    }

    #[test]
    fn test_io_forwarding() {
        let mut f = open("f");
        f.write_all(b"hello").unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = String::new();
        f.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");

        f.truncate(2).unwrap();
        assert_eq!(f.stat().unwrap().size, 2);
    }

    #[test]
    fn test_unlock_without_lock_errors() {
        let f = open("f");
        assert!(matches!(f.unlock(), Err(FsError::NotLocked(_))));

        f.lock().unwrap();
        f.unlock().unwrap();
        assert!(matches!(f.unlock(), Err(FsError::NotLocked(_))));
    }

    #[test]
    fn test_try_lock() {
        let f = open("f");
        assert!(f.try_lock());
        assert!(f.is_locked());
        assert!(!f.try_lock());
        f.unlock().unwrap();
        assert!(!f.is_locked());
    }

    #[test]
    fn test_lock_blocks_second_locker() {
        let f = Arc::new(open("f"));
        f.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&f);
        let handle = thread::spawn(move || {
            other.lock().unwrap();
            tx.send(()).unwrap();
            other.unlock().unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        f.unlock().unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(!f.is_locked());
    }

    #[test]
    fn test_independent_handles_do_not_share_lock() {
        let a = open("same");
        let b = open("same");
        a.lock().unwrap();
        assert!(b.try_lock());
        b.unlock().unwrap();
        a.unlock().unwrap();
    }
}
