//! Log store — the file header, the stack pointer, and push/pop/scan
//! primitives layered on the frame codec.
//!
//! # On-disk layout (13-byte header, all integers big-endian)
//!
//! ```text
//! 0   4   magic          = "oats"
//! 4   1   major version  = 1
//! 5   8   stack_pointer  (absolute file offset, one past the last frame)
//! 13  *   stack body: a sequence of framed entries up to stack_pointer
//! ```
//!
//! # Crash safety
//! The stack pointer is always the *last* write of any append: a writer
//! calls [`LogStore::push_item`] (which extends the file via the frame
//! codec) and only then [`LogStore::write_stack_ptr`] to publish the new
//! length. A reader that opens the file mid-append sees either the
//! pre-append or the post-append state, never a torn one — any bytes
//! written past the last-published stack pointer are simply invisible
//! until a later push overwrites and then republishes past them.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

use crate::frame::{self, FrameError};

pub const MAGIC: &[u8; 4] = b"oats";
pub const MAJOR_VERSION: u8 = 1;
/// Fixed header size: 4 (magic) + 1 (version) + 8 (stack pointer).
pub const HEADER_SIZE: u64 = 13;
const STACK_PTR_OFFSET: u64 = 5;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database file not found")]
    NotFound,
    #[error("invalid magic number — not an oats database")]
    MagicMismatch,
    #[error("unsupported major version {0} (this build handles version {MAJOR_VERSION})")]
    VersionMismatch(u8),
    #[error("stack pointer {0} is before the stack body start")]
    InvalidStackPointer(u64),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write a fresh 13-byte header (magic + version + stack pointer pointing
/// at the empty stack body) to `w` at its current position, which must
/// be offset 0.
pub fn write_header<W: Write + Seek>(w: &mut W) -> Result<(), StoreError> {
    w.write_all(MAGIC)?;
    w.write_u8(MAJOR_VERSION)?;
    w.write_u64::<BigEndian>(HEADER_SIZE)?;
    Ok(())
}

/// Create a brand-new, empty store at `path`, overwriting anything there.
pub fn initialize<P: AsRef<Path>>(path: P) -> Result<(), StoreError> {
    let mut f = File::create(path)?;
    write_header(&mut f)?;
    Ok(())
}

/// One open log store: a file handle plus the in-memory stack pointer.
/// `stack_ptr` is loaded from disk on open and only ever written back via
/// [`write_stack_ptr`](Self::write_stack_ptr) — callers must call that
/// explicitly after any mutation they want persisted (this is what makes
/// `tail` a non-destructive backward scan and `pop` a destructive one).
pub struct LogStore<F> {
    file: F,
    pub stack_ptr: u64,
}

impl LogStore<File> {
    /// Open an existing store at `path`, validating magic and version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StoreError::NotFound
                } else {
                    StoreError::Io(e)
                }
            })?;
        Self::from_stream(file)
    }
}

impl<F: Read + Write + Seek> LogStore<F> {
    /// Wrap an already-open seekable stream, reading and validating its
    /// header. Used both for real files and in-memory buffers in tests.
    pub fn from_stream(mut file: F) -> Result<Self, StoreError> {
        file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StoreError::MagicMismatch
            } else {
                StoreError::Io(e)
            }
        })?;
        if &magic != MAGIC {
            return Err(StoreError::MagicMismatch);
        }
        let version = file.read_u8()?;
        if version != MAJOR_VERSION {
            return Err(StoreError::VersionMismatch(version));
        }
        let stack_ptr = file.read_u64::<BigEndian>()?;
        if stack_ptr < HEADER_SIZE {
            return Err(StoreError::InvalidStackPointer(stack_ptr));
        }
        Ok(Self { file, stack_ptr })
    }

    pub fn stack_start(&self) -> u64 {
        HEADER_SIZE
    }

    /// Re-read the stack pointer from disk (the authoritative value
    /// is whatever was last published there, not what's cached here).
    pub fn read_stack_ptr(&mut self) -> Result<u64, StoreError> {
        self.file.seek(SeekFrom::Start(STACK_PTR_OFFSET))?;
        Ok(self.file.read_u64::<BigEndian>()?)
    }

    /// Publish `self.stack_ptr` to the header. This is always the last
    /// write of an append or the only write of a pop/tail-commit.
    pub fn write_stack_ptr(&mut self) -> Result<(), StoreError> {
        self.file.seek(SeekFrom::Start(STACK_PTR_OFFSET))?;
        self.file.write_u64::<BigEndian>(self.stack_ptr)?;
        Ok(())
    }

    /// Append one item record as a new frame. Does **not** publish the
    /// stack pointer — call [`write_stack_ptr`](Self::write_stack_ptr)
    /// afterward to persist it.
    pub fn push_item(&mut self, item_bytes: &[u8]) -> Result<(), StoreError> {
        let mut sp = self.stack_ptr;
        frame::push_frame(&mut self.file, &mut sp, item_bytes)?;
        self.stack_ptr = sp;
        Ok(())
    }

    /// Remove and return the last frame's bytes, updating `self.stack_ptr`
    /// in memory only. Call `write_stack_ptr` to make it permanent (used
    /// by `pop`); leave it uncommitted to implement `tail` (non-destructive).
    pub fn pop_item(&mut self) -> Result<Vec<u8>, StoreError> {
        let mut sp = self.stack_ptr;
        let bytes = frame::pop_frame(&mut self.file, &mut sp, self.stack_start())?;
        self.stack_ptr = sp;
        Ok(bytes)
    }

    /// Read a frame forward from `read_ptr` without touching `self.stack_ptr`.
    pub fn scan_at(&mut self, read_ptr: &mut u64) -> Result<Vec<u8>, StoreError> {
        Ok(frame::scan_next(&mut self.file, read_ptr)?)
    }

    /// Read `len` raw bytes at an absolute offset — used to pull a
    /// payload once a scan has located it via [`crate::item::ItemMetadata`].
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{self, ItemFeatures};
    use std::io::Cursor;

    fn fresh_store() -> LogStore<Cursor<Vec<u8>>> {
        let mut buf = Cursor::new(Vec::new());
        write_header(&mut buf).unwrap();
        LogStore::from_stream(buf).unwrap()
    }

    #[test]
    fn empty_store_has_stack_ptr_at_header_size() {
        let store = fresh_store();
        assert_eq!(store.stack_ptr, HEADER_SIZE);
    }

    #[test]
    fn push_then_pop_restores_pointer() {
        let mut store = fresh_store();
        let before = store.stack_ptr;
        let bytes = item::encode(1000, &ItemFeatures { timestamp: Some(1000), ..Default::default() }, b"hello");
        store.push_item(&bytes).unwrap();
        store.write_stack_ptr().unwrap();
        assert!(store.stack_ptr > before);

        let popped = store.pop_item().unwrap();
        assert_eq!(popped, bytes);
        assert_eq!(store.stack_ptr, before);
    }

    #[test]
    fn tail_does_not_persist() {
        let mut store = fresh_store();
        let bytes = item::encode(1, &ItemFeatures::default(), b"x");
        store.push_item(&bytes).unwrap();
        store.write_stack_ptr().unwrap();
        let committed = store.stack_ptr;

        store.pop_item().unwrap(); // tail-style: pop in memory, never write_stack_ptr

        let on_disk = store.read_stack_ptr().unwrap();
        assert_eq!(on_disk, committed, "tail must not mutate the on-disk stack pointer");
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = Cursor::new(b"xxxx\x01\x00\x00\x00\x00\x00\x00\x00\x0d".to_vec());
        assert!(matches!(LogStore::from_stream(buf), Err(StoreError::MagicMismatch)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut buf = Cursor::new(Vec::new());
        buf.write_all(MAGIC).unwrap();
        buf.write_u8(99).unwrap();
        buf.write_u64::<BigEndian>(HEADER_SIZE).unwrap();
        assert!(matches!(LogStore::from_stream(buf), Err(StoreError::VersionMismatch(99))));
    }
}
