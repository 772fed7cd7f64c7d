//! Maintenance operations — sort, import, trim, filter, count. All but
//! `count` are single-pass read-old/write-new rewrites that replace the
//! original file only via a final atomic rename: the source
//! is never mutated in place, so a crash mid-rewrite leaves either the
//! untouched original or a stranded, discoverable `<path>.tmp`.

pub mod count;
pub mod import;
pub mod sort;
pub mod trim;

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};

use crate::frame;
use crate::store::{self, StoreError};

/// Fixed suffix for the temporary file used during a rewrite, so a
/// stranded temporary left behind by a crash is discoverable relative to
/// the store path.
pub fn temp_path_for(store_path: &Path) -> PathBuf {
    let mut os = store_path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// A fresh store file under construction. Wraps a `BufWriter` around the
/// new file so many small frame pushes become few large `write_all`
/// syscalls, and tracks the stack pointer in memory until `finish`.
pub struct RewriteWriter {
    writer: BufWriter<File>,
    stack_ptr: u64,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl RewriteWriter {
    pub fn create(final_path: &Path) -> Result<Self, StoreError> {
        let tmp_path = temp_path_for(final_path);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        store::write_header(&mut writer)?;
        Ok(Self {
            writer,
            stack_ptr: store::HEADER_SIZE,
            tmp_path,
            final_path: final_path.to_owned(),
        })
    }

    /// Push one item record's raw bytes as a new frame, copying it
    /// byte-for-byte (used by sort/import/trim/filter to preserve
    /// surviving items exactly, and to write newly-minted stub records).
    pub fn push_raw(&mut self, item_bytes: &[u8]) -> Result<(), StoreError> {
        frame::push_frame(&mut self.writer, &mut self.stack_ptr, item_bytes)?;
        Ok(())
    }

    /// Publish the final stack pointer, flush, then atomically replace
    /// the original file with the rewritten one.
    pub fn finish(mut self) -> Result<(), StoreError> {
        self.writer.seek(SeekFrom::Start(5))?;
        self.writer.write_u64::<BigEndian>(self.stack_ptr)?;
        self.writer.flush()?;
        drop(self.writer);

        if self.final_path.exists() {
            fs::remove_file(&self.final_path)?;
        }
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(())
    }

    /// Discard the temporary file on error, leaving the original intact.
    pub fn abort(self) {
        let _ = fs::remove_file(&self.tmp_path);
    }
}
