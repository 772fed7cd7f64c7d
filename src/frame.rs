//! Frame codec — length-padded entries on a seekable byte stream.
//!
//! # On-disk layout
//!
//! ```text
//! 4   length L (u32 BE)
//! L   item record bytes
//! 4   length L (u32 BE, repeated)
//! ```
//!
//! The trailing length lets a reader walk the stack backward (`pop_frame`)
//! without any index: seek to `stack_ptr - 4`, read the length, and the
//! whole entry is now addressable in both directions. `push_frame` is a
//! single seek plus one contiguous write plus the two length fields; cost
//! is independent of how far into the file the stack pointer has grown.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;

/// Size in bytes of one length field (there are two per frame).
pub const LEN_FIELD_SIZE: u64 = 4;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("stack is empty")]
    EmptyStack,
    #[error("corrupt frame: {0}")]
    Corruption(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Append `bytes` as a new frame at `*stack_ptr`, advancing it past the
/// frame. Fails with `FrameError::Io` on any short write.
pub fn push_frame<W: Write + Seek>(
    w: &mut W,
    stack_ptr: &mut u64,
    bytes: &[u8],
) -> Result<(), FrameError> {
    let len = bytes.len() as u32;
    w.seek(SeekFrom::Start(*stack_ptr))?;
    w.write_u32::<BigEndian>(len)?;
    w.write_all(bytes)?;
    w.write_u32::<BigEndian>(len)?;
    *stack_ptr += LEN_FIELD_SIZE + bytes.len() as u64 + LEN_FIELD_SIZE;
    Ok(())
}

/// Remove and return the last frame's bytes, moving `*stack_ptr` backward
/// past it. `stack_start` is the offset at which the stack body begins —
/// popping at that offset is `EmptyStack`, not corruption.
pub fn pop_frame<R: Read + Seek>(
    r: &mut R,
    stack_ptr: &mut u64,
    stack_start: u64,
) -> Result<Vec<u8>, FrameError> {
    if *stack_ptr <= stack_start {
        return Err(FrameError::EmptyStack);
    }
    if *stack_ptr < stack_start + LEN_FIELD_SIZE * 2 {
        return Err(FrameError::Corruption(
            "stack pointer too close to stack start for a trailing length field".into(),
        ));
    }

    r.seek(SeekFrom::Start(*stack_ptr - LEN_FIELD_SIZE))?;
    let trailing_len = r.read_u32::<BigEndian>()? as u64;

    let frame_start = (*stack_ptr)
        .checked_sub(LEN_FIELD_SIZE * 2 + trailing_len)
        .ok_or_else(|| FrameError::Corruption("trailing length implies negative offset".into()))?;
    if frame_start < stack_start {
        return Err(FrameError::Corruption(
            "frame would start before the stack body".into(),
        ));
    }

    r.seek(SeekFrom::Start(frame_start + LEN_FIELD_SIZE))?;
    let mut buf = vec![0u8; trailing_len as usize];
    r.read_exact(&mut buf)?;

    *stack_ptr = frame_start;
    Ok(buf)
}

/// Read the frame starting at `*read_ptr`, advancing it past the frame.
/// Caller must ensure `*read_ptr < stack_ptr` before calling — this
/// function does not know the stack pointer.
pub fn scan_next<R: Read + Seek>(r: &mut R, read_ptr: &mut u64) -> Result<Vec<u8>, FrameError> {
    r.seek(SeekFrom::Start(*read_ptr))?;
    let len = r.read_u32::<BigEndian>()? as u64;
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    // Skip the trailing length field without reading it; scan_next trusts
    // the leading length (well-formed frames guarantee they match).
    r.seek(SeekFrom::Current(LEN_FIELD_SIZE as i64))?;
    *read_ptr += LEN_FIELD_SIZE + len + LEN_FIELD_SIZE;
    Ok(buf)
}
