//! Item codec — one stored record: id, feature bitfield, optional feature
//! fields, payload.
//!
//! # On-disk layout (all integers big-endian)
//!
//! ```text
//! 8        id (u64)
//! 1        feature_bitfield
//! [8]      timestamp (i64)        bit 1
//! [8]      session_id (i64)       bit 2
//! [2+N]    image_filename         bit 3   (u16 length, then bytes)
//! [2+N]    filename               bit 6   (u16 length, then bytes)
//! [1]      video_kind             bit 7   (1=mp4 2=ogg 3=webm)
//! ...      payload
//! ```
//!
//! Bit positions are part of the format contract; a future feature must
//! take the next unused bit so that old readers can keep ignoring bits
//! they don't know about (forward compatibility). A reader that sees
//! an unset bit consumes zero bytes for that field — there is no
//! "optional but present" state.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};
use thiserror::Error;

pub const BIT_EXTENDED:    u8 = 1 << 0;
pub const BIT_TIMESTAMP:   u8 = 1 << 1;
pub const BIT_SESSION_ID:  u8 = 1 << 2;
pub const BIT_IMAGE:       u8 = 1 << 3;
pub const BIT_MOBILE:      u8 = 1 << 4;
pub const BIT_VOID:        u8 = 1 << 5;
pub const BIT_FILE:        u8 = 1 << 6;
pub const BIT_VIDEO_KIND:  u8 = 1 << 7;

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("item record truncated: {0}")]
    Truncated(String),
    #[error("unrecognized video_kind byte {0}")]
    UnknownVideoKind(u8),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Recognized video container kinds. The byte value is the on-disk
/// encoding of the `video_kind` field (present iff bit 7 is set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    Mp4 = 1,
    Ogg = 2,
    Webm = 3,
}

impl VideoKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(VideoKind::Mp4),
            2 => Some(VideoKind::Ogg),
            3 => Some(VideoKind::Webm),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            VideoKind::Mp4 => "mp4",
            VideoKind::Ogg => "ogg",
            VideoKind::Webm => "webm",
        }
    }

    /// Sniff a video container from its leading bytes. Used by the `vid`
    /// push path, which must fail with `UnknownVideoKind` rather than
    /// guess when the magic doesn't match a recognized container.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            return Some(VideoKind::Mp4);
        }
        if data.len() >= 4 && &data[0..4] == b"OggS" {
            return Some(VideoKind::Ogg);
        }
        if data.len() >= 4 && &data[0..4] == [0x1a, 0x45, 0xdf, 0xa3] {
            return Some(VideoKind::Webm);
        }
        None
    }
}

/// The kind of content an item carries, derived from its feature bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Image,
    File,
    Video,
}

/// The decoded feature set of one item. Byte-string fields are owned
/// copies (the decoder never borrows from the source buffer past its
/// own lifetime, since metadata routinely outlives the buffer it was
/// parsed from).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFeatures {
    pub timestamp: Option<i64>,
    pub session_id: Option<i64>,
    pub image_filename: Option<Vec<u8>>,
    pub filename: Option<Vec<u8>>,
    pub is_mobile: bool,
    pub is_void: bool,
    pub video_kind: Option<VideoKind>,
}

impl ItemFeatures {
    pub fn bitfield(&self) -> u8 {
        let mut b = 0u8;
        if self.timestamp.is_some() { b |= BIT_TIMESTAMP; }
        if self.session_id.is_some() { b |= BIT_SESSION_ID; }
        if self.image_filename.is_some() { b |= BIT_IMAGE; }
        if self.filename.is_some() { b |= BIT_FILE; }
        if self.is_mobile { b |= BIT_MOBILE; }
        if self.is_void { b |= BIT_VOID; }
        if self.video_kind.is_some() { b |= BIT_VIDEO_KIND; }
        b
    }

    /// The rendered/exported kind of this item. Video takes precedence
    /// over a bare `filename` (a video item may carry both `filename`
    /// and `video_kind`).
    pub fn kind(&self) -> ItemKind {
        if self.video_kind.is_some() {
            ItemKind::Video
        } else if self.image_filename.is_some() {
            ItemKind::Image
        } else if self.filename.is_some() {
            ItemKind::File
        } else {
            ItemKind::Text
        }
    }

    /// Test a feature by its CLI-facing name, for `trim`/`filter`/`count`
    /// predicates. Unknown names are the caller's responsibility to
    /// reject with `UnknownAttribute` before calling this.
    pub fn has_named(&self, name: &str) -> Option<bool> {
        Some(match name {
            "timestamp" => self.timestamp.is_some(),
            "session_id" => self.session_id.is_some(),
            "is_image" => self.image_filename.is_some(),
            "is_mobile" => self.is_mobile,
            "is_void" => self.is_void,
            "is_file" => self.filename.is_some(),
            "has_video_kind" => self.video_kind.is_some(),
            _ => return None,
        })
    }

    /// All recognized attribute names, in bit order, for error messages
    /// and `count`/`trim`/`filter` help text.
    pub const NAMES: &'static [&'static str] = &[
        "timestamp", "session_id", "is_image", "is_mobile", "is_void",
        "is_file", "has_video_kind",
    ];
}

/// An in-memory summary of one item, produced by scans. Payload bytes
/// are never loaded here — callers read `size - contents_offset` bytes
/// from `start_offset + contents_offset` only when they actually need
/// the payload, keeping scans memory-light for blob-heavy stores.
#[derive(Debug, Clone)]
pub struct ItemMetadata {
    pub id: u64,
    pub features: ItemFeatures,
    /// File position of the item record, i.e. just after the frame's
    /// leading length field.
    pub start_offset: u64,
    /// Bytes from `start_offset` to the start of the payload.
    pub contents_offset: u64,
    /// Total item-record length (header fields + payload).
    pub size: u64,
}

impl ItemMetadata {
    pub fn payload_len(&self) -> u64 {
        self.size - self.contents_offset
    }
}

/// Encode one item record: id, bitfield, present feature fields in fixed
/// order, then the payload.
pub fn encode(id: u64, features: &ItemFeatures, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + payload.len());
    out.write_u64::<BigEndian>(id).unwrap();
    out.write_u8(features.bitfield()).unwrap();

    if let Some(ts) = features.timestamp {
        out.write_i64::<BigEndian>(ts).unwrap();
    }
    if let Some(sid) = features.session_id {
        out.write_i64::<BigEndian>(sid).unwrap();
    }
    if let Some(ref name) = features.image_filename {
        out.write_u16::<BigEndian>(name.len() as u16).unwrap();
        out.extend_from_slice(name);
    }
    if let Some(ref name) = features.filename {
        out.write_u16::<BigEndian>(name.len() as u16).unwrap();
        out.extend_from_slice(name);
    }
    if let Some(vk) = features.video_kind {
        out.write_u8(vk.as_u8()).unwrap();
    }

    out.extend_from_slice(payload);
    out
}

/// Decode the header of an item record into [`ItemMetadata`]. `bytes`
/// must contain the *entire* item record (header fields plus payload);
/// the payload itself is never inspected, only its length is implied by
/// `bytes.len() - contents_offset`.
///
/// Fails with `ItemError::Truncated` if any declared field would read
/// past `bytes`, and with `ItemError::UnknownVideoKind` if bit 7 is set
/// but the byte doesn't name a recognized container.
pub fn decode_metadata(bytes: &[u8], start_offset: u64) -> Result<ItemMetadata, ItemError> {
    let mut cur = Cursor::new(bytes);

    let id = read_exact_u64(&mut cur)?;
    let bitfield = read_exact_u8(&mut cur)?;

    let mut features = ItemFeatures::default();

    if bitfield & BIT_TIMESTAMP != 0 {
        features.timestamp = Some(read_exact_i64(&mut cur)?);
    }
    if bitfield & BIT_SESSION_ID != 0 {
        features.session_id = Some(read_exact_i64(&mut cur)?);
    }
    if bitfield & BIT_IMAGE != 0 {
        features.image_filename = Some(read_len_prefixed(&mut cur)?);
    }
    if bitfield & BIT_FILE != 0 {
        features.filename = Some(read_len_prefixed(&mut cur)?);
    }
    features.is_mobile = bitfield & BIT_MOBILE != 0;
    features.is_void = bitfield & BIT_VOID != 0;
    if bitfield & BIT_VIDEO_KIND != 0 {
        let raw = read_exact_u8(&mut cur)?;
        features.video_kind = Some(
            VideoKind::from_u8(raw).ok_or(ItemError::UnknownVideoKind(raw))?,
        );
    }

    let contents_offset = cur.position();

    Ok(ItemMetadata {
        id,
        features,
        start_offset,
        contents_offset,
        size: bytes.len() as u64,
    })
}

fn read_exact_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, ItemError> {
    cur.read_u8().map_err(|_| ItemError::Truncated("expected 1 byte".into()))
}

fn read_exact_u64(cur: &mut Cursor<&[u8]>) -> Result<u64, ItemError> {
    cur.read_u64::<BigEndian>().map_err(|_| ItemError::Truncated("expected id (8 bytes)".into()))
}

fn read_exact_i64(cur: &mut Cursor<&[u8]>) -> Result<i64, ItemError> {
    cur.read_i64::<BigEndian>().map_err(|_| ItemError::Truncated("expected 8-byte field".into()))
}

fn read_len_prefixed(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>, ItemError> {
    let len = cur
        .read_u16::<BigEndian>()
        .map_err(|_| ItemError::Truncated("expected u16 length prefix".into()))? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)
        .map_err(|_| ItemError::Truncated(format!("expected {len} filename bytes")))?;
    Ok(buf)
}
