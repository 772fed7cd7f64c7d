//! Normal listing — one line per item, fields padded to a fixed column so
//! the body markers line up across a run.

use std::io::{self, Write};

use chrono::{TimeZone, Utc};

use crate::item::{ItemFeatures, ItemKind, ItemMetadata};

use super::{lossy_filename, video_kind_name};

// Worst-case widths of each optional field, computed from the type's
// range and the longest label value, not measured from real data — this
// is what keeps the pad column constant across a run regardless of which
// items happen to be short.
const ID_MAX_DIGITS: usize = 20; // u64::MAX
const DATE_WIDTH: usize = 24; // "1970-01-01T00:00:00.000Z"-shaped
const SESS_ID_MAX_DIGITS: usize = 20; // i64::MIN including sign
const KIND_MAX_WIDTH: usize = 5; // "image" / "video"
const VIDEO_KIND_MAX_WIDTH: usize = 4; // "webm"
const MOBILE_WIDTH: usize = 6; // "mobile"

const PAD_WIDTH: usize = 4 /* "id: " */ + ID_MAX_DIGITS
    + 8 /* ", date: " */ + DATE_WIDTH
    + 11 /* ", sess_id: " */ + SESS_ID_MAX_DIGITS
    + 8 /* ", kind: " */ + KIND_MAX_WIDTH
    + 15 /* ", video_kind: " */ + VIDEO_KIND_MAX_WIDTH
    + 6 /* ", on: " */ + MOBILE_WIDTH;

fn iso8601(ts_ms: i64) -> String {
    match Utc.timestamp_millis_opt(ts_ms) {
        chrono::LocalResult::Single(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        _ => "<invalid timestamp>".to_string(),
    }
}

fn build_prefix(meta: &ItemMetadata) -> String {
    let f = &meta.features;
    let mut s = format!("id: {}", meta.id);
    if let Some(ts) = f.timestamp {
        s.push_str(&format!(", date: {}", iso8601(ts)));
    }
    if let Some(sid) = f.session_id {
        s.push_str(&format!(", sess_id: {sid}"));
    }
    match f.kind() {
        ItemKind::Image => s.push_str(", kind: image"),
        ItemKind::File => s.push_str(", kind: file"),
        ItemKind::Video => {
            s.push_str(", kind: video");
            if let Some(vk) = f.video_kind {
                s.push_str(&format!(", video_kind: {}", video_kind_name(vk)));
            }
        }
        ItemKind::Text => {}
    }
    if f.is_mobile {
        s.push_str(", on: mobile");
    }
    s
}

/// Render one item as a single, newline-terminated line.
pub fn render_item<W: Write>(out: &mut W, meta: &ItemMetadata, payload: &[u8]) -> io::Result<()> {
    let prefix = build_prefix(meta);
    let padded = format!("{prefix:<PAD_WIDTH$}");
    let f: &ItemFeatures = &meta.features;

    if f.is_void {
        if let Some(ref img) = f.image_filename {
            writeln!(out, "{padded} ... {}: <trimmed image data>", lossy_filename(img))
        } else {
            writeln!(out, "{padded} ? <trimmed oats item>")
        }
    } else {
        match f.kind() {
            ItemKind::Image => writeln!(
                out,
                "{padded} # {}: <binary image data>",
                f.image_filename.as_deref().map(lossy_filename).unwrap_or_default()
            ),
            ItemKind::Video => match &f.filename {
                Some(name) => writeln!(out, "{padded} # {}: <binary video data>", lossy_filename(name)),
                None => writeln!(out, "{padded} # <binary video data>"),
            },
            ItemKind::File => writeln!(
                out,
                "{padded} # {}: <binary data>",
                f.filename.as_deref().map(lossy_filename).unwrap_or_default()
            ),
            ItemKind::Text => writeln!(out, "{padded} | {}", String::from_utf8_lossy(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item;

    fn meta_for(features: ItemFeatures) -> ItemMetadata {
        let encoded = item::encode(7, &features, b"");
        item::decode_metadata(&encoded, 0).unwrap()
    }

    #[test]
    fn text_item_line() {
        let meta = meta_for(ItemFeatures::default());
        let mut out = Vec::new();
        render_item(&mut out, &meta, b"hello").unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("id: 7"));
        assert!(line.trim_end().ends_with("| hello"));
    }

    #[test]
    fn void_item_line() {
        let meta = meta_for(ItemFeatures { is_void: true, ..Default::default() });
        let mut out = Vec::new();
        render_item(&mut out, &meta, b"").unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.trim_end().ends_with("? <trimmed oats item>"));
    }

    #[test]
    fn void_item_with_image_filename_line() {
        let meta = meta_for(ItemFeatures {
            is_void: true,
            image_filename: Some(b"pic.png".to_vec()),
            ..Default::default()
        });
        let mut out = Vec::new();
        render_item(&mut out, &meta, b"").unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.trim_end().ends_with("... pic.png: <trimmed image data>"));
    }

    #[test]
    fn columns_line_up_across_varying_fields() {
        let short = meta_for(ItemFeatures::default());
        let long = meta_for(ItemFeatures {
            timestamp: Some(1_700_000_000_000),
            session_id: Some(-42),
            is_mobile: true,
            ..Default::default()
        });
        let mut a = Vec::new();
        let mut b = Vec::new();
        render_item(&mut a, &short, b"x").unwrap();
        render_item(&mut b, &long, b"y").unwrap();
        let sep_a = String::from_utf8(a).unwrap().find('|').unwrap();
        let sep_b = String::from_utf8(b).unwrap().find('|').unwrap();
        assert_eq!(sep_a, sep_b);
    }
}
