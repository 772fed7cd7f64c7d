//! Markdown export — groups items by session (or synthetic run), emits
//! date/time headers, and coalesces consecutive void/image/video items
//! into single blocks.
//!
//! # DST heuristic (preserved, not fixed — see `DESIGN.md`)
//! Timestamps are shifted by `tz_offset` minutes; for any local month from
//! April onward an extra −60 minutes is applied. This is the same
//! northern-hemisphere approximation the source material used; it is
//! wrong south of the equator and wrong near the actual DST transition
//! dates, and is kept here for compatibility with existing exports rather
//! than because it's correct.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDateTime, TimeZone, Utc};

use crate::error::OatError;
use crate::item::{ItemFeatures, ItemKind, ItemMetadata, VideoKind};
use crate::query::scan_all_metadata;
use crate::store::LogStore;

use super::lossy_filename;

fn shifted(ts_ms: i64, tz_offset_minutes: i32) -> NaiveDateTime {
    let naive_utc = Utc.timestamp_millis_opt(ts_ms).single().unwrap_or_else(Utc::now).naive_utc();
    let prelim = naive_utc + Duration::minutes(tz_offset_minutes as i64);
    if prelim.month() >= 4 {
        naive_utc + Duration::minutes((tz_offset_minutes - 60) as i64)
    } else {
        prelim
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn date_header_text(dt: NaiveDateTime) -> String {
    format!(
        "{}, {}{} of {} {} `{}`",
        dt.format("%A"),
        dt.day(),
        ordinal_suffix(dt.day()),
        dt.format("%B"),
        dt.year(),
        dt.format("%I:%M %p"),
    )
}

fn time_header_text(dt: NaiveDateTime) -> String {
    format!("`{}`", dt.format("%I:%M %p"))
}

/// A run of consecutive same-kind items awaiting a single coalesced
/// emission. `File`/`Text` items never accumulate here — they emit
/// immediately and reset this to `None`.
enum Pending {
    Void(usize),
    Images(Vec<(ItemMetadata, Vec<u8>)>),
    Videos(Vec<(ItemMetadata, VideoKind, Vec<u8>)>),
}

struct Exporter<'a, W> {
    out: &'a mut W,
    media_root: Option<&'a Path>,
    pending: Option<Pending>,
}

impl<'a, W: Write> Exporter<'a, W> {
    fn media_dir_for(&self, f: &ItemFeatures) -> String {
        if let Some(sid) = f.session_id {
            sid.to_string()
        } else if let Some(ts) = f.timestamp {
            ts.to_string()
        } else {
            "0".to_string()
        }
    }

    fn media_path(&self, f: &ItemFeatures, filename: &str) -> io::Result<Option<PathBuf>> {
        let Some(root) = self.media_root else { return Ok(None) };
        let dir = root.join(self.media_dir_for(f));
        fs::create_dir_all(&dir)?;
        Ok(Some(dir.join(filename)))
    }

    fn flush(&mut self) -> Result<(), OatError> {
        match self.pending.take() {
            None => {}
            Some(Pending::Void(n)) => {
                let word = if n == 1 { "Item" } else { "Items" };
                writeln!(self.out, "\n*{n} Trimmed {word}*")?;
            }
            Some(Pending::Images(items)) => {
                writeln!(self.out, "\n<details><summary>{} images</summary>\n", items.len())?;
                for (meta, payload) in &items {
                    let name = meta
                        .features
                        .image_filename
                        .as_deref()
                        .map(lossy_filename)
                        .unwrap_or_else(|| format!("{}.bin", meta.id));
                    if let Some(path) = self.media_path(&meta.features, &name)? {
                        fs::write(&path, payload)?;
                        writeln!(self.out, "<img src=\"{}\">\n", path.display())?;
                    }
                }
                writeln!(self.out, "</details>")?;
            }
            Some(Pending::Videos(items)) => {
                writeln!(self.out, "\n<details><summary>{} videos</summary>\n", items.len())?;
                for (meta, kind, payload) in &items {
                    let name = meta
                        .features
                        .filename
                        .as_deref()
                        .map(lossy_filename)
                        .unwrap_or_else(|| format!("{}.{}", meta.id, kind.name()));
                    if let Some(path) = self.media_path(&meta.features, &name)? {
                        fs::write(&path, payload)?;
                        writeln!(
                            self.out,
                            "<video controls><source src=\"{}\" type=\"video/{}\"></video>\n",
                            path.display(),
                            kind.name(),
                        )?;
                    }
                }
                writeln!(self.out, "</details>")?;
            }
        }
        Ok(())
    }

    fn push_void(&mut self) {
        match &mut self.pending {
            Some(Pending::Void(n)) => *n += 1,
            _ => {
                let _ = self.flush();
                self.pending = Some(Pending::Void(1));
            }
        }
    }

    fn push_image(&mut self, meta: ItemMetadata, payload: Vec<u8>) {
        match &mut self.pending {
            Some(Pending::Images(v)) => v.push((meta, payload)),
            _ => {
                let _ = self.flush();
                self.pending = Some(Pending::Images(vec![(meta, payload)]));
            }
        }
    }

    fn push_video(&mut self, meta: ItemMetadata, kind: VideoKind, payload: Vec<u8>) {
        match &mut self.pending {
            Some(Pending::Videos(v)) => v.push((meta, kind, payload)),
            _ => {
                let _ = self.flush();
                self.pending = Some(Pending::Videos(vec![(meta, kind, payload)]));
            }
        }
    }

    fn emit_text(&mut self, payload: &[u8]) -> Result<(), OatError> {
        self.flush()?;
        writeln!(self.out, "- {}", String::from_utf8_lossy(payload))?;
        Ok(())
    }

    fn emit_file_link(&mut self, meta: &ItemMetadata, payload: &[u8]) -> Result<(), OatError> {
        self.flush()?;
        let Some(name) = meta.features.filename.as_deref().map(lossy_filename) else {
            return Ok(());
        };
        if let Some(path) = self.media_path(&meta.features, &name)? {
            fs::write(&path, payload)?;
            writeln!(self.out, "- [{}]({})", name, path.display())?;
        }
        Ok(())
    }
}

/// Synthetic-group state carried across the whole scan (groups interleave
/// in the log; only adjacency in append order matters, not the group a
/// prior synthetic-keyed item belongs to).
struct Grouper {
    last_had_session: bool,
    current_synthetic_key: Option<i64>,
}

impl Grouper {
    fn new() -> Self {
        Self { last_had_session: false, current_synthetic_key: None }
    }

    fn key_for(&mut self, meta: &ItemMetadata) -> i64 {
        match meta.features.session_id {
            Some(sid) => {
                self.last_had_session = true;
                self.current_synthetic_key = None;
                sid
            }
            None => {
                if self.last_had_session || self.current_synthetic_key.is_none() {
                    self.current_synthetic_key = Some(meta.id as i64);
                }
                self.last_had_session = false;
                self.current_synthetic_key.unwrap()
            }
        }
    }
}

/// Export the full contents of `store` as Markdown to `out`. `gap_minutes`
/// is the silence threshold (from [`crate::config::Config`]) past which a
/// fresh time header is emitted within an otherwise-unbroken day/group.
pub fn export<F, W>(
    store: &mut LogStore<F>,
    tz_offset_minutes: i32,
    gap_minutes: i64,
    media_root: Option<&Path>,
    out: &mut W,
) -> Result<(), OatError>
where
    F: io::Read + io::Write + io::Seek,
    W: Write,
{
    let metas: Vec<ItemMetadata> = scan_all_metadata(store).collect::<Result<_, _>>()?;

    let mut grouper = Grouper::new();
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, meta) in metas.iter().enumerate() {
        let key = grouper.key_for(meta);
        groups.entry(key).or_default().push(idx);
    }

    let mut out = std::io::BufWriter::new(out);

    for (_, indices) in groups.iter() {
        let mut exporter = Exporter { out: &mut out, media_root, pending: None };
        let mut prev_shifted: Option<NaiveDateTime> = None;
        let mut header_emitted_for_day = false;

        for (pos, &idx) in indices.iter().enumerate() {
            let meta = &metas[idx];
            let first_in_group = pos == 0;

            if let Some(ts) = meta.features.timestamp {
                let dt = shifted(ts, tz_offset_minutes);
                let day_changed = prev_shifted.map_or(true, |p| p.date() != dt.date());
                let gap_exceeded =
                    prev_shifted.map_or(false, |p| (dt - p).num_minutes() > gap_minutes);

                let header: Option<String> = if day_changed {
                    header_emitted_for_day = false;
                    Some(format!("## {}", date_header_text(dt)))
                } else if gap_exceeded || first_in_group {
                    let level = if header_emitted_for_day { "###" } else { "##" };
                    Some(format!("{level} {}", time_header_text(dt)))
                } else {
                    None
                };

                if let Some(mut text) = header {
                    exporter.flush()?;
                    if meta.features.is_mobile {
                        text.push_str(" *(on mobile)*");
                    }
                    writeln!(exporter.out, "\n{text}")?;
                    header_emitted_for_day = true;
                }
                prev_shifted = Some(dt);
            }

            if meta.features.is_void {
                exporter.push_void();
                continue;
            }

            match meta.features.kind() {
                ItemKind::Text => {
                    let payload = store.read_at(meta.start_offset + meta.contents_offset, meta.payload_len())?;
                    exporter.emit_text(&payload)?;
                }
                ItemKind::Image => {
                    let payload = store.read_at(meta.start_offset + meta.contents_offset, meta.payload_len())?;
                    exporter.push_image(meta.clone(), payload);
                }
                ItemKind::Video => {
                    let payload = store.read_at(meta.start_offset + meta.contents_offset, meta.payload_len())?;
                    let kind = meta.features.video_kind.unwrap_or(VideoKind::Mp4);
                    exporter.push_video(meta.clone(), kind, payload);
                }
                ItemKind::File => {
                    let payload = store.read_at(meta.start_offset + meta.contents_offset, meta.payload_len())?;
                    exporter.emit_file_link(meta, &payload)?;
                }
            }
        }
        exporter.flush()?;
    }

    out.flush()?;
    Ok(())
}
