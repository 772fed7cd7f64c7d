//! Trim and filter — produce a rewritten store where matched items (trim)
//! or non-matched items (filter) are replaced with void stubs.
//!
//! `trim(p, X)`'s stub set and `filter(p, X)`'s live set are the same id
//! set for the same predicate `p` — trim and filter are complements
//! of the same per-item decision, just swapped in which side gets
//! stubbed.

use std::path::Path;

use crate::error::OatError;
use crate::item::{ItemFeatures, ItemMetadata};
use crate::query::scan_all_metadata;
use crate::store::LogStore;

use super::RewriteWriter;

const EVERYTHING_TOKEN: &str = "everything";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Trim,
    Filter,
}

/// Parse a comma-enumerable attribute list (already split by the CLI)
/// and validate every name is recognized. `everything` is only valid for
/// `Mode::Trim` and only as the sole entry.
pub fn validate_attrs(attrs: &[String], mode: Mode) -> Result<(), OatError> {
    if attrs.iter().any(|a| a == EVERYTHING_TOKEN) {
        if mode == Mode::Trim && attrs.len() == 1 {
            return Ok(());
        }
        return Err(OatError::UnknownAttribute(EVERYTHING_TOKEN.to_string()));
    }
    for a in attrs {
        if ItemFeatures::NAMES.iter().all(|n| n != a) {
            return Err(OatError::UnknownAttribute(a.clone()));
        }
    }
    Ok(())
}

/// Conjunctive match: true iff every listed attribute bit is set.
fn matches(features: &ItemFeatures, attrs: &[String]) -> bool {
    attrs.iter().all(|a| features.has_named(a).unwrap_or(false))
}

fn is_match(features: &ItemFeatures, attrs: &[String]) -> bool {
    if attrs.len() == 1 && attrs[0] == EVERYTHING_TOKEN {
        return true;
    }
    matches(features, attrs)
}

/// The stub record for a trimmed/filtered-out item: id and the
/// non-content features survive (timestamp, session_id, is_mobile);
/// `image_filename`, `filename`, and `video_kind` are stripped along with
/// the payload, since they identify content that no longer exists.
fn stub_bytes(meta: &ItemMetadata) -> Vec<u8> {
    let f = &meta.features;
    let stub = ItemFeatures {
        timestamp: f.timestamp,
        session_id: f.session_id,
        image_filename: None,
        filename: None,
        is_mobile: f.is_mobile,
        is_void: true,
        video_kind: None,
    };
    crate::item::encode(meta.id, &stub, b"")
}

/// Run trim or filter: rewrite `in_path` into `out_path` according to
/// `attrs`/`mode`.
pub fn run(in_path: &Path, attrs: &[String], mode: Mode, out_path: &Path) -> Result<(), OatError> {
    validate_attrs(attrs, mode)?;

    let mut source = LogStore::open(in_path)?;
    let metas: Vec<ItemMetadata> = scan_all_metadata(&mut source).collect::<Result<Vec<_>, _>>()?;

    let mut writer = RewriteWriter::create(out_path)?;

    let result: Result<(), OatError> = (|| {
        for meta in &metas {
            let matched = is_match(&meta.features, attrs);
            let stub_this = match mode {
                Mode::Trim => matched,
                Mode::Filter => !matched,
            };
            if stub_this {
                writer.push_raw(&stub_bytes(meta))?;
            } else {
                let raw = source.read_at(meta.start_offset, meta.size)?;
                writer.push_raw(&raw)?;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            writer.finish()?;
            Ok(())
        }
        Err(e) => {
            writer.abort();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{self};
    use crate::store;
    use std::fs::File;
    use tempfile::tempdir;

    fn push_text(s: &mut LogStore<File>, id: u64) {
        let bytes = item::encode(id, &ItemFeatures::default(), b"note");
        s.push_item(&bytes).unwrap();
        s.write_stack_ptr().unwrap();
    }

    fn push_file(s: &mut LogStore<File>, id: u64) {
        let features = ItemFeatures { filename: Some(b"a.bin".to_vec()), ..Default::default() };
        let bytes = item::encode(id, &features, b"data");
        s.push_item(&bytes).unwrap();
        s.write_stack_ptr().unwrap();
    }

    #[test]
    fn trim_and_filter_are_complementary() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.oats");
        store::initialize(&src).unwrap();
        {
            let mut s = LogStore::open(&src).unwrap();
            push_text(&mut s, 1);
            push_file(&mut s, 2);
        }

        let trimmed = dir.path().join("trimmed.oats");
        let filtered = dir.path().join("filtered.oats");
        run(&src, &["is_file".to_string()], Mode::Trim, &trimmed).unwrap();
        run(&src, &["is_file".to_string()], Mode::Filter, &filtered).unwrap();

        let mut t = LogStore::open(&trimmed).unwrap();
        let t_metas: Vec<_> = scan_all_metadata(&mut t).map(|m| m.unwrap()).collect();
        let t_live: Vec<u64> = t_metas.iter().filter(|m| !m.features.is_void).map(|m| m.id).collect();
        let t_void: Vec<u64> = t_metas.iter().filter(|m| m.features.is_void).map(|m| m.id).collect();
        assert_eq!(t_live, vec![1]);
        assert_eq!(t_void, vec![2]);

        let mut fi = LogStore::open(&filtered).unwrap();
        let f_metas: Vec<_> = scan_all_metadata(&mut fi).map(|m| m.unwrap()).collect();
        let f_live: Vec<u64> = f_metas.iter().filter(|m| !m.features.is_void).map(|m| m.id).collect();
        assert_eq!(f_live, vec![2], "filter keeps live only the matching item");
    }

    #[test]
    fn trim_everything_stubs_all() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.oats");
        store::initialize(&src).unwrap();
        {
            let mut s = LogStore::open(&src).unwrap();
            push_text(&mut s, 1);
            push_file(&mut s, 2);
        }
        let out = dir.path().join("out.oats");
        run(&src, &["everything".to_string()], Mode::Trim, &out).unwrap();
        let mut o = LogStore::open(&out).unwrap();
        assert!(scan_all_metadata(&mut o).all(|m| m.unwrap().features.is_void));
    }

    #[test]
    fn unknown_attribute_errors() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.oats");
        store::initialize(&src).unwrap();
        let out = dir.path().join("out.oats");
        let err = run(&src, &["bogus".to_string()], Mode::Trim, &out).unwrap_err();
        assert!(matches!(err, OatError::UnknownAttribute(_)));
    }
}
