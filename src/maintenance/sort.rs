//! Sort — rewrite a store with non-void items ascending by id, re-inserting
//! any void stub whose id has no live counterpart.
//!
//! `sort ∘ sort = sort`: a second run finds the store already
//! strictly ascending with no duplicate ids, so every binary search either
//! confirms the existing position or is a no-op.

use std::path::Path;

use crate::error::OatError;
use crate::item::ItemMetadata;
use crate::query::{binary_search_by_id, scan_all_metadata};
use crate::store::LogStore;

use super::RewriteWriter;

/// Sort the store at `path` in place (via a temp-file rewrite + rename).
pub fn run(path: &Path) -> Result<(), OatError> {
    let mut source = LogStore::open(path)?;

    let mut non_void: Vec<ItemMetadata> = Vec::new();
    let mut voids: Vec<ItemMetadata> = Vec::new();
    for meta in scan_all_metadata(&mut source) {
        let meta = meta?;
        if meta.features.is_void {
            voids.push(meta);
        } else {
            non_void.push(meta);
        }
    }
    non_void.sort_unstable_by_key(|m| m.id);

    let mut merged = non_void;
    for void_meta in voids {
        let (found, idx) = binary_search_by_id(&merged, void_meta.id);
        if !found {
            merged.insert(idx, void_meta);
        }
    }

    let writer = RewriteWriter::create(path);
    let mut writer = match writer {
        Ok(w) => w,
        Err(e) => return Err(e.into()),
    };

    let result: Result<(), OatError> = (|| {
        for meta in &merged {
            let raw = source.read_at(meta.start_offset, meta.size)?;
            writer.push_raw(&raw)?;
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
