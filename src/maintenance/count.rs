//! Count — a full forward scan that counts items matching (or, with
//! `--not`, not matching) a conjunctive attribute predicate.

use std::path::Path;

use crate::error::OatError;
use crate::item::ItemFeatures;
use crate::query::scan_all_metadata;
use crate::store::LogStore;

/// Validate every name against [`ItemFeatures::NAMES`], failing with
/// `UnknownAttribute` on the first one not recognized. `count` has no
/// `everything` token — an empty list is a usage error the CLI is
/// expected to reject before calling here.
pub fn validate_attrs(attrs: &[String]) -> Result<(), OatError> {
    for a in attrs {
        if ItemFeatures::NAMES.iter().all(|n| n != a) {
            return Err(OatError::UnknownAttribute(a.clone()));
        }
    }
    Ok(())
}

fn matches(features: &ItemFeatures, attrs: &[String]) -> bool {
    attrs.iter().all(|a| features.has_named(a).unwrap_or(false))
}

/// Count items in `path` satisfying `attrs` (conjunctive); if `invert` is
/// set, count items for which the predicate is false instead.
pub fn run(path: &Path, attrs: &[String], invert: bool) -> Result<usize, OatError> {
    validate_attrs(attrs)?;

    let mut store = LogStore::open(path)?;
    let mut total = 0usize;
    for meta in scan_all_metadata(&mut store) {
        let meta = meta?;
        let m = matches(&meta.features, attrs);
        if m != invert {
            total += 1;
        }
    }
    Ok(total)
}
