//! Home resolution — turns environment variables into the two paths the
//! rest of the crate needs. No I/O happens here; callers are
//! responsible for creating or removing anything at the returned paths.

use std::env;
use std::path::PathBuf;

const OVERRIDE_VAR: &str = "OATS_DB";
const HOME_VAR: &str = "HOME";
const DB_FILENAME: &str = ".oats";

/// The primary store path: `$OATS_DB` if set, else `$HOME/.oats`.
pub fn store_path() -> Option<PathBuf> {
    if let Ok(p) = env::var(OVERRIDE_VAR) {
        return Some(PathBuf::from(p));
    }
    env::var(HOME_VAR).ok().map(|home| PathBuf::from(home).join(DB_FILENAME))
}

/// The temporary path used during `sort`'s rewrite: the store path with a
/// `.tmp` suffix appended, matching [`crate::maintenance::temp_path_for`].
pub fn temp_store_path() -> Option<PathBuf> {
    store_path().map(|p| crate::maintenance::temp_path_for(&p))
}
