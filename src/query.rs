//! Query engine — metadata-only scans, sorted/grouped views, and the one
//! sub-linear lookup (`binary_search_by_id`) that underpins import/sort.

use std::io::{Read, Seek, Write};

use crate::item::{self, ItemMetadata};
use crate::store::{LogStore, StoreError};

/// A pull-style forward scanner over a store's metadata. Owns only the
/// current item's decoded feature copies; payloads stay on disk until a
/// caller explicitly reads them via [`LogStore::read_at`].
pub struct MetadataScanner<'a, F> {
    store: &'a mut LogStore<F>,
    read_ptr: u64,
    stack_ptr: u64,
}

impl<'a, F: Read + Write + Seek> MetadataScanner<'a, F> {
    fn new(store: &'a mut LogStore<F>) -> Self {
        let stack_ptr = store.stack_ptr;
        let read_ptr = store.stack_start();
        Self { store, read_ptr, stack_ptr }
    }
}

impl<'a, F: Read + Write + Seek> Iterator for MetadataScanner<'a, F> {
    type Item = Result<ItemMetadata, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.read_ptr >= self.stack_ptr {
            return None;
        }
        let start_offset = self.read_ptr + 4; // past this frame's leading length
        let bytes = match self.store.scan_at(&mut self.read_ptr) {
            Ok(b) => b,
            Err(e) => return Some(Err(e.into())),
        };
        match item::decode_metadata(&bytes, start_offset) {
            Ok(meta) => Some(Ok(meta)),
            Err(e) => Some(Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            )))),
        }
    }
}

/// Scan every item's metadata from the stack start to the stack pointer,
/// in append order.
pub fn scan_all_metadata<F: Read + Write + Seek>(store: &mut LogStore<F>) -> MetadataScanner<F> {
    MetadataScanner::new(store)
}

/// Collect the metadata (and source item bytes) for the last `n` items
/// without persisting the popped stack pointer — the store is left
/// exactly as it was found. Returns items in append order (oldest of the
/// tail first), mirroring `scan_all_metadata`'s ordering.
pub fn tail<F: Read + Write + Seek>(
    store: &mut LogStore<F>,
    n: usize,
) -> Result<Vec<(ItemMetadata, Vec<u8>)>, StoreError> {
    let original_stack_ptr = store.stack_ptr;
    let mut items = Vec::with_capacity(n);

    for _ in 0..n {
        let bytes = match store.pop_item() {
            Ok(b) => b,
            Err(StoreError::Frame(crate::frame::FrameError::EmptyStack)) => {
                if items.is_empty() {
                    store.stack_ptr = original_stack_ptr;
                    return Err(StoreError::Frame(crate::frame::FrameError::EmptyStack));
                }
                break;
            }
            Err(e) => {
                store.stack_ptr = original_stack_ptr;
                return Err(e);
            }
        };
        let start_offset = store.stack_ptr + 4;
        let meta = item::decode_metadata(&bytes, start_offset).map_err(|e| {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
        })?;
        items.push((meta, bytes));
    }

    store.stack_ptr = original_stack_ptr; // tail never persists — and never even leaves the in-memory pointer moved
    items.reverse();
    Ok(items)
}

/// Binary search a slice sorted ascending by `id`. Returns `(true, idx)`
/// on an exact match (idx is the matching element) or `(false, idx)` for
/// the insertion index that keeps the slice sorted.
pub fn binary_search_by_id(sorted: &[ItemMetadata], target_id: u64) -> (bool, usize) {
    match sorted.binary_search_by_key(&target_id, |m| m.id) {
        Ok(idx) => (true, idx),
        Err(idx) => (false, idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemFeatures;
    use crate::store::{self as store_mod};
    use std::io::Cursor;

    fn store_with(ids: &[u64]) -> LogStore<Cursor<Vec<u8>>> {
        let mut buf = Cursor::new(Vec::new());
        store_mod::write_header(&mut buf).unwrap();
        let mut store = LogStore::from_stream(buf).unwrap();
        for &id in ids {
            let bytes = item::encode(id, &ItemFeatures::default(), b"x");
            store.push_item(&bytes).unwrap();
        }
        store.write_stack_ptr().unwrap();
        store
    }

    #[test]
    fn scan_all_metadata_yields_append_order() {
        let mut store = store_with(&[3, 1, 2]);
        let ids: Vec<u64> = scan_all_metadata(&mut store).map(|m| m.unwrap().id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn tail_leaves_store_unchanged() {
        let mut store = store_with(&[1, 2, 3]);
        let before = store.stack_ptr;
        let got = tail(&mut store, 2).unwrap();
        assert_eq!(got.iter().map(|(m, _)| m.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(store.stack_ptr, before);
    }

    #[test]
    fn tail_more_than_available_returns_all() {
        let mut store = store_with(&[1, 2]);
        let got = tail(&mut store, 10).unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn tail_on_empty_store_is_an_error() {
        let mut store = store_with(&[]);
        let before = store.stack_ptr;
        let err = tail(&mut store, 5).unwrap_err();
        assert!(matches!(err, StoreError::Frame(crate::frame::FrameError::EmptyStack)));
        assert_eq!(store.stack_ptr, before, "a failed tail must not move the stack pointer");
    }

    #[test]
    fn binary_search_finds_and_inserts() {
        let meta = |id: u64| crate::item::decode_metadata(
            &item::encode(id, &ItemFeatures::default(), b""), 0,
        ).unwrap();
        let sorted = vec![meta(1), meta(3), meta(5)];
        assert_eq!(binary_search_by_id(&sorted, 3), (true, 1));
        assert_eq!(binary_search_by_id(&sorted, 4), (false, 2));
        assert_eq!(binary_search_by_id(&sorted, 0), (false, 0));
        assert_eq!(binary_search_by_id(&sorted, 99), (false, 3));
    }
}
