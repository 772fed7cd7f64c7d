//! Error kinds shared across the log engine.
//!
//! Each module that touches the on-disk format defines its own narrow
//! `thiserror` enum (`StoreError`, `ItemError`, `FrameError`).
//! [`OatError`] is the crate-wide umbrella the CLI matches on; core code
//! returns the narrow type and lets `?`/`From` widen it.

use std::io;
use thiserror::Error;

use crate::item::ItemError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum OatError {
    #[error("database file not found — run `oat wipe` to create one")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error("unrecognized attribute name: {0}")]
    UnknownAttribute(String),
    #[error("unrecognized video container magic")]
    UnknownVideoKind,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<OatError> for io::Error {
    fn from(e: OatError) -> io::Error {
        match e {
            OatError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
