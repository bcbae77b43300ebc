//! Crate-wide error type.
//!
//! A small hand-rolled `std::error::Error` impl rather than pulling in
//! `thiserror`/`anyhow`, since the rest of the dependency stack doesn't use
//! them either.

use std::error::Error;
use std::fmt;

/// Failure modes this crate can surface.
#[derive(Debug)]
pub enum BtreeError {
    /// The tree is structurally inconsistent: a level mismatch during
    /// descent, a missing downlink, a self-referential right-link, or a
    /// `binsrch_internal` miss on an interior page. Fatal; callers should
    /// not attempt to repair the tree from this error alone.
    Corruption(String),

    /// An item is too large to fit even on a freshly emptied page.
    Overflow { item_size: usize, page_capacity: usize },

    /// A failure surfaced by one of the external collaborator traits
    /// (buffer manager, metapage service, codec, MVCC oracle).
    Backend(String),
}

impl fmt::Display for BtreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BtreeError::Corruption(msg) => write!(f, "btree corruption: {}", msg),
            BtreeError::Overflow { item_size, page_capacity } => write!(
                f,
                "item of size {} does not fit on an empty page (capacity {})",
                item_size, page_capacity
            ),
            BtreeError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl Error for BtreeError {}

impl BtreeError {
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        BtreeError::Corruption(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        BtreeError::Backend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BtreeError>;
