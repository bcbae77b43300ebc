//! The metapage collaborator: persisting and swapping the tree's root
//! block number. A real implementation stores this in a small
//! well-known page maintained by the buffer manager; here it is reduced
//! to the trait the rest of the tree needs, plus an in-memory
//! implementation for tests.

use std::sync::RwLock;

use crate::error::{BtreeError, Result};
use crate::tid::BlockNumber;

/// Reads and updates the persistent pointer to the tree's current root
/// block.
pub trait MetaPageService: Send + Sync {
    /// The current root, or `None` for a tree that has not been planted
    /// yet (the first insert creates the initial leaf and calls
    /// `set_root`).
    fn get_root(&self) -> Result<Option<BlockNumber>>;

    /// Install `root` as the tree's new root, e.g. after `newroot`
    /// replaces a split root with a fresh internal page.
    fn set_root(&self, root: BlockNumber) -> Result<()>;
}

/// An in-process `MetaPageService`.
#[derive(Default)]
pub struct InMemoryMetaPageService {
    root: RwLock<Option<BlockNumber>>,
}

impl InMemoryMetaPageService {
    pub fn new() -> Self {
        InMemoryMetaPageService { root: RwLock::new(None) }
    }
}

impl MetaPageService for InMemoryMetaPageService {
    fn get_root(&self) -> Result<Option<BlockNumber>> {
        Ok(*self.root.read().map_err(|_| BtreeError::backend("metapage latch poisoned"))?)
    }

    fn set_root(&self, root: BlockNumber) -> Result<()> {
        *self.root.write().map_err(|_| BtreeError::backend("metapage latch poisoned"))? = Some(root);
        Ok(())
    }
}
