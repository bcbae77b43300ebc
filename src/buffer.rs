//! The buffer manager collaborator: pinning, latching and allocating pages
//! is explicitly out of scope for this crate, so this module only fixes
//! the *contract* the rest of the tree is written against, plus an
//! in-memory implementation for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BtreeError, Result};
use crate::page::{Page, PageOpaque};
use crate::tid::{BlockNumber, INVALID_BLOCK};

/// A page, behind the exclusive-latch-only concurrency model this crate
/// assumes: every reader and writer takes the same lock, there is no
/// separate shared-read mode.
pub type PageHandle = Arc<RwLock<Page>>;

/// Shorthand for the read/write-lock pattern used throughout, matching the
/// convention the rest of this crate's callers expect.
pub trait HandyRwLock<T> {
    fn rl(&self) -> RwLockReadGuard<'_, T>;
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().expect("page latch poisoned")
    }

    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().expect("page latch poisoned")
    }
}

/// Pins, fetches and allocates pages by block number. A real implementation
/// backs this with a shared buffer pool and physical storage; it is
/// reduced here to the minimal contract the tree's descent/insert/split
/// code actually exercises.
pub trait BufferManager: Send + Sync {
    /// Fetch and latch an existing page.
    fn get_page(&self, block: BlockNumber) -> Result<PageHandle>;

    /// Allocate a fresh block initialized with `opaque`, returning its
    /// number and a latched handle.
    fn new_page(&self, opaque: PageOpaque) -> Result<(BlockNumber, PageHandle)>;
}

/// A `BufferManager` backed by an in-process `HashMap`, standing in for the
/// real buffer pool in tests. Durability is explicitly not this crate's
/// concern, so a bare in-memory store is sufficient here.
#[derive(Default)]
pub struct InMemoryBufferManager {
    pages: RwLock<HashMap<BlockNumber, PageHandle>>,
    next_block: RwLock<BlockNumber>,
}

impl InMemoryBufferManager {
    pub fn new() -> Self {
        InMemoryBufferManager { pages: RwLock::new(HashMap::new()), next_block: RwLock::new(0) }
    }
}

impl BufferManager for InMemoryBufferManager {
    fn get_page(&self, block: BlockNumber) -> Result<PageHandle> {
        self.pages
            .rl()
            .get(&block)
            .cloned()
            .ok_or_else(|| BtreeError::corruption(format!("no such block: {}", block)))
    }

    fn new_page(&self, opaque: PageOpaque) -> Result<(BlockNumber, PageHandle)> {
        let mut next = self.next_block.wl();
        let block = *next;
        assert_ne!(block, INVALID_BLOCK, "block allocator exhausted the block number space");
        *next += 1;
        drop(next);

        let handle: PageHandle = Arc::new(RwLock::new(Page::new(opaque)));
        self.pages.wl().insert(block, handle.clone());
        Ok((block, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tid::Tid;

    #[test]
    fn new_page_then_get_page_returns_the_same_page() {
        let mgr = InMemoryBufferManager::new();
        let (block, handle) = mgr.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        handle.wl().add_item(&[1, 2, 3]);
        let fetched = mgr.get_page(block).unwrap();
        assert_eq!(fetched.rl().max_offset(), 1);
    }

    #[test]
    fn get_page_on_unknown_block_is_corruption() {
        let mgr = InMemoryBufferManager::new();
        assert!(mgr.get_page(999).is_err());
    }

    #[test]
    fn new_page_allocates_increasing_block_numbers() {
        let mgr = InMemoryBufferManager::new();
        let (a, _) = mgr.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        let (b, _) = mgr.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        assert!(b > a);
    }
}
