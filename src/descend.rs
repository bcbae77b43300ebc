//! Crabbing descent: walking from the root to the leaf (or to a specific
//! internal level) that should hold a given TID, tolerating concurrent
//! splits via each page's right-link.

use log::trace;

use crate::buffer::{BufferManager, HandyRwLock};
use crate::error::{BtreeError, Result};
use crate::internal;
use crate::tid::{BlockNumber, Tid};

/// The leaf reached by a descent, plus the chain of internal pages walked
/// to get there (root first), for split propagation to insert downlinks
/// into without re-descending.
pub struct DescendResult {
    pub leaf_block: BlockNumber,
    pub parents: Vec<BlockNumber>,
}

/// Walk from `root` down to the leaf whose key range should contain
/// `target`, following right-links at every level whenever the current
/// page's `hikey` has already been overtaken by a split that hasn't
/// propagated its downlink yet.
///
/// Tracks the level it expects to see at each step, matching the
/// original's own corruption guards: a right-link must never change the
/// level (`"unexpected level encountered when descending tree"`), and
/// running out of right-links while still above the target's key is fatal
/// (`"fell off the end of btree"`) rather than silently stopping short.
pub fn descend(buffer: &dyn BufferManager, root: BlockNumber, target: Tid) -> Result<DescendResult> {
    let mut block = root;
    let mut parents = Vec::new();
    let mut expected_level: Option<u16> = None;

    loop {
        trace!("descend: visiting block {} for target {}", block, target);
        let handle = buffer.get_page(block)?;
        let page = handle.rl();
        let level = page.opaque().level;

        match expected_level {
            None => expected_level = Some(level),
            Some(expected) if expected != level => {
                return Err(BtreeError::corruption("unexpected level encountered when descending tree"))
            }
            Some(_) => {}
        }

        if target >= page.opaque().hikey {
            match page.opaque().next {
                Some(next) => {
                    drop(page);
                    block = next;
                    continue;
                }
                None => return Err(BtreeError::corruption("fell off the end of btree")),
            }
        }

        if page.opaque().is_leaf() {
            return Ok(DescendResult { leaf_block: block, parents });
        }

        let items = internal::read_items(&page);
        let idx = internal::binsrch_internal(&items, target);
        let child = items[idx].child;
        drop(page);
        parents.push(block);
        block = child;
        expected_level = Some(level - 1);
    }
}

/// Locate the internal-page item whose downlink points at `target_child`,
/// starting the search from `root` and descending to `child_level + 1`.
///
/// Used after a split to find the parent to insert the new downlink into.
/// Because a concurrent split of an *ancestor* page can have moved the
/// downlink rightward since it was first read, the search follows right
/// links at the target level until the child is actually found there
/// (mirroring the original's `zsbt_find_downlink`).
pub fn find_downlink(
    buffer: &dyn BufferManager,
    root: BlockNumber,
    child_lokey: Tid,
    target_child: BlockNumber,
    child_level: u16,
) -> Result<(BlockNumber, usize)> {
    let mut block = root;

    loop {
        let handle = buffer.get_page(block)?;
        let page = handle.rl();

        if page.opaque().level == child_level + 1 {
            let items = internal::read_items(&page);
            if let Some(idx) = items.iter().position(|it| it.child == target_child) {
                return Ok((block, idx));
            }
            match page.opaque().next {
                Some(next) => {
                    drop(page);
                    block = next;
                    continue;
                }
                None => {
                    return Err(BtreeError::corruption(format!(
                        "downlink to block {} not found on its expected parent level",
                        target_child
                    )))
                }
            }
        }

        if page.opaque().is_leaf() {
            return Err(BtreeError::corruption("descended past the target level without finding it"));
        }

        let items = internal::read_items(&page);
        let idx = internal::binsrch_internal(&items, child_lokey);
        let child = items[idx].child;
        drop(page);
        block = child;
    }
}
