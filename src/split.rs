//! Page splitting and downlink propagation.
//!
//! Because every insert targets the rightmost leaf, a split only ever has
//! to divide a page whose new item sorts after everything already on it
//! — there is no general split-at-arbitrary-key case to support.

use log::debug;

use crate::buffer::{BufferManager, HandyRwLock};
use crate::error::{BtreeError, Result};
use crate::internal::{self, InternalItem};
use crate::item::LeafItem;
use crate::meta::MetaPageService;
use crate::page::{Page, PageOpaque};
use crate::tid::{BlockNumber, Tid};

/// Fraction (numerator/100) of items an internal split leaves on the left
/// page. Skewed toward the left because downlinks only ever arrive at the
/// right edge, so a 50/50 split would immediately start refilling the
/// right half while the left half sits untouched.
const INTERNAL_SPLIT_LEFT_PCT: usize = 90;

pub struct SplitOutcome {
    pub right_block: BlockNumber,
    pub split_key: Tid,
}

/// Try to add `new_item` to `leaf_block`. If it fits, returns `Ok(None)`.
/// Otherwise splits the page in place (reusing `leaf_block` as the left
/// half) and allocates a new right page, returning the new page's block
/// and the key that separates the two halves.
///
/// Rightmost-only precondition: the split point is the fixed
/// `(lokey.block + 1, 1)` key, not a size-balanced midpoint, which is
/// correct only because every existing item already on the page sorts
/// before `new_item` — the inserter never targets anything but the
/// rightmost leaf. All of the page's existing items stay on the left;
/// `new_item` becomes the right page's sole occupant.
pub fn split_leaf(
    buffer: &dyn BufferManager,
    leaf_block: BlockNumber,
    new_item: LeafItem,
) -> Result<Option<SplitOutcome>> {
    let handle = buffer.get_page(leaf_block)?;

    {
        let mut page = handle.wl();
        if page.add_item(&new_item.encode()).is_some() {
            return Ok(None);
        }
    }

    if Page::oversize(new_item.encoded_len()) {
        return Err(BtreeError::Overflow { item_size: new_item.encoded_len(), page_capacity: crate::page::PAGE_SIZE });
    }

    let old_opaque: PageOpaque = {
        let page = handle.rl();
        debug_assert!(
            page.is_empty() || new_item.tid() > LeafItem::decode(page.get_item(page.max_offset())).tid(),
            "split_leaf requires new_item to sort after every existing item (rightmost-only policy)"
        );
        *page.opaque()
    };

    let split_key = Tid::new(old_opaque.lokey.block + 1, 1);

    let right_opaque = PageOpaque {
        lokey: split_key,
        hikey: old_opaque.hikey,
        next: old_opaque.next,
        level: 0,
        flags: 0,
        page_id: old_opaque.page_id,
    };
    let (right_block, right_handle) = buffer.new_page(right_opaque)?;
    right_handle
        .wl()
        .add_item(&new_item.encode())
        .ok_or_else(|| BtreeError::corruption("split right half (the new item alone) does not fit on a fresh page"))?;

    {
        let mut left_page = handle.wl();
        left_page.opaque_mut().hikey = split_key;
        left_page.opaque_mut().next = Some(right_block);
        left_page.opaque_mut().set_follow_right();
    }

    debug!("split leaf {} into {} | {}, split key {}", leaf_block, leaf_block, right_block, split_key);
    Ok(Some(SplitOutcome { right_block, split_key }))
}

/// Same contract as [`split_leaf`], for internal pages receiving a new
/// downlink.
pub fn split_internal(
    buffer: &dyn BufferManager,
    internal_block: BlockNumber,
    new_item: InternalItem,
) -> Result<Option<SplitOutcome>> {
    let handle = buffer.get_page(internal_block)?;

    {
        let mut page = handle.wl();
        if page.add_item(&new_item.encode()).is_some() {
            return Ok(None);
        }
    }

    let (old_opaque, existing) = {
        let page = handle.rl();
        (*page.opaque(), internal::read_items(&page))
    };

    let mut combined = existing;
    combined.push(new_item);

    let split_at = (combined.len() * INTERNAL_SPLIT_LEFT_PCT / 100).max(1).min(combined.len() - 1);
    let right_items = combined.split_off(split_at);
    let left_items = combined;
    let split_key = right_items[0].tid;
    let level = old_opaque.level;

    let right_opaque = PageOpaque {
        lokey: split_key,
        hikey: old_opaque.hikey,
        next: old_opaque.next,
        level,
        flags: 0,
        page_id: old_opaque.page_id,
    };
    let (right_block, right_handle) = buffer.new_page(right_opaque)?;
    {
        let mut right_page = right_handle.wl();
        for item in &right_items {
            internal::append_item(&mut right_page, *item)
                .ok_or_else(|| BtreeError::corruption("split right half does not fit on a fresh internal page"))?;
        }
    }

    {
        let mut left_page = handle.wl();
        left_page.clear_items();
        for item in &left_items {
            internal::append_item(&mut left_page, *item)
                .ok_or_else(|| BtreeError::corruption("split left half does not fit back on its own page"))?;
        }
        left_page.opaque_mut().hikey = split_key;
        left_page.opaque_mut().next = Some(right_block);
        left_page.opaque_mut().set_follow_right();
    }

    debug!("split internal page {} into {} | {}, split key {}", internal_block, internal_block, right_block, split_key);
    Ok(Some(SplitOutcome { right_block, split_key }))
}

/// Build a fresh two-child root above a page that just split while it was
/// itself the root, and install it via `meta`.
fn new_root(
    buffer: &dyn BufferManager,
    left_block: BlockNumber,
    right_block: BlockNumber,
    split_key: Tid,
    child_level: u16,
) -> Result<BlockNumber> {
    let (root_block, root_handle) = buffer.new_page(PageOpaque::new_internal(Tid::LOW, Tid::HIGH, child_level + 1))?;
    let mut root_page = root_handle.wl();
    internal::append_item(&mut root_page, InternalItem::new(Tid::LOW, left_block))
        .ok_or_else(|| BtreeError::corruption("fresh root page cannot hold two downlinks"))?;
    internal::append_item(&mut root_page, InternalItem::new(split_key, right_block))
        .ok_or_else(|| BtreeError::corruption("fresh root page cannot hold two downlinks"))?;
    debug!("new root {} over {} | {}, level {}", root_block, left_block, right_block, child_level + 1);
    Ok(root_block)
}

fn clear_follow_right(buffer: &dyn BufferManager, block: BlockNumber) -> Result<()> {
    let handle = buffer.get_page(block)?;
    handle.wl().opaque_mut().clear_follow_right();
    Ok(())
}

/// Propagate a split's new downlink up the tree, splitting ancestors (and,
/// at the limit, growing a new root) as needed.
///
/// `child_lokey` is `left_block`'s lokey from *before* the split (the
/// split only moves `hikey`, so it still identifies the page uniquely to
/// [`crate::descend::find_downlink`], even if an unrelated concurrent
/// split has since moved its recorded parent rightward).
pub fn insert_downlink(
    buffer: &dyn BufferManager,
    meta: &dyn MetaPageService,
    child_lokey: Tid,
    child_level: u16,
    left_block: BlockNumber,
    split_key: Tid,
    right_block: BlockNumber,
) -> Result<()> {
    let root = meta.get_root()?.ok_or_else(|| BtreeError::corruption("insert_downlink with no root"))?;

    if root == left_block {
        let new_root_block = new_root(buffer, left_block, right_block, split_key, child_level)?;
        meta.set_root(new_root_block)?;
        clear_follow_right(buffer, left_block)?;
        return Ok(());
    }

    let (parent_block, idx) = crate::descend::find_downlink(buffer, root, child_lokey, left_block, child_level)?;
    let new_downlink = InternalItem::new(split_key, right_block);

    let fit = {
        let handle = buffer.get_page(parent_block)?;
        let mut page = handle.wl();

        let items = internal::read_items(&page);
        let found = items.get(idx).ok_or_else(|| {
            BtreeError::corruption(format!("find_downlink returned index {} out of range on block {}", idx, parent_block))
        })?;
        if found.tid != child_lokey || found.child != left_block {
            return Err(BtreeError::corruption(format!(
                "parent downlink [{}] -> block {} on block {} does not match split child (lokey {}, block {})",
                found.tid, found.child, parent_block, child_lokey, left_block
            )));
        }

        page.add_item(&new_downlink.encode())
    };

    clear_follow_right(buffer, left_block)?;

    if fit.is_some() {
        return Ok(());
    }

    let parent_lokey = {
        let handle = buffer.get_page(parent_block)?;
        handle.rl().opaque().lokey
    };
    let outcome = split_internal(buffer, parent_block, new_downlink)?
        .expect("internal page rejected a downlink that just failed to fit, so it must split");
    insert_downlink(buffer, meta, parent_lokey, child_level + 1, parent_block, outcome.split_key, outcome.right_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InMemoryBufferManager;
    use crate::meta::InMemoryMetaPageService;

    fn uncompressed(tid: Tid) -> LeafItem {
        LeafItem::Uncompressed { tid, header: None, datum: vec![0u8; 32] }
    }

    #[test]
    fn split_leaf_divides_items_and_links_siblings() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();

        let mut outcome = None;
        for i in 1..200u32 {
            let item = uncompressed(Tid::new(0, i as u16));
            if let Some(o) = split_leaf(&buffer, leaf, item).unwrap() {
                outcome = Some(o);
                break;
            }
        }
        let outcome = outcome.expect("page should have split well before 200 32-byte items");

        let left_opaque = *handle.rl().opaque();
        assert_eq!(left_opaque.hikey, outcome.split_key);
        assert_eq!(left_opaque.next, Some(outcome.right_block));
        assert!(left_opaque.follow_right());

        let right_handle = buffer.get_page(outcome.right_block).unwrap();
        let right_opaque = *right_handle.rl().opaque();
        assert_eq!(right_opaque.lokey, outcome.split_key);
        assert_eq!(right_opaque.hikey, Tid::HIGH);
    }

    /// Split point is `(lokey.block + 1, 1)`, every pre-existing item
    /// stays on the left page untouched, and the overflowing new item
    /// lands alone on the right.
    #[test]
    fn split_key_is_lokey_block_plus_one_and_left_items_stay_contiguous() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();

        let mut k = 0u16;
        let mut outcome = None;
        for i in 1..200u32 {
            let item = uncompressed(Tid::new(0, i as u16));
            match split_leaf(&buffer, leaf, item).unwrap() {
                Some(o) => {
                    outcome = Some(o);
                    break;
                }
                None => k = i as u16,
            }
        }
        let outcome = outcome.expect("page should have split well before 200 32-byte items");

        assert_eq!(outcome.split_key, Tid::new(1, 1));

        let left_items: Vec<LeafItem> = handle.rl().items().map(LeafItem::decode).collect();
        assert_eq!(left_items.len(), k as usize);
        for (i, item) in left_items.iter().enumerate() {
            assert_eq!(item.tid(), Tid::new(0, i as u16 + 1));
        }

        let right_handle = buffer.get_page(outcome.right_block).unwrap();
        let right_items: Vec<LeafItem> = right_handle.rl().items().map(LeafItem::decode).collect();
        assert_eq!(right_items.len(), 1);
        assert_eq!(right_items[0].tid(), Tid::new(0, k + 1));
    }

    #[test]
    fn insert_downlink_without_a_parent_grows_a_new_root() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        let (leaf, _) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        meta.set_root(leaf).unwrap();

        let (right, _) = buffer.new_page(PageOpaque::new_leaf(Tid::new(5, 0), Tid::HIGH)).unwrap();
        buffer.get_page(leaf).unwrap().wl().opaque_mut().hikey = Tid::new(5, 0);
        buffer.get_page(leaf).unwrap().wl().opaque_mut().next = Some(right);
        buffer.get_page(leaf).unwrap().wl().opaque_mut().set_follow_right();

        insert_downlink(&buffer, &meta, Tid::LOW, 0, leaf, Tid::new(5, 0), right).unwrap();

        let new_root = meta.get_root().unwrap().unwrap();
        assert_ne!(new_root, leaf);
        let root_handle = buffer.get_page(new_root).unwrap();
        let items = internal::read_items(&root_handle.rl());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].child, leaf);
        assert_eq!(items[1].child, right);
        assert!(!buffer.get_page(leaf).unwrap().rl().opaque().follow_right());
    }
}
