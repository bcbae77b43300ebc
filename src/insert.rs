//! Top-level insertion: descend to the rightmost leaf for a TID, try to
//! add the item, opportunistically compress on overflow, and propagate a
//! split upward if it still doesn't fit.

use crate::buffer::{BufferManager, HandyRwLock};
use crate::codec::Codec;
use crate::compress;
use crate::descend;
use crate::error::{BtreeError, Result};
use crate::item::LeafItem;
use crate::meta::MetaPageService;
use crate::page::{Page, PageOpaque, PAGE_SIZE};
use crate::split;
use crate::tid::Tid;

/// Insert one row's datum (and, for attribute 1, its row header) at
/// `tid`. The caller — typically `tree::BTree::insert_new_row` — is
/// responsible for choosing `tid`, usually [`crate::probe::last_tid`]
/// advanced by one, since TIDs are shared across every attribute's tree
/// for the same logical row.
pub fn insert(
    buffer: &dyn BufferManager,
    meta: &dyn MetaPageService,
    codec: &dyn Codec,
    tid: Tid,
    header: Option<Vec<u8>>,
    datum: Vec<u8>,
) -> Result<()> {
    let item = LeafItem::Uncompressed { tid, header, datum };
    if Page::oversize(item.encoded_len()) {
        return Err(BtreeError::Overflow { item_size: item.encoded_len(), page_capacity: PAGE_SIZE });
    }

    let root = match meta.get_root()? {
        Some(root) => root,
        None => {
            let (block, _) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH))?;
            meta.set_root(block)?;
            block
        }
    };

    let descent = descend::descend(buffer, root, tid)?;
    let leaf_block = descent.leaf_block;
    let leaf_lokey = buffer.get_page(leaf_block)?.rl().opaque().lokey;

    // Try the item as-is; on overflow, compress the leaf opportunistically
    // and let `split_leaf`'s own add-item attempt decide whether that
    // freed up enough room after all.
    let handle = buffer.get_page(leaf_block)?;
    let fits_unchanged = handle.rl().fits(item.encoded_len());
    drop(handle);
    if !fits_unchanged {
        compress::compress_leaf(buffer, leaf_block, codec)?;
    }

    match split::split_leaf(buffer, leaf_block, item)? {
        None => Ok(()),
        Some(outcome) => {
            split::insert_downlink(buffer, meta, leaf_lokey, 0, leaf_block, outcome.split_key, outcome.right_block)
        }
    }
}
