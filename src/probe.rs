//! Point lookups that don't need a full scan: the tree's last TID, and
//! probing for one specific TID's presence.

use crate::buffer::{BufferManager, HandyRwLock};
use crate::codec::Codec;
use crate::descend;
use crate::error::Result;
use crate::item::LeafItem;
use crate::tid::{BlockNumber, Tid};

/// The highest TID stored anywhere in the tree, or `None` if it's empty.
/// Callers assigning a fresh TID for the next insert use
/// `last_tid(..)?.map_or(Tid::LOW, Tid::next)`.
pub fn last_tid(buffer: &dyn BufferManager, root: BlockNumber) -> Result<Option<Tid>> {
    let descent = descend::descend(buffer, root, Tid::RIGHTMOST_PROBE)?;
    let handle = buffer.get_page(descent.leaf_block)?;
    let page = handle.rl();
    if page.is_empty() {
        return Ok(None);
    }
    let last_raw = page.get_item(page.max_offset());
    Ok(Some(LeafItem::decode(last_raw).last_tid()))
}

/// Whether `target` currently exists on the tree, decompressing a
/// straddling run when the probe lands inside one. `delete_probe` must
/// decompress runs rather than treat any `CompressedRun` covering the TID
/// as an automatic hit, since deletion of one row out of a run is exactly
/// the case that needs the precise answer.
pub fn delete_probe(buffer: &dyn BufferManager, root: BlockNumber, target: Tid, codec: &dyn Codec) -> Result<bool> {
    let descent = descend::descend(buffer, root, target)?;
    probe_leaf(buffer, descent.leaf_block, target, codec)
}

fn probe_leaf(buffer: &dyn BufferManager, leaf_block: BlockNumber, target: Tid, codec: &dyn Codec) -> Result<bool> {
    let handle = buffer.get_page(leaf_block)?;
    let page = handle.rl();
    for raw in page.items() {
        let item = LeafItem::decode(raw);
        match item {
            LeafItem::Uncompressed { tid, .. } => {
                if tid == target {
                    return Ok(true);
                }
            }
            LeafItem::CompressedRun { first_tid, last_tid, blob } => {
                if target >= first_tid && target <= last_tid {
                    let rows = codec.decode(first_tid, last_tid, &blob);
                    return Ok(rows.iter().any(|(tid, _)| *tid == target));
                }
            }
        }
    }
    Ok(false)
}
