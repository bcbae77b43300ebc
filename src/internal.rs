//! Internal page items: fixed-size `(separator tid, child block)` pairs,
//! plus the rightmost-≤-key binary search that drives descent.

use crate::page::Page;
use crate::tid::{BlockNumber, Tid};

/// One downlink: `tid` is the separator key, `child` the page it roots.
/// Every key on `child` is `>= tid` (and `< ` the next item's tid, or the
/// page's `hikey` for the last item).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalItem {
    pub tid: Tid,
    pub child: BlockNumber,
}

const ENCODED_LEN: usize = 10;

impl InternalItem {
    pub fn new(tid: Tid, child: BlockNumber) -> Self {
        InternalItem { tid, child }
    }

    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut out = [0u8; ENCODED_LEN];
        out[0..4].copy_from_slice(&self.tid.block.to_le_bytes());
        out[4..6].copy_from_slice(&self.tid.offset.to_le_bytes());
        out[6..10].copy_from_slice(&self.child.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let block = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let offset = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let child = u32::from_le_bytes(bytes[6..10].try_into().unwrap());
        InternalItem { tid: Tid::new(block, offset), child }
    }
}

/// Read every item off an internal page, in their on-page (and therefore
/// key-sorted) order.
pub fn read_items(page: &Page) -> Vec<InternalItem> {
    page.items().map(InternalItem::decode).collect()
}

/// Append a downlink to an internal page, returning the assigned offset,
/// or `None` if it doesn't fit.
pub fn append_item(page: &mut Page, item: InternalItem) -> Option<u16> {
    page.add_item(&item.encode())
}

/// Find the downlink to follow for `target`: the rightmost item whose key
/// is `<= target`. When several items share that key (can happen
/// transiently while a split's downlink insertion races a concurrent
/// descender), ties break to the leftmost of them, matching the original
/// implementation's contract that the leftmost downlink for a key is
/// always the authoritative one mid-split.
///
/// Panics if `items` is empty or `target` is less than `items[0].tid`;
/// callers are expected to have already bracketed `target` against the
/// page's `lokey`/`hikey`.
pub fn binsrch_internal(items: &[InternalItem], target: Tid) -> usize {
    assert!(!items.is_empty(), "internal page has no items to search");
    assert!(target >= items[0].tid, "target precedes the page's lokey");

    let mut lo = 0usize;
    let mut hi = items.len(); // exclusive
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if items[mid].tid <= target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let key = items[lo].tid;
    while lo > 0 && items[lo - 1].tid == key {
        lo -= 1;
    }
    lo
}
