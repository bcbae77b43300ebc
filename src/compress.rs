//! Opportunistic leaf compression: fold maximal runs of codec-acceptable
//! uncompressed items into a single `CompressedRun` item.
//!
//! This never changes a leaf's key range or splits it — a rejected or
//! too-short run is simply left uncompressed — so it never needs to
//! propagate anything to a parent.

use std::mem;

use crate::buffer::{BufferManager, HandyRwLock};
use crate::codec::Codec;
use crate::error::Result;
use crate::item::LeafItem;
use crate::page::Page;
use crate::tid::BlockNumber;

/// Rewrite `leaf_block`'s items, compressing runs of two or more
/// consecutive, codec-acceptable datums. Returns `true` if anything was
/// actually folded.
///
/// Builds the candidate layout on a scratch [`Page`] first and only swaps
/// it into the live page if every item actually fits — a scratch page
/// that would overflow aborts with the live page untouched, rather than
/// partway through a destructive rewrite.
pub fn compress_leaf(buffer: &dyn BufferManager, leaf_block: BlockNumber, codec: &dyn Codec) -> Result<bool> {
    let handle = buffer.get_page(leaf_block)?;
    let (opaque, items): (_, Vec<LeafItem>) = {
        let page = handle.rl();
        (*page.opaque(), page.items().map(LeafItem::decode).collect())
    };

    // The scratch page's eventual capacity is bounded by the live page's
    // current free space; every run the codec builds is handed that same
    // budget so it can reject before its own encoded size would overflow
    // the page it's destined for (§4.G).
    let free_bytes = handle.rl().free_space();

    let mut output = Vec::with_capacity(items.len());
    let mut run: Vec<LeafItem> = Vec::new();
    let mut builder = codec.begin(free_bytes);

    for item in items {
        match item {
            LeafItem::CompressedRun { .. } => {
                flush_run(&mut output, &mut run, &mut builder, codec, free_bytes);
                output.push(item);
            }
            LeafItem::Uncompressed { ref datum, .. } => {
                if builder.add(datum) {
                    run.push(item);
                } else {
                    flush_run(&mut output, &mut run, &mut builder, codec, free_bytes);
                    builder.add(datum);
                    run.push(item);
                }
            }
        }
    }
    flush_run(&mut output, &mut run, &mut builder, codec, free_bytes);

    let changed = output.iter().any(|i| i.is_compressed());
    if !changed {
        return Ok(false);
    }

    let mut scratch = Page::new(opaque);
    for item in &output {
        match scratch.add_item(&item.encode()) {
            Some(_) => {}
            None => return Ok(false),
        }
    }

    *handle.wl() = scratch;
    Ok(true)
}

fn flush_run(
    output: &mut Vec<LeafItem>,
    run: &mut Vec<LeafItem>,
    builder: &mut Box<dyn crate::codec::CodecBuilder>,
    codec: &dyn Codec,
    free_bytes: usize,
) {
    let taken_run = mem::take(run);
    let taken_builder = mem::replace(builder, codec.begin(free_bytes));
    if taken_run.len() < 2 {
        output.extend(taken_run);
        return;
    }
    let first_tid = taken_run[0].tid();
    let last_tid = taken_run.last().unwrap().tid();
    let blob = taken_builder.finish();
    output.push(LeafItem::CompressedRun { first_tid, last_tid, blob });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InMemoryBufferManager;
    use crate::codec::{AlwaysRejectCodec, RunLengthCodec};
    use crate::page::PageOpaque;
    use crate::tid::Tid;

    fn item(offset: u16, datum: &[u8]) -> LeafItem {
        LeafItem::Uncompressed { tid: Tid::new(0, offset), header: None, datum: datum.to_vec() }
    }

    #[test]
    fn a_run_of_identical_datums_collapses_to_one_item() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        for i in 1..=5u16 {
            handle.wl().add_item(&item(i, b"same").encode()).unwrap();
        }
        let codec = RunLengthCodec::default();
        let changed = compress_leaf(&buffer, leaf, &codec).unwrap();
        assert!(changed);

        let items: Vec<_> = handle.rl().items().map(LeafItem::decode).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_compressed());
        assert_eq!(items[0].tid(), Tid::new(0, 1));
        assert_eq!(items[0].last_tid(), Tid::new(0, 5));
    }

    #[test]
    fn mixed_datums_only_compress_their_runs() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        handle.wl().add_item(&item(1, b"a").encode()).unwrap();
        handle.wl().add_item(&item(2, b"a").encode()).unwrap();
        handle.wl().add_item(&item(3, b"b").encode()).unwrap();
        let codec = RunLengthCodec::default();
        assert!(compress_leaf(&buffer, leaf, &codec).unwrap());

        let items: Vec<_> = handle.rl().items().map(LeafItem::decode).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_compressed());
        assert!(!items[1].is_compressed());
    }

    #[test]
    fn a_rejecting_codec_leaves_the_page_untouched() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        for i in 1..=3u16 {
            handle.wl().add_item(&item(i, b"x").encode()).unwrap();
        }
        let codec = AlwaysRejectCodec::default();
        assert!(!compress_leaf(&buffer, leaf, &codec).unwrap());
        assert_eq!(handle.rl().max_offset(), 3);
    }
}
