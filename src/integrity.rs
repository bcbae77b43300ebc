//! Tree-wide invariant checker: walks every page reachable from the
//! metapage's root and panics on the first violation. Panics rather than
//! returning a `Result` since it exists purely to catch bugs in tests,
//! never to handle a real runtime condition.

use std::collections::HashSet;

use crate::buffer::{BufferManager, HandyRwLock};
use crate::internal;
use crate::item::LeafItem;
use crate::meta::MetaPageService;
use crate::tid::{BlockNumber, Tid};

/// Check every structural invariant a healthy tree must satisfy:
/// - items on a page are strictly ordered and fall inside `[lokey, hikey)`
/// - a non-rightmost page's `hikey` equals its right sibling's `lokey`
/// - every downlink's key matches its child's `lokey`, and the child is
///   exactly one level below its parent
/// - a page with `FOLLOW_RIGHT` set has a valid `next`
///
/// Panics on the first violation found. Call after a mutating operation in
/// tests, not in production code paths.
pub fn check_integrity(buffer: &dyn BufferManager, meta: &dyn MetaPageService) {
    let root = match meta.get_root().expect("metapage unreachable") {
        Some(root) => root,
        None => return,
    };
    let root_level = buffer.get_page(root).expect("root block missing").rl().opaque().level;
    let mut visited = HashSet::new();
    check_level(buffer, root, root_level, &mut visited);
}

fn check_level(buffer: &dyn BufferManager, start: BlockNumber, expected_level: u16, visited: &mut HashSet<BlockNumber>) {
    let mut block = start;
    loop {
        assert!(visited.insert(block), "block {} reachable via two different paths", block);

        let handle = buffer.get_page(block).expect("dangling block reference");
        let opaque = *handle.rl().opaque();
        assert_eq!(opaque.level, expected_level, "block {} has the wrong level for its position in the tree", block);

        if opaque.is_leaf() {
            let mut prev_last: Option<Tid> = None;
            for raw in handle.rl().items() {
                let item = LeafItem::decode(raw);
                let (tid, last) = (item.tid(), item.last_tid());
                assert!(
                    tid >= opaque.lokey && last < opaque.hikey,
                    "item [{}, {}] on block {} escapes its page's [{}, {}) bounds (raw: {})",
                    tid,
                    last,
                    block,
                    opaque.lokey,
                    opaque.hikey,
                    hex::encode(raw)
                );
                if let Some(p) = prev_last {
                    assert!(
                        tid > p,
                        "items not strictly ordered on block {}: {} follows {} (raw: {})",
                        block,
                        tid,
                        p,
                        hex::encode(raw)
                    );
                }
                prev_last = Some(last);
            }
        } else {
            let items = internal::read_items(&handle.rl());
            assert!(!items.is_empty(), "internal block {} has no downlinks", block);
            let mut prev_tid: Option<Tid> = None;
            for it in &items {
                assert!(it.tid >= opaque.lokey, "downlink {} on block {} precedes its page's lokey {}", it.tid, block, opaque.lokey);
                if let Some(p) = prev_tid {
                    assert!(it.tid > p, "downlinks not strictly ordered on block {}", block);
                }
                prev_tid = Some(it.tid);

                let child_opaque = *buffer.get_page(it.child).expect("dangling downlink").rl().opaque();
                assert_eq!(child_opaque.lokey, it.tid, "child {}'s lokey does not match its downlink key {}", it.child, it.tid);
                assert_eq!(child_opaque.level + 1, opaque.level, "child {} is not one level below parent {}", it.child, block);
            }
            for it in &items {
                check_level(buffer, it.child, expected_level - 1, visited);
            }
        }

        if opaque.follow_right() {
            assert!(opaque.next.is_some(), "block {} is FOLLOW_RIGHT but has no next link", block);
        }

        match opaque.next {
            Some(next) => {
                let next_lokey = buffer.get_page(next).expect("dangling next link").rl().opaque().lokey;
                assert_eq!(opaque.hikey, next_lokey, "block {}'s hikey does not match right sibling {}'s lokey", block, next);
                block = next;
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InMemoryBufferManager;
    use crate::codec::AlwaysRejectCodec;
    use crate::insert::insert;
    use crate::meta::InMemoryMetaPageService;
    use crate::tid::Tid;

    #[test]
    fn a_freshly_split_tree_passes_every_invariant() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        let codec = AlwaysRejectCodec::default();
        for i in 1..=2_000u32 {
            insert(&buffer, &meta, &codec, Tid::new(0, i as u16), None, vec![0u8; 24]).unwrap();
        }
        check_integrity(&buffer, &meta);
    }

    #[test]
    fn an_empty_tree_trivially_passes() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        check_integrity(&buffer, &meta);
    }

    #[test]
    #[should_panic(expected = "not strictly ordered")]
    fn a_corrupted_page_is_caught() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        let (leaf, handle) = buffer.new_page(crate::page::PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        meta.set_root(leaf).unwrap();
        handle.wl().add_item(&LeafItem::Uncompressed { tid: Tid::new(0, 5), header: None, datum: vec![1] }.encode()).unwrap();
        handle.wl().add_item(&LeafItem::Uncompressed { tid: Tid::new(0, 3), header: None, datum: vec![2] }.encode()).unwrap();
        check_integrity(&buffer, &meta);
    }
}
