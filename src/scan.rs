//! Forward, TID-ordered scanning, transparently expanding compressed runs.
//! Re-expressed as an explicit state machine rather than a loop-with-goto.

use crate::buffer::{BufferManager, HandyRwLock};
use crate::codec::Codec;
use crate::descend;
use crate::error::Result;
use crate::item::LeafItem;
use crate::tid::{BlockNumber, Tid};

enum ScanState {
    /// About to read item `offset` (1-based) off `block`.
    ReadingPage { block: BlockNumber, offset: u16 },
    /// Yielding rows decoded from a `CompressedRun`, after which scanning
    /// resumes at `offset` on `block`.
    StreamingDecompressed { block: BlockNumber, offset: u16, rows: Vec<(Tid, Vec<u8>)>, idx: usize },
    Exhausted,
}

/// A live forward scan. Holds no buffer-manager reference itself — every
/// call passes one in, matching this crate's "no hidden state" stance on
/// external collaborators.
pub struct Scan {
    state: ScanState,
    /// Set while the very first page may still contain rows below the
    /// scan's starting TID; cleared after the first row is actually
    /// emitted.
    threshold: Option<Tid>,
}

impl Scan {
    /// Begin a scan for TIDs `>= start_tid`, descending from `root` to
    /// the leaf that should contain it.
    pub fn begin(buffer: &dyn BufferManager, root: BlockNumber, start_tid: Tid) -> Result<Scan> {
        let descent = descend::descend(buffer, root, start_tid)?;
        Ok(Scan {
            state: ScanState::ReadingPage { block: descent.leaf_block, offset: 1 },
            threshold: Some(start_tid),
        })
    }

    /// An already-exhausted scan — for a tree with no root yet.
    pub fn exhausted() -> Scan {
        Scan { state: ScanState::Exhausted, threshold: None }
    }

    /// Produce the next `(tid, datum, header)` triple in order, or `None`
    /// once the tree is exhausted. `header` is the row header carried
    /// alongside attribute 1's uncompressed items, for the caller to hand
    /// to its visibility oracle; it is always `None` for other attributes
    /// and for any row unpacked out of a compressed run, since the
    /// codec's decoded payload is header-less (§4.H).
    pub fn next(
        &mut self,
        buffer: &dyn BufferManager,
        codec: &dyn Codec,
    ) -> Result<Option<(Tid, Vec<u8>, Option<Vec<u8>>)>> {
        loop {
            let state = std::mem::replace(&mut self.state, ScanState::Exhausted);
            match state {
                ScanState::Exhausted => {
                    self.state = ScanState::Exhausted;
                    return Ok(None);
                }
                ScanState::StreamingDecompressed { block, offset, rows, mut idx } => {
                    if idx < rows.len() {
                        let (tid, datum) = rows[idx].clone();
                        idx += 1;
                        self.state = ScanState::StreamingDecompressed { block, offset, rows, idx };
                        if self.passes_threshold(tid) {
                            return Ok(Some((tid, datum, None)));
                        }
                        continue;
                    }
                    self.state = ScanState::ReadingPage { block, offset };
                    continue;
                }
                ScanState::ReadingPage { block, offset } => {
                    let handle = buffer.get_page(block)?;
                    let (max_offset, next_link) = {
                        let page = handle.rl();
                        (page.max_offset(), page.opaque().next)
                    };

                    if offset > max_offset {
                        self.state = match next_link {
                            Some(next) => {
                                if next == block {
                                    return Err(crate::error::BtreeError::corruption(format!(
                                        "self-referential right-link on block {}",
                                        block
                                    )));
                                }
                                ScanState::ReadingPage { block: next, offset: 1 }
                            }
                            None => ScanState::Exhausted,
                        };
                        continue;
                    }

                    let raw = handle.rl().get_item(offset).to_vec();
                    let item = LeafItem::decode(&raw);
                    let next_offset = offset + 1;

                    match item {
                        LeafItem::Uncompressed { tid, header, datum } => {
                            self.state = ScanState::ReadingPage { block, offset: next_offset };
                            if self.passes_threshold(tid) {
                                return Ok(Some((tid, datum, header)));
                            }
                        }
                        LeafItem::CompressedRun { first_tid, last_tid, blob } => {
                            let rows = codec.decode(first_tid, last_tid, &blob);
                            self.state = ScanState::StreamingDecompressed { block, offset: next_offset, rows, idx: 0 };
                        }
                    }
                }
            }
        }
    }

    fn passes_threshold(&mut self, tid: Tid) -> bool {
        match self.threshold {
            Some(th) if tid < th => false,
            Some(_) => {
                self.threshold = None;
                true
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InMemoryBufferManager;
    use crate::codec::RunLengthCodec;
    use crate::insert::insert;
    use crate::meta::{InMemoryMetaPageService, MetaPageService};

    #[test]
    fn scan_over_an_empty_tree_yields_nothing() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, _) = buffer.new_page(crate::page::PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        let codec = RunLengthCodec::default();
        let mut scan = Scan::begin(&buffer, leaf, Tid::LOW).unwrap();
        assert!(scan.next(&buffer, &codec).unwrap().is_none());
    }

    #[test]
    fn scan_honors_a_starting_tid_mid_page() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        let codec = RunLengthCodec::default();
        for i in 1..=10u32 {
            insert(&buffer, &meta, &codec, Tid::new(0, i as u16), None, vec![i as u8]).unwrap();
        }
        let root = meta.get_root().unwrap().unwrap();
        let mut scan = Scan::begin(&buffer, root, Tid::new(0, 6)).unwrap();
        let mut seen = Vec::new();
        while let Some((tid, _, _)) = scan.next(&buffer, &codec).unwrap() {
            seen.push(tid);
        }
        assert_eq!(seen, (6..=10u16).map(|o| Tid::new(0, o)).collect::<Vec<_>>());
    }

    #[test]
    fn scan_raises_corruption_on_a_self_referential_right_link() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(crate::page::PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        handle.wl().opaque_mut().next = Some(leaf);
        let codec = RunLengthCodec::default();
        let mut scan = Scan::begin(&buffer, leaf, Tid::LOW).unwrap();
        let err = scan.next(&buffer, &codec).unwrap_err();
        assert!(matches!(err, crate::error::BtreeError::Corruption(_)));
    }

    #[test]
    fn scan_carries_the_row_header_alongside_an_uncompressed_item() {
        let buffer = InMemoryBufferManager::new();
        let meta = InMemoryMetaPageService::new();
        let codec = RunLengthCodec::default();
        insert(&buffer, &meta, &codec, Tid::new(0, 1), Some(vec![0xAB]), vec![1]).unwrap();
        let root = meta.get_root().unwrap().unwrap();
        let mut scan = Scan::begin(&buffer, root, Tid::LOW).unwrap();
        let (_, _, header) = scan.next(&buffer, &codec).unwrap().unwrap();
        assert_eq!(header, Some(vec![0xAB]));
    }

    #[test]
    fn scan_transparently_expands_a_compressed_run() {
        let buffer = InMemoryBufferManager::new();
        let (leaf, handle) = buffer.new_page(crate::page::PageOpaque::new_leaf(Tid::LOW, Tid::HIGH)).unwrap();
        handle
            .wl()
            .add_item(
                &LeafItem::CompressedRun { first_tid: Tid::new(0, 1), last_tid: Tid::new(0, 3), blob: {
                    let mut b = Vec::new();
                    b.extend_from_slice(&3u32.to_le_bytes());
                    b.extend_from_slice(&1u32.to_le_bytes());
                    b.push(b'x');
                    b
                } }
                .encode(),
            )
            .unwrap();
        let codec = RunLengthCodec::default();
        let mut scan = Scan::begin(&buffer, leaf, Tid::LOW).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = scan.next(&buffer, &codec).unwrap() {
            rows.push(row);
        }
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, Tid::new(0, 1));
        assert_eq!(rows[2].0, Tid::new(0, 3));
        assert!(rows.iter().all(|(_, d, header)| d == b"x" && header.is_none()));
    }
}
