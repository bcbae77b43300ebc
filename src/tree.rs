//! Public façade: wires the descend/insert/split/compress/scan/probe
//! modules to a caller's buffer manager, metapage service, codec and MVCC
//! collaborators.

use std::sync::Arc;

use crate::buffer::BufferManager;
use crate::codec::Codec;
use crate::compress;
use crate::error::Result;
use crate::insert;
use crate::meta::MetaPageService;
use crate::mvcc::{AttributeMeta, VisibilityOracle};
use crate::probe;
use crate::scan::Scan;
use crate::tid::{BlockNumber, Tid};

/// One attribute's B-tree. Cheap to clone: every field is a shared handle
/// to an external collaborator, matching the page-latching model where
/// all real state lives behind the buffer manager.
#[derive(Clone)]
pub struct BTree {
    buffer: Arc<dyn BufferManager>,
    meta: Arc<dyn MetaPageService>,
    codec: Arc<dyn Codec>,
    visibility: Arc<dyn VisibilityOracle>,
    attribute: Arc<dyn AttributeMeta>,
}

impl BTree {
    pub fn new(
        buffer: Arc<dyn BufferManager>,
        meta: Arc<dyn MetaPageService>,
        codec: Arc<dyn Codec>,
        visibility: Arc<dyn VisibilityOracle>,
        attribute: Arc<dyn AttributeMeta>,
    ) -> Self {
        BTree { buffer, meta, codec, visibility, attribute }
    }

    fn root(&self) -> Result<Option<BlockNumber>> {
        self.meta.get_root()
    }

    /// Assign the next TID (`last_tid() + 1`, or `Tid::LOW` for an empty
    /// tree) and insert `datum` at it. For attribute 1, `header` is
    /// stored alongside the datum; other attributes never carry one.
    pub fn insert_new_row(&self, header: Option<Vec<u8>>, datum: Vec<u8>) -> Result<Tid> {
        let tid = match self.raw_last_tid()? {
            Some(last) => last.next(),
            None => Tid::LOW,
        };
        self.insert_at(tid, header, datum)?;
        Ok(tid)
    }

    /// Insert at a caller-chosen TID — used by every attribute *after*
    /// the first to store the same logical row's other columns under the
    /// TID attribute 1 already assigned.
    pub fn insert_at(&self, tid: Tid, header: Option<Vec<u8>>, datum: Vec<u8>) -> Result<()> {
        let header = if self.attribute.carries_row_header() { header } else { None };
        insert::insert(&*self.buffer, &*self.meta, &*self.codec, tid, header, datum)
    }

    /// The highest TID actually stored in the tree, or `None` if it's
    /// empty — `probe::last_tid`'s raw convention, used internally by
    /// `insert_new_row` to derive the next TID to assign.
    fn raw_last_tid(&self) -> Result<Option<Tid>> {
        match self.root()? {
            None => Ok(None),
            Some(root) => probe::last_tid(&*self.buffer, root),
        }
    }

    /// One past the highest TID stored in the tree (`Tid::LOW` if it's
    /// empty), per spec.md §4.I: the TID the *next* insert would be
    /// assigned, not the last one actually used.
    pub fn last_tid(&self) -> Result<Option<Tid>> {
        Ok(self.raw_last_tid()?.map(Tid::next))
    }

    /// Whether `tid` currently exists in this tree.
    pub fn contains(&self, tid: Tid) -> Result<bool> {
        match self.root()? {
            None => Ok(false),
            Some(root) => probe::delete_probe(&*self.buffer, root, tid, &*self.codec),
        }
    }

    /// Whether `tid`'s row version (with attribute 1's `header`, if any)
    /// is visible under this tree's visibility oracle.
    pub fn is_visible(&self, tid: Tid, header: Option<&[u8]>) -> bool {
        self.visibility.is_visible(tid, header)
    }

    /// Begin a forward scan over TIDs `>= start`. A tree with no root yet
    /// (nothing has ever been inserted) yields an immediately exhausted
    /// scan rather than an error.
    pub fn scan_from(&self, start: Tid) -> Result<Scan> {
        match self.root()? {
            Some(root) => Scan::begin(&*self.buffer, root, start),
            None => Ok(Scan::exhausted()),
        }
    }

    /// Advance `scan`, returning the next `(tid, datum, visible)` triple.
    /// For attribute 1, `visible` is the visibility oracle's verdict on
    /// the row's header, propagated verbatim; every other attribute
    /// reports `true` unconditionally, since visibility is attribute 1's
    /// responsibility alone (§4.H).
    pub fn next_row(&self, scan: &mut Scan) -> Result<Option<(Tid, Vec<u8>, bool)>> {
        match scan.next(&*self.buffer, &*self.codec)? {
            None => Ok(None),
            Some((tid, datum, header)) => {
                let visible =
                    !self.attribute.carries_row_header() || self.visibility.is_visible(tid, header.as_deref());
                Ok(Some((tid, datum, visible)))
            }
        }
    }

    /// Opportunistically compress one leaf page. Not called automatically
    /// by `insert_at` — a caller decides when to pay the cost, e.g. after
    /// a bulk load.
    pub fn compress_leaf(&self, leaf_block: BlockNumber) -> Result<bool> {
        compress::compress_leaf(&*self.buffer, leaf_block, &*self.codec)
    }

    /// Walk every page reachable from the root and panic on the first
    /// violated invariant. A test-only tool, not part of the crate's
    /// runtime error handling.
    pub fn check_integrity(&self) {
        crate::integrity::check_integrity(&*self.buffer, &*self.meta)
    }
}
