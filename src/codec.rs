//! The compression codec collaborator: turning a run of same-key datums
//! into a single opaque blob is explicitly out of scope for this crate;
//! this module fixes the streaming `begin`/`add`/`finish`/`rejected`
//! contract the compressor drives, plus two reference implementations for
//! tests.

use crate::tid::Tid;

/// Accumulates datums for one candidate compressed run.
pub trait CodecBuilder {
    /// Offer the next datum. Returns `false` if the run cannot accept any
    /// more items (the run should stop *before* this datum, which the
    /// caller then starts a fresh run with).
    fn add(&mut self, datum: &[u8]) -> bool;

    /// True once `add` has ever returned `false` — the run is dead and
    /// `finish` must not be called.
    fn rejected(&self) -> bool;

    /// Consume the builder, producing the opaque blob for a
    /// `CompressedRun` leaf item. Only valid when `!rejected()`.
    fn finish(self: Box<Self>) -> Vec<u8>;
}

/// Produces codec builders. One instance is shared by every compression
/// attempt the tree makes.
pub trait Codec: Send + Sync {
    /// Start a new run. `free_bytes` is the remaining space on the
    /// destination page at the moment the run begins, so a codec that
    /// tracks its own encoded size can reject before overflowing it
    /// instead of relying solely on `finish`'s caller to re-check.
    fn begin(&self, free_bytes: usize) -> Box<dyn CodecBuilder>;

    /// Expand a `CompressedRun`'s blob back into `(tid, datum)` pairs for
    /// scanning, given the bracketing TIDs stored alongside it on the
    /// page.
    fn decode(&self, first_tid: Tid, last_tid: Tid, blob: &[u8]) -> Vec<(Tid, Vec<u8>)>;
}

/// A reference codec that collapses a run of byte-identical datums into a
/// `(count, value)` pair — the simplest case the real per-attribute
/// codecs (dictionary/RLE/delta) all specialize.
pub struct RunLengthCodec {
    max_run: u32,
}

impl RunLengthCodec {
    pub fn new(max_run: u32) -> Self {
        RunLengthCodec { max_run }
    }
}

impl Default for RunLengthCodec {
    fn default() -> Self {
        RunLengthCodec::new(u32::MAX)
    }
}

impl Codec for RunLengthCodec {
    fn begin(&self, _free_bytes: usize) -> Box<dyn CodecBuilder> {
        Box::new(RunLengthBuilder { max_run: self.max_run, value: None, count: 0, rejected: false })
    }

    fn decode(&self, first_tid: Tid, last_tid: Tid, blob: &[u8]) -> Vec<(Tid, Vec<u8>)> {
        let (count, value) = decode_run_length(blob);
        let mut rows = Vec::with_capacity(count as usize);
        let mut tid = first_tid;
        for _ in 0..count {
            rows.push((tid, value.clone()));
            tid = tid.next();
        }
        debug_assert_eq!(rows.last().map(|(t, _)| *t), Some(last_tid));
        rows
    }
}

struct RunLengthBuilder {
    max_run: u32,
    value: Option<Vec<u8>>,
    count: u32,
    rejected: bool,
}

impl CodecBuilder for RunLengthBuilder {
    fn add(&mut self, datum: &[u8]) -> bool {
        if self.rejected {
            return false;
        }
        match &self.value {
            None => {
                self.value = Some(datum.to_vec());
                self.count = 1;
                true
            }
            Some(v) if v.as_slice() == datum && self.count < self.max_run => {
                self.count += 1;
                true
            }
            _ => {
                self.rejected = true;
                false
            }
        }
    }

    fn rejected(&self) -> bool {
        self.rejected
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        let value = self.value.unwrap_or_default();
        let mut out = Vec::with_capacity(8 + value.len());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(&value);
        out
    }
}

/// Decode a blob produced by [`RunLengthCodec`] back into `(count, value)`.
pub fn decode_run_length(blob: &[u8]) -> (u32, Vec<u8>) {
    let count = u32::from_le_bytes(blob[0..4].try_into().unwrap());
    let value_len = u32::from_le_bytes(blob[4..8].try_into().unwrap()) as usize;
    (count, blob[8..8 + value_len].to_vec())
}

/// A codec that never accepts a second item, forcing every leaf to stay
/// fully uncompressed — a test double for the "codec rejects outright"
/// path.
#[derive(Default)]
pub struct AlwaysRejectCodec;

impl Codec for AlwaysRejectCodec {
    fn begin(&self, _free_bytes: usize) -> Box<dyn CodecBuilder> {
        Box::new(AlwaysRejectBuilder { added: false })
    }

    fn decode(&self, _first_tid: Tid, _last_tid: Tid, _blob: &[u8]) -> Vec<(Tid, Vec<u8>)> {
        unreachable!("a codec that never compresses anything never needs to decode a run")
    }
}

struct AlwaysRejectBuilder {
    added: bool,
}

impl CodecBuilder for AlwaysRejectBuilder {
    fn add(&mut self, _datum: &[u8]) -> bool {
        if self.added {
            false
        } else {
            self.added = true;
            true
        }
    }

    fn rejected(&self) -> bool {
        false
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        Vec::new()
    }
}
