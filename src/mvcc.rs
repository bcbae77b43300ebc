//! Visibility and attribute metadata collaborators. Deciding whether a row
//! version is visible to the current snapshot, and which attribute number
//! a tree belongs to, are both explicitly external to this crate — this
//! module only fixes their contracts, plus the trivial always-visible
//! oracle tests build against.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::tid::{AttNo, Tid};

/// Decides whether a leaf item's row version is visible to whatever
/// snapshot is driving the current scan or probe.
pub trait VisibilityOracle: Send + Sync {
    /// `header` is the caller-supplied row header carried by attribute 1's
    /// `Uncompressed` items; other attributes pass `None` and rely on
    /// attribute 1's decision having already filtered the TID list.
    fn is_visible(&self, tid: Tid, header: Option<&[u8]>) -> bool;
}

/// Describes the attribute (column) a tree instance stores.
pub trait AttributeMeta: Send + Sync {
    fn attno(&self) -> AttNo;

    /// Only attribute 1's leaf items carry a row header.
    fn carries_row_header(&self) -> bool {
        self.attno() == 1
    }
}

/// A `VisibilityOracle` that treats every row version as visible —
/// correct whenever the caller has already filtered TIDs itself, and the
/// default for tests that aren't exercising MVCC semantics.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysVisible;

impl VisibilityOracle for AlwaysVisible {
    fn is_visible(&self, _tid: Tid, _header: Option<&[u8]>) -> bool {
        true
    }
}

static ALWAYS_VISIBLE: Lazy<Arc<AlwaysVisible>> = Lazy::new(|| Arc::new(AlwaysVisible));

/// Shared handle to the always-visible oracle, for callers that just need
/// *a* `VisibilityOracle` without standing up their own snapshot.
pub fn always_visible() -> Arc<AlwaysVisible> {
    ALWAYS_VISIBLE.clone()
}

/// A fixed attribute number, for trees that aren't part of a larger
/// multi-column catalog.
#[derive(Debug, Clone, Copy)]
pub struct FixedAttribute(pub AttNo);

impl AttributeMeta for FixedAttribute {
    fn attno(&self) -> AttNo {
        self.0
    }
}
