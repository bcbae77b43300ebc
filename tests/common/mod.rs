//! Shared setup for the integration tests: log init (matching the
//! crate's own `std::sync::Once`-guarded convention) and a ready-to-use
//! tree builder.

use std::sync::{Arc, Once};

use colbtree::buffer::InMemoryBufferManager;
use colbtree::codec::RunLengthCodec;
use colbtree::meta::InMemoryMetaPageService;
use colbtree::mvcc::{AlwaysVisible, FixedAttribute};
use colbtree::BTree;

static INIT: Once = Once::new();

pub fn init_log() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_default_env().format_timestamp_secs().try_init();
    });
}

/// A brand-new attribute-1 tree over fresh in-memory collaborators, the
/// facade every test in this directory drives its scenario through.
pub fn fresh_tree() -> BTree {
    init_log();
    BTree::new(
        Arc::new(InMemoryBufferManager::new()),
        Arc::new(InMemoryMetaPageService::new()),
        Arc::new(RunLengthCodec::default()),
        Arc::new(AlwaysVisible),
        Arc::new(FixedAttribute(1)),
    )
}
