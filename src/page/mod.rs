//! Page layout: a fixed-size byte buffer with a line-pointer directory, a
//! growing item region, and a typed opaque trailer.

mod layout;
mod opaque;

pub use layout::{align_up, Page, PAGE_SIZE};
pub use opaque::{PageOpaque, BTREE_PAGE_ID, FOLLOW_RIGHT};
