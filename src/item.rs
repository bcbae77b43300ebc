//! Leaf item codec: the on-page representation of one logical row (or, for
//! a compressed run, several).

use crate::tid::Tid;

/// Bit set on a leaf item whose payload is a compressed run rather than a
/// single row's datum bytes.
const COMPRESSED: u8 = 0x01;

/// A leaf item, tagged by whether it holds one row or a compressed run of
/// them. The on-disk flag bit is the discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafItem {
    Uncompressed {
        tid: Tid,
        /// Present only for attribute 1: the caller-supplied row header,
        /// opaque to this crate, consumed by the external MVCC oracle.
        header: Option<Vec<u8>>,
        datum: Vec<u8>,
    },
    CompressedRun {
        first_tid: Tid,
        last_tid: Tid,
        /// Opaque byte block for the external codec's decoder.
        blob: Vec<u8>,
    },
}

impl LeafItem {
    /// The item's own TID, or a compressed run's `first_tid`.
    pub fn tid(&self) -> Tid {
        match self {
            LeafItem::Uncompressed { tid, .. } => *tid,
            LeafItem::CompressedRun { first_tid, .. } => *first_tid,
        }
    }

    /// Equal to `tid()` for a single row; the run's upper bound otherwise.
    pub fn last_tid(&self) -> Tid {
        match self {
            LeafItem::Uncompressed { tid, .. } => *tid,
            LeafItem::CompressedRun { last_tid, .. } => *last_tid,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, LeafItem::CompressedRun { .. })
    }

    /// Encoded size in bytes, for free-space accounting before the item is
    /// actually added to a page.
    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            LeafItem::Uncompressed { tid, header, datum } => {
                let header_bytes = header.as_deref().unwrap_or(&[]);
                let mut out = Vec::with_capacity(11 + header_bytes.len() + datum.len());
                out.push(0u8); // flags, COMPRESSED unset
                out.extend_from_slice(&tid.block.to_le_bytes());
                out.extend_from_slice(&tid.offset.to_le_bytes());
                out.extend_from_slice(&(header_bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(header_bytes);
                out.extend_from_slice(datum);
                out
            }
            LeafItem::CompressedRun { first_tid, last_tid, blob } => {
                let mut out = Vec::with_capacity(13 + blob.len());
                out.push(COMPRESSED);
                out.extend_from_slice(&first_tid.block.to_le_bytes());
                out.extend_from_slice(&first_tid.offset.to_le_bytes());
                out.extend_from_slice(&last_tid.block.to_le_bytes());
                out.extend_from_slice(&last_tid.offset.to_le_bytes());
                out.extend_from_slice(blob);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let flags = bytes[0];
        if flags & COMPRESSED != 0 {
            let first_block = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
            let first_offset = u16::from_le_bytes(bytes[5..7].try_into().unwrap());
            let last_block = u32::from_le_bytes(bytes[7..11].try_into().unwrap());
            let last_offset = u16::from_le_bytes(bytes[11..13].try_into().unwrap());
            LeafItem::CompressedRun {
                first_tid: Tid::new(first_block, first_offset),
                last_tid: Tid::new(last_block, last_offset),
                blob: bytes[13..].to_vec(),
            }
        } else {
            let block = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
            let offset = u16::from_le_bytes(bytes[5..7].try_into().unwrap());
            let header_len = u16::from_le_bytes(bytes[7..9].try_into().unwrap()) as usize;
            let header = if header_len > 0 {
                Some(bytes[9..9 + header_len].to_vec())
            } else {
                None
            };
            let datum = bytes[9 + header_len..].to_vec();
            LeafItem::Uncompressed { tid: Tid::new(block, offset), header, datum }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_roundtrips_without_header() {
        let item = LeafItem::Uncompressed { tid: Tid::new(1, 2), header: None, datum: vec![9, 8, 7] };
        let decoded = LeafItem::decode(&item.encode());
        assert_eq!(item, decoded);
    }

    #[test]
    fn uncompressed_roundtrips_with_row_header() {
        let item = LeafItem::Uncompressed {
            tid: Tid::new(5, 1),
            header: Some(vec![1, 1, 1, 1]),
            datum: vec![42],
        };
        let decoded = LeafItem::decode(&item.encode());
        assert_eq!(item, decoded);
    }

    #[test]
    fn compressed_run_roundtrips() {
        let item = LeafItem::CompressedRun {
            first_tid: Tid::new(1, 1),
            last_tid: Tid::new(1, 9),
            blob: vec![0xAB; 12],
        };
        let decoded = LeafItem::decode(&item.encode());
        assert_eq!(item, decoded);
        assert!(decoded.is_compressed());
    }
}
