//! On-disk layout of a saved Patricia trie.
//!
//! # Layout
//!
//! ```text
//! [Header: TrieHeader (48 bytes)]
//! [Node table: NodeRecord array (16 bytes each), breadth-first, node 0 = root]
//! [Labels: concatenated edge labels]
//! ```
//!
//! Breadth-first numbering keeps every node's children contiguous and sorted
//! by first byte, so a child lookup is a binary search over a slice of the
//! node table. Integers are little-endian; offsets are `u32` (4GB limit).

use super::mutable::PatriciaTrie;
use crate::error::{NativexError, Result};
use std::collections::VecDeque;
use std::mem;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Magic bytes identifying a saved trie
pub const MAGIC: &[u8; 8] = b"NXPATRIE";

/// Current format version
pub const VERSION: u32 = 1;

/// Written as a native `u32`; reads back differently on a foreign-endian host
pub const BYTE_ORDER_TAG: u32 = 0x0102_0304;

/// Size of [`TrieHeader`] in bytes
pub const HEADER_SIZE: usize = mem::size_of::<TrieHeader>();

/// Size of [`NodeRecord`] in bytes
pub const NODE_SIZE: usize = mem::size_of::<NodeRecord>();

/// Node flag: a stored word ends here
pub const FLAG_TERMINAL: u8 = 0x01;

/// File header (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TrieHeader {
    /// Magic bytes: "NXPATRIE"
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// [`BYTE_ORDER_TAG`]
    pub byte_order: u32,
    /// Number of node records
    pub node_count: u32,
    /// Number of stored words
    pub word_count: u32,
    /// Offset of the node table (always `HEADER_SIZE`)
    pub nodes_offset: u32,
    /// Offset of the labels blob
    pub labels_offset: u32,
    /// Size of the labels blob
    pub labels_size: u32,
    /// Size of the whole file
    pub total_size: u32,
    /// XXH64 of every byte after the header
    pub checksum: u64,
}

/// Node record (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NodeRecord {
    /// Label start, relative to the labels blob
    pub label_offset: u32,
    /// Label length in bytes
    pub label_len: u32,
    /// Index of the first child (meaningless when `child_count == 0`)
    pub first_child: u32,
    /// Number of children
    pub child_count: u16,
    /// First byte of the label (0 for the root)
    pub first_byte: u8,
    /// Bit 0: terminal
    pub flags: u8,
}

const _: () = assert!(HEADER_SIZE == 48);
const _: () = assert!(NODE_SIZE == 16);

impl NodeRecord {
    /// True if a stored word ends at this node
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.flags & FLAG_TERMINAL != 0
    }
}

impl TrieHeader {
    /// Structural checks against the buffer the header was read from.
    ///
    /// Everything here is O(1); node contents are bounds-checked on access.
    pub fn validate(&self, buffer_len: usize) -> std::result::Result<(), &'static str> {
        if &self.magic != MAGIC {
            return Err("Invalid magic bytes");
        }
        if self.version != VERSION {
            return Err("Unsupported version");
        }
        if self.byte_order != BYTE_ORDER_TAG {
            return Err("Byte order mismatch");
        }
        if self.node_count == 0 {
            return Err("Missing root node");
        }
        if self.nodes_offset as usize != HEADER_SIZE {
            return Err("Node table offset out of place");
        }
        let nodes_end = (self.nodes_offset as u64) + (self.node_count as u64) * NODE_SIZE as u64;
        if nodes_end != self.labels_offset as u64 {
            return Err("Labels offset does not follow node table");
        }
        let labels_end = self.labels_offset as u64 + self.labels_size as u64;
        if labels_end != self.total_size as u64 {
            return Err("Total size does not match sections");
        }
        if self.total_size as usize != buffer_len {
            return Err("Total size does not match buffer length");
        }
        Ok(())
    }
}

/// Checksum over the body (everything after the header)
pub fn body_checksum(buffer: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(buffer.get(HEADER_SIZE..).unwrap_or(&[]), 0)
}

/// Serialize a mutable trie into the on-disk layout
///
/// # Errors
///
/// `SerializationFailure` if the trie exceeds the format's 32-bit limits.
pub fn to_bytes(trie: &PatriciaTrie) -> Result<Vec<u8>> {
    let too_large = |what: &str| {
        NativexError::SerializationFailure(format!("{} exceeds the 4GB format limit", what))
    };

    // Breadth-first renumbering: arena id -> file index
    let mut order = Vec::with_capacity(trie.node_count());
    let mut queue = VecDeque::from([trie.root_id()]);
    while let Some(id) = queue.pop_front() {
        order.push(id);
        queue.extend(trie.children_of(id).iter().copied());
    }

    let mut records = Vec::with_capacity(order.len());
    let mut labels = Vec::new();
    // Children of the node at `order[i]` start right after all nodes queued
    // before them; track the running index.
    let mut next_child: usize = 1;
    for &id in &order {
        let label = trie.label_of(id);
        let children = trie.children_of(id);
        let record = NodeRecord {
            label_offset: u32::try_from(labels.len()).map_err(|_| too_large("labels"))?,
            label_len: u32::try_from(label.len()).map_err(|_| too_large("label"))?,
            first_child: if children.is_empty() {
                0
            } else {
                u32::try_from(next_child).map_err(|_| too_large("node table"))?
            },
            child_count: u16::try_from(children.len())
                .map_err(|_| NativexError::SerializationFailure("fan-out above 256".into()))?,
            first_byte: label.first().copied().unwrap_or(0),
            flags: if trie.is_terminal_id(id) { FLAG_TERMINAL } else { 0 },
        };
        labels.extend_from_slice(label);
        next_child += children.len();
        records.push(record);
    }

    let node_count = u32::try_from(records.len()).map_err(|_| too_large("node table"))?;
    let labels_offset = HEADER_SIZE + records.len() * NODE_SIZE;
    let total_size = labels_offset + labels.len();
    let total_u32 = u32::try_from(total_size).map_err(|_| too_large("trie"))?;

    let mut buffer = Vec::with_capacity(total_size);
    buffer.resize(HEADER_SIZE, 0);
    for record in &records {
        buffer.extend_from_slice(record.as_bytes());
    }
    buffer.extend_from_slice(&labels);

    let header = TrieHeader {
        magic: *MAGIC,
        version: VERSION,
        byte_order: BYTE_ORDER_TAG,
        node_count,
        word_count: u32::try_from(trie.len()).map_err(|_| too_large("word count"))?,
        nodes_offset: HEADER_SIZE as u32,
        labels_offset: labels_offset as u32,
        labels_size: labels.len() as u32,
        total_size: total_u32,
        checksum: body_checksum(&buffer),
    };
    buffer[..HEADER_SIZE].copy_from_slice(header.as_bytes());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(HEADER_SIZE, 48);
        assert_eq!(NODE_SIZE, 16);
    }

    #[test]
    fn test_empty_trie_layout() {
        let trie = PatriciaTrie::new();
        let bytes = to_bytes(&trie).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + NODE_SIZE);

        let (header, _) = TrieHeader::read_from_prefix(&bytes).unwrap();
        assert_eq!(header.node_count, 1);
        assert_eq!(header.word_count, 0);
        assert!(header.validate(bytes.len()).is_ok());
        assert_eq!(header.checksum, body_checksum(&bytes));
    }

    #[test]
    fn test_children_are_contiguous_and_sorted() {
        let mut trie = PatriciaTrie::new();
        for word in ["tea", "ten", "apple", "zoo"] {
            trie.insert(word);
        }
        let bytes = to_bytes(&trie).unwrap();
        let (header, _) = TrieHeader::read_from_prefix(&bytes).unwrap();

        let record = |i: usize| {
            let at = HEADER_SIZE + i * NODE_SIZE;
            NodeRecord::read_from_prefix(&bytes[at..]).unwrap().0
        };
        let root = record(0);
        assert_eq!(root.first_child, 1);
        assert_eq!(root.child_count, 3);
        let firsts: Vec<u8> = (1..4).map(|i| record(i).first_byte).collect();
        assert_eq!(firsts, b"atz".to_vec());
        assert_eq!(header.word_count, 4);
    }

    #[test]
    fn test_validate_rejects_bad_headers() {
        let bytes = to_bytes(&PatriciaTrie::new()).unwrap();
        let (header, _) = TrieHeader::read_from_prefix(&bytes).unwrap();

        let mut bad = header;
        bad.magic = *b"PARAGLOB";
        assert_eq!(bad.validate(bytes.len()), Err("Invalid magic bytes"));

        let mut bad = header;
        bad.version = 7;
        assert_eq!(bad.validate(bytes.len()), Err("Unsupported version"));

        let mut bad = header;
        bad.byte_order = BYTE_ORDER_TAG.swap_bytes();
        assert_eq!(bad.validate(bytes.len()), Err("Byte order mismatch"));

        assert!(header.validate(bytes.len() + 1).is_err());
    }
}
