//! Read-only trie served straight from a saved file

use super::format::{self, NodeRecord, TrieHeader, HEADER_SIZE, NODE_SIZE};
use super::{
    dump_view, longest_match_view, prefix_matches_view, walk, PatriciaTrie, SearchResult, TrieView,
};
use crate::error::{NativexError, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use zerocopy::FromBytes;

enum Region {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Region {
    fn as_slice(&self) -> &[u8] {
        match self {
            Region::Mapped(mmap) => &mmap[..],
            Region::Owned(bytes) => bytes,
        }
    }
}

/// A saved trie opened without deserialization.
///
/// Node records are decoded on access from the mapped bytes. Clones share
/// the same mapping; the last clone dropped unmaps the file.
#[derive(Clone)]
pub struct MappedTrie {
    region: Arc<Region>,
    header: TrieHeader,
}

impl MappedTrie {
    /// Map a saved trie.
    ///
    /// Only the header is checked (magic, version, byte order, section
    /// bounds); node accesses are bounds-checked individually.
    ///
    /// # Errors
    ///
    /// `LoadFailure` if the file cannot be opened or mapped, or is not a
    /// valid trie file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fail = |msg: String| NativexError::LoadFailure(format!("{}: {}", path.display(), msg));

        let file = File::open(path).map_err(|e| fail(format!("Failed to open file: {}", e)))?;
        let len = file
            .metadata()
            .map_err(|e| fail(format!("Failed to stat file: {}", e)))?
            .len();
        if len < HEADER_SIZE as u64 {
            return Err(fail(format!("File too small ({} bytes)", len)));
        }

        // SAFETY: read-only mapping kept alive by the Arc for as long as any
        // clone exists. Another process truncating the file is not guarded.
        let mmap =
            unsafe { Mmap::map(&file) }.map_err(|e| fail(format!("Failed to mmap file: {}", e)))?;

        let trie = Self::from_region(Region::Mapped(mmap)).map_err(|e| match e {
            NativexError::LoadFailure(msg) => fail(msg),
            other => other,
        })?;
        tracing::info!(
            path = %path.display(),
            words = trie.len(),
            nodes = trie.node_count(),
            "mapped trie"
        );
        Ok(trie)
    }

    /// [`open`](Self::open) plus a full checksum pass over the body
    pub fn open_verified<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let trie = Self::open(path)?;
        if !trie.checksum_ok() {
            return Err(NativexError::LoadFailure(format!(
                "{}: checksum mismatch",
                path.display()
            )));
        }
        Ok(trie)
    }

    /// Use an in-memory copy of a saved trie
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_region(Region::Owned(bytes))
    }

    fn from_region(region: Region) -> Result<Self> {
        let bytes = region.as_slice();
        let (header, _) = TrieHeader::read_from_prefix(bytes)
            .map_err(|_| NativexError::LoadFailure("Buffer too small for header".to_string()))?;
        header
            .validate(bytes.len())
            .map_err(|msg| NativexError::LoadFailure(msg.to_string()))?;
        Ok(Self {
            region: Arc::new(region),
            header,
        })
    }

    /// True if the body matches the checksum stored in the header
    pub fn checksum_ok(&self) -> bool {
        format::body_checksum(self.as_bytes()) == self.header.checksum
    }

    /// Raw file bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.region.as_slice()
    }

    /// True when backed by a file mapping rather than an owned buffer
    pub fn is_mapped(&self) -> bool {
        matches!(*self.region, Region::Mapped(_))
    }

    /// Number of stored words
    pub fn len(&self) -> usize {
        self.header.word_count as usize
    }

    /// True if no word is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes including the root
    pub fn node_count(&self) -> usize {
        self.header.node_count as usize
    }

    /// Number of matched leading bytes of `value`
    pub fn search(&self, value: impl AsRef<[u8]>) -> usize {
        self.search_extended(value).matched
    }

    /// See [`SearchResult`]
    pub fn search_extended(&self, value: impl AsRef<[u8]>) -> SearchResult {
        walk(self, value.as_ref())
    }

    /// True if `value` is stored
    pub fn contains(&self, value: impl AsRef<[u8]>) -> bool {
        let value = value.as_ref();
        let result = self.search_extended(value);
        result.matched == value.len() && result.terminal
    }

    /// Length of the longest stored word that is a prefix of `value`
    pub fn longest_match(&self, value: &[u8]) -> Option<usize> {
        longest_match_view(self, value)
    }

    /// Lengths of every stored word that is a prefix of `value`, shortest first
    pub fn prefix_matches(&self, value: &[u8]) -> Vec<usize> {
        prefix_matches_view(self, value)
    }

    /// Copy every word into a new mutable trie
    pub fn to_mutable(&self) -> PatriciaTrie {
        let mut trie = PatriciaTrie::new();
        let mut stack = vec![(self.root(), Vec::new())];
        while let Some((node, mut prefix)) = stack.pop() {
            prefix.extend_from_slice(self.label(node));
            if self.is_terminal(node) {
                trie.insert(&prefix);
            }
            for child in self.children(node) {
                stack.push((child, prefix.clone()));
            }
        }
        trie
    }

    /// Write the underlying bytes to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write = || -> std::io::Result<()> {
            let mut file = File::create(path)?;
            file.write_all(self.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|e| NativexError::SerializationFailure(format!("{}: {}", path.display(), e)))
    }

    /// Write an indented rendering of the node structure
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        dump_view(self, out)
    }

    /// Print the node structure to stdout
    pub fn print(&self) -> std::io::Result<()> {
        self.dump(&mut std::io::stdout().lock())
    }

    fn record(&self, index: usize) -> Option<NodeRecord> {
        if index >= self.node_count() {
            return None;
        }
        let at = HEADER_SIZE + index * NODE_SIZE;
        let bytes = self.as_bytes().get(at..at + NODE_SIZE)?;
        NodeRecord::read_from_prefix(bytes).ok().map(|(record, _)| record)
    }

    /// Children of `node` as a range of record indices.
    ///
    /// Breadth-first order puts children after their parent; anything else
    /// is treated as corruption and yields no children.
    fn child_range(&self, node: usize) -> Option<Range<usize>> {
        let record = self.record(node)?;
        if record.child_count == 0 {
            return None;
        }
        let first = record.first_child as usize;
        let end = first + record.child_count as usize;
        (first > node && end <= self.node_count()).then_some(first..end)
    }
}

impl TrieView for MappedTrie {
    fn root(&self) -> usize {
        0
    }

    fn label(&self, node: usize) -> &[u8] {
        let Some(record) = self.record(node) else {
            return &[];
        };
        let start = self.header.labels_offset as usize + record.label_offset as usize;
        let end = start + record.label_len as usize;
        if end > self.header.total_size as usize {
            return &[];
        }
        self.as_bytes().get(start..end).unwrap_or(&[])
    }

    fn child(&self, node: usize, byte: u8) -> Option<usize> {
        let range = self.child_range(node)?;
        let (mut lo, mut hi) = (range.start, range.end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let first_byte = self.record(mid)?.first_byte;
            match first_byte.cmp(&byte) {
                std::cmp::Ordering::Equal => return Some(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    fn is_terminal(&self, node: usize) -> bool {
        self.record(node).is_some_and(|r| r.is_terminal())
    }

    fn child_count(&self, node: usize) -> usize {
        self.child_range(node).map_or(0, |r| r.len())
    }

    fn children(&self, node: usize) -> Vec<usize> {
        self.child_range(node).map_or_else(Vec::new, |r| r.collect())
    }
}

impl fmt::Debug for MappedTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedTrie")
            .field("mapped", &self.is_mapped())
            .field("words", &self.len())
            .field("nodes", &self.node_count())
            .field("bytes", &self.as_bytes().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> PatriciaTrie {
        ["tea", "ten", "team", "inn", "in"].into_iter().collect()
    }

    #[test]
    fn test_from_bytes_matches_mutable() {
        let built = sample();
        let mapped = MappedTrie::from_bytes(built.to_bytes().unwrap()).unwrap();
        assert!(!mapped.is_mapped());
        assert_eq!(mapped.len(), 5);
        assert_eq!(mapped.node_count(), built.node_count());
        for probe in ["tea", "te", "team", "teams", "in", "i", "x", ""] {
            assert_eq!(
                mapped.search_extended(probe),
                built.search_extended(probe),
                "probe {:?}",
                probe
            );
        }
    }

    #[test]
    fn test_open_file() {
        let file = NamedTempFile::new().unwrap();
        sample().save(file.path()).unwrap();

        let mapped = MappedTrie::open_verified(file.path()).unwrap();
        assert!(mapped.is_mapped());
        assert!(mapped.contains("inn"));
        assert!(!mapped.contains("i"));
        assert_eq!(mapped.longest_match(b"teamwork"), Some(4));

        let shared = mapped.clone();
        let handle = std::thread::spawn(move || shared.search("tenant"));
        assert_eq!(handle.join().unwrap(), 3);
    }

    #[test]
    fn test_to_mutable_copies_words() {
        let mapped = MappedTrie::from_bytes(sample().to_bytes().unwrap()).unwrap();
        let mut copy = mapped.to_mutable();
        assert_eq!(copy.len(), 5);
        assert!(copy.insert("tee"));
        assert!(!mapped.contains("tee"));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut bytes = sample().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mapped = MappedTrie::from_bytes(bytes).unwrap();
        assert!(!mapped.checksum_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            MappedTrie::from_bytes(b"not a trie".to_vec()),
            Err(NativexError::LoadFailure(_))
        ));
        let mut bytes = sample().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            MappedTrie::from_bytes(bytes),
            Err(NativexError::LoadFailure(_))
        ));
    }

    #[test]
    fn test_corrupt_child_index_is_contained() {
        let mut bytes = sample().to_bytes().unwrap();
        // Point the root's children at itself
        let at = HEADER_SIZE + 8;
        bytes[at..at + 4].copy_from_slice(&0u32.to_le_bytes());
        let mapped = MappedTrie::from_bytes(bytes).unwrap();
        assert_eq!(mapped.search("tea"), 0);
        let mut out = Vec::new();
        mapped.dump(&mut out).unwrap();
    }

    #[test]
    fn test_dump_matches_mutable() {
        let built = sample();
        let mapped = MappedTrie::from_bytes(built.to_bytes().unwrap()).unwrap();
        let (mut a, mut b) = (Vec::new(), Vec::new());
        built.dump(&mut a).unwrap();
        mapped.dump(&mut b).unwrap();
        assert_eq!(a, b);
    }
}
