//! Patricia (compressed prefix) trie.
//!
//! Two representations share one search algorithm:
//!
//! - [`PatriciaTrie`]: heap-owned, supports [`insert`](PatriciaTrie::insert)
//!   and [`save`](PatriciaTrie::save)
//! - [`MappedTrie`]: a saved file read in place through a memory map;
//!   search only, cheap to clone and share between threads
//!
//! [`Trie`] wraps either one when the mode is decided at runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use nativex::{MappedTrie, PatriciaTrie};
//!
//! let trie: PatriciaTrie = ["alpha", "alphabet"].into_iter().collect();
//! trie.save("words.trie")?;
//!
//! let mapped = MappedTrie::open("words.trie")?;
//! assert_eq!(mapped.search("alphanumeric"), 5);
//! assert!(mapped.search_extended("alphabet").terminal);
//! # Ok::<(), nativex::NativexError>(())
//! ```

use crate::error::{NativexError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub mod format;
mod mapped;
mod mutable;

pub use mapped::MappedTrie;
pub use mutable::PatriciaTrie;

/// Outcome of walking a value down the trie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Number of leading bytes of the value that matched
    pub matched: usize,
    /// A stored word ends exactly where matching stopped
    pub terminal: bool,
    /// Outgoing edges at the point where matching stopped
    ///
    /// Stopping inside an edge counts as one (the rest of that edge).
    pub branching: usize,
}

/// Read access shared by both trie representations
pub(crate) trait TrieView {
    fn root(&self) -> usize;
    fn label(&self, node: usize) -> &[u8];
    fn child(&self, node: usize, byte: u8) -> Option<usize>;
    fn is_terminal(&self, node: usize) -> bool;
    fn child_count(&self, node: usize) -> usize;
    fn children(&self, node: usize) -> Vec<usize>;
}

pub(crate) fn walk<T: TrieView + ?Sized>(trie: &T, value: &[u8]) -> SearchResult {
    let mut node = trie.root();
    let mut pos = 0;

    loop {
        let next = value.get(pos).and_then(|&b| trie.child(node, b));
        let Some(child) = next else {
            return SearchResult {
                matched: pos,
                terminal: trie.is_terminal(node),
                branching: trie.child_count(node),
            };
        };

        let label = trie.label(child);
        let common = label
            .iter()
            .zip(&value[pos..])
            .take_while(|(a, b)| a == b)
            .count();
        if common < label.len() || label.is_empty() {
            return SearchResult {
                matched: pos + common,
                terminal: false,
                branching: 1,
            };
        }
        node = child;
        pos += label.len();
    }
}

/// Lengths of every stored word that is a prefix of `value`, shortest first
pub(crate) fn prefix_matches_view<T: TrieView + ?Sized>(trie: &T, value: &[u8]) -> Vec<usize> {
    let mut node = trie.root();
    let mut pos = 0;
    let mut found = Vec::new();
    if trie.is_terminal(node) {
        found.push(0);
    }

    while let Some(child) = value.get(pos).and_then(|&b| trie.child(node, b)) {
        let label = trie.label(child);
        if label.is_empty() || !value[pos..].starts_with(label) {
            break;
        }
        node = child;
        pos += label.len();
        if trie.is_terminal(node) {
            found.push(pos);
        }
    }
    found
}

pub(crate) fn longest_match_view<T: TrieView + ?Sized>(trie: &T, value: &[u8]) -> Option<usize> {
    prefix_matches_view(trie, value).last().copied()
}

pub(crate) fn dump_view<T: TrieView + ?Sized, W: Write>(trie: &T, out: &mut W) -> std::io::Result<()> {
    let root = trie.root();
    writeln!(
        out,
        "(root){}",
        if trie.is_terminal(root) { " *" } else { "" }
    )?;
    let mut stack: Vec<(usize, usize)> = trie
        .children(root)
        .into_iter()
        .rev()
        .map(|c| (c, 1))
        .collect();
    while let Some((node, depth)) = stack.pop() {
        writeln!(
            out,
            "{:indent$}{}{}",
            "",
            trie.label(node).escape_ascii(),
            if trie.is_terminal(node) { " *" } else { "" },
            indent = depth * 2
        )?;
        stack.extend(trie.children(node).into_iter().rev().map(|c| (c, depth + 1)));
    }
    Ok(())
}

/// A trie in either mode
#[derive(Debug, Clone)]
pub enum Trie {
    /// Insertable, heap-owned
    Mutable(PatriciaTrie),
    /// Mapped from a saved file; inserts fail
    ReadOnly(MappedTrie),
}

impl Default for Trie {
    fn default() -> Self {
        Trie::Mutable(PatriciaTrie::new())
    }
}

impl Trie {
    /// Empty mutable trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a saved trie read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        MappedTrie::open(path).map(Trie::ReadOnly)
    }

    /// True for the mapped representation
    pub fn is_read_only(&self) -> bool {
        matches!(self, Trie::ReadOnly(_))
    }

    /// Insert a word
    ///
    /// # Errors
    ///
    /// `ReadOnlyViolation` on a mapped trie.
    pub fn insert(&mut self, word: impl AsRef<[u8]>) -> Result<bool> {
        match self {
            Trie::Mutable(trie) => Ok(trie.insert(word)),
            Trie::ReadOnly(_) => Err(NativexError::ReadOnlyViolation),
        }
    }

    /// Number of matched leading bytes of `value`
    pub fn search(&self, value: impl AsRef<[u8]>) -> usize {
        self.search_extended(value).matched
    }

    /// See [`SearchResult`]
    pub fn search_extended(&self, value: impl AsRef<[u8]>) -> SearchResult {
        match self {
            Trie::Mutable(trie) => trie.search_extended(value),
            Trie::ReadOnly(trie) => trie.search_extended(value),
        }
    }

    /// Length of the longest stored word that is a prefix of `value`
    pub fn longest_match(&self, value: &[u8]) -> Option<usize> {
        match self {
            Trie::Mutable(trie) => trie.longest_match(value),
            Trie::ReadOnly(trie) => trie.longest_match(value),
        }
    }

    /// Lengths of every stored word that is a prefix of `value`, shortest first
    pub fn prefix_matches(&self, value: &[u8]) -> Vec<usize> {
        match self {
            Trie::Mutable(trie) => trie.prefix_matches(value),
            Trie::ReadOnly(trie) => trie.prefix_matches(value),
        }
    }

    /// Number of stored words
    pub fn len(&self) -> usize {
        match self {
            Trie::Mutable(trie) => trie.len(),
            Trie::ReadOnly(trie) => trie.len(),
        }
    }

    /// True if no word is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save to `path`; a mapped trie writes its bytes back out unchanged.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            Trie::Mutable(trie) => trie.save(path),
            Trie::ReadOnly(trie) => trie.save(path),
        }
    }

    /// Write an indented rendering of the node structure
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self {
            Trie::Mutable(trie) => trie.dump(out),
            Trie::ReadOnly(trie) => trie.dump(out),
        }
    }

    /// Print the node structure to stdout
    pub fn print(&self) -> std::io::Result<()> {
        self.dump(&mut std::io::stdout().lock())
    }
}

impl From<PatriciaTrie> for Trie {
    fn from(trie: PatriciaTrie) -> Self {
        Trie::Mutable(trie)
    }
}

impl From<MappedTrie> for Trie {
    fn from(trie: MappedTrie) -> Self {
        Trie::ReadOnly(trie)
    }
}
