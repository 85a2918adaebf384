//! Heap-owned, insertable Patricia trie

use super::format;
use super::{dump_view, longest_match_view, prefix_matches_view, walk, SearchResult, TrieView};
use crate::error::{NativexError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    label: Vec<u8>,
    /// Sorted by the first byte of each child's label
    children: Vec<NodeId>,
    terminal: bool,
}

/// Mutable Patricia trie backed by a node arena.
///
/// ```rust
/// use nativex::PatriciaTrie;
///
/// let mut trie = PatriciaTrie::new();
/// trie.insert("tea");
/// trie.insert("ten");
/// assert_eq!(trie.search("tea"), 3);
/// assert_eq!(trie.search("tex"), 2);
/// assert!(trie.search_extended("te").branching == 2);
/// ```
#[derive(Debug, Clone)]
pub struct PatriciaTrie {
    nodes: Vec<Node>,
    words: usize,
}

impl Default for PatriciaTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PatriciaTrie {
    /// Empty trie (root only)
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            words: 0,
        }
    }

    /// Insert a word; returns `false` if it was already present.
    pub fn insert(&mut self, word: impl AsRef<[u8]>) -> bool {
        let mut rest = word.as_ref();
        let mut node = ROOT;

        loop {
            let Some(&first) = rest.first() else {
                let target = &mut self.nodes[node];
                if target.terminal {
                    return false;
                }
                target.terminal = true;
                self.words += 1;
                return true;
            };

            let Some((_, child)) = self.find_child(node, first) else {
                let leaf = self.push_node(Node {
                    label: rest.to_vec(),
                    children: Vec::new(),
                    terminal: true,
                });
                self.attach(node, leaf);
                self.words += 1;
                return true;
            };

            let common = common_prefix(&self.nodes[child].label, rest);
            if common < self.nodes[child].label.len() {
                self.split(child, common);
            }
            node = child;
            rest = &rest[common..];
        }
    }

    /// Number of matched leading bytes of `value`
    pub fn search(&self, value: impl AsRef<[u8]>) -> usize {
        self.search_extended(value).matched
    }

    /// Matched length, terminal flag and fan-out of the last position reached
    pub fn search_extended(&self, value: impl AsRef<[u8]>) -> SearchResult {
        walk(self, value.as_ref())
    }

    /// True if `value` was inserted
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

    /// Number of stored words
    pub fn len(&self) -> usize {
        self.words
    }

    /// True if no word is stored
    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    /// Number of nodes including the root
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Serialize into the mappable file layout
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        format::to_bytes(self)
    }

    /// Write the trie to `path`; the file can be opened with [`MappedTrie::open`](super::MappedTrie::open).
    ///
    /// # Errors
    ///
    /// `SerializationFailure` if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let write = || -> std::io::Result<()> {
            let mut file = File::create(path)?;
            file.write_all(&bytes)?;
            file.sync_all()
        };
        write().map_err(|e| {
            NativexError::SerializationFailure(format!("{}: {}", path.display(), e))
        })?;
        tracing::info!(
            path = %path.display(),
            words = self.words,
            nodes = self.nodes.len(),
            bytes = bytes.len(),
            "saved trie"
        );
        Ok(())
    }

    /// Write an indented rendering of the node structure
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        dump_view(self, out)
    }

    /// Print the node structure to stdout
    pub fn print(&self) -> std::io::Result<()> {
        self.dump(&mut std::io::stdout().lock())
    }

    pub(crate) fn root_id(&self) -> usize {
        ROOT
    }

    pub(crate) fn label_of(&self, id: usize) -> &[u8] {
        &self.nodes[id].label
    }

    pub(crate) fn children_of(&self, id: usize) -> &[usize] {
        &self.nodes[id].children
    }

    pub(crate) fn is_terminal_id(&self, id: usize) -> bool {
        self.nodes[id].terminal
    }

    fn find_child(&self, node: NodeId, byte: u8) -> Option<(usize, NodeId)> {
        let children = &self.nodes[node].children;
        children
            .binary_search_by_key(&byte, |&c| self.nodes[c].label[0])
            .ok()
            .map(|slot| (slot, children[slot]))
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let byte = self.nodes[child].label[0];
        let slot = match self.nodes[parent]
            .children
            .binary_search_by_key(&byte, |&c| self.nodes[c].label[0])
        {
            Ok(slot) | Err(slot) => slot,
        };
        self.nodes[parent].children.insert(slot, child);
    }

    /// Cut `id`'s edge after `at` bytes; the tail moves to a new child.
    ///
    /// `id` keeps its slot in the parent since its first byte is unchanged.
    fn split(&mut self, id: NodeId, at: usize) {
        let node = &mut self.nodes[id];
        let tail = Node {
            label: node.label.split_off(at),
            children: std::mem::take(&mut node.children),
            terminal: std::mem::replace(&mut node.terminal, false),
        };
        let tail_id = self.push_node(tail);
        self.nodes[id].children.push(tail_id);
    }
}

impl<W: AsRef<[u8]>> Extend<W> for PatriciaTrie {
    fn extend<I: IntoIterator<Item = W>>(&mut self, iter: I) {
        for word in iter {
            self.insert(word);
        }
    }
}

impl<W: AsRef<[u8]>> FromIterator<W> for PatriciaTrie {
    fn from_iter<I: IntoIterator<Item = W>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.extend(iter);
        trie
    }
}

impl TrieView for PatriciaTrie {
    fn root(&self) -> usize {
        ROOT
    }

    fn label(&self, node: usize) -> &[u8] {
        &self.nodes[node].label
    }

    fn child(&self, node: usize, byte: u8) -> Option<usize> {
        self.find_child(node, byte).map(|(_, id)| id)
    }

    fn is_terminal(&self, node: usize) -> bool {
        self.nodes[node].terminal
    }

    fn child_count(&self, node: usize) -> usize {
        self.nodes[node].children.len()
    }

    fn children(&self, node: usize) -> Vec<usize> {
        self.nodes[node].children.clone()
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
