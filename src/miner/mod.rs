//! Pluggable matchers ("miners") and their registry.
//!
//! A miner recognizes one kind of entity. The engine asks it, position by
//! position, whether a match starts there; [`Miner::next_candidate`] lets a
//! miner skip stretches of input where it cannot match.
//!
//! Miners come from two places:
//! - shared modules loaded at runtime through the C ABI in [`dynamic`]
//! - the static table in [`builtin`] (`match_glob`, `match_glob_icase`,
//!   `match_dictionary`)
//!
//! Both are held by a [`MinerRegistry`].

use serde::{Deserialize, Serialize};

pub mod builtin;
pub mod dynamic;
pub mod registry;

pub use registry::{MinerEntry, MinerRegistry};

/// Path recorded for miners resolved from the built-in table
pub const BUILTIN_PATH: &str = "<builtin>";

/// An anchored match reported by a miner
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Length in bytes (never zero)
    pub len: usize,
    /// Entity label
    pub label: String,
    /// Confidence in `0.0..=1.0`
    pub prob: f32,
    /// Extra key/value metadata
    pub fields: Vec<(String, String)>,
}

impl Hit {
    /// A hit with full confidence and no extra fields
    pub fn new(len: usize, label: impl Into<String>) -> Self {
        Self {
            len,
            label: label.into(),
            prob: 1.0,
            fields: Vec::new(),
        }
    }

    /// Attach a metadata field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// A loaded matcher.
///
/// Implementations must be callable from several threads at once; the
/// engine shares one instance across its worker pool.
pub trait Miner: Send + Sync {
    /// Name of the entry symbol the miner was created from
    fn name(&self) -> &str;

    /// Labels this miner can produce
    fn labels(&self) -> &[String];

    /// Match starting exactly at `pos`, if any
    fn mine_at(&self, data: &[u8], pos: usize) -> Option<Hit>;

    /// First position in `from..until` worth calling [`mine_at`](Self::mine_at) on.
    fn next_candidate(&self, data: &[u8], from: usize, until: usize) -> Option<usize> {
        let _ = data;
        (from < until).then_some(from)
    }
}

/// Metadata describing where a label comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerMeta {
    /// Entry symbol of the producing miner
    pub miner: String,
    /// Module path (or `<builtin>`)
    pub path: String,
    /// Label
    pub label: String,
}

/// Whether a byte counts as part of a word for boundary checks
pub(crate) fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b >= 0x80
}
