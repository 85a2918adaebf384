//! Miners compiled into the crate.
//!
//! | symbol | parameter | label |
//! |---|---|---|
//! | `match_glob` | glob pattern | `Glob` |
//! | `match_glob_icase` | glob pattern (ASCII case-insensitive) | `Glob` |
//! | `match_dictionary` | `file:<trie path>` or `word,word,...` | `Dictionary` |

use super::{is_word_byte, Hit, Miner};
use crate::error::{NativexError, Result};
use crate::glob::{GlobPattern, MatchMode};
use crate::patricia::{PatriciaTrie, Trie};

/// Label produced by the glob miners
pub const GLOB_LABEL: &str = "Glob";

/// Label produced by the dictionary miner
pub const DICTIONARY_LABEL: &str = "Dictionary";

type Constructor = fn(&str) -> Result<Box<dyn Miner>>;

const TABLE: &[(&str, Constructor)] = &[
    ("match_glob", glob_case_sensitive),
    ("match_glob_icase", glob_case_insensitive),
    ("match_dictionary", dictionary),
];

fn glob_case_sensitive(param: &str) -> Result<Box<dyn Miner>> {
    Ok(Box::new(GlobMiner::new(
        "match_glob",
        param,
        MatchMode::CaseSensitive,
    )?))
}

fn glob_case_insensitive(param: &str) -> Result<Box<dyn Miner>> {
    Ok(Box::new(GlobMiner::new(
        "match_glob_icase",
        param,
        MatchMode::CaseInsensitive,
    )?))
}

fn dictionary(param: &str) -> Result<Box<dyn Miner>> {
    Ok(Box::new(DictionaryMiner::from_param(param)?))
}

/// Symbols available in the built-in table
pub fn symbols() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(name, _)| *name)
}

/// Instantiate a built-in miner.
///
/// Errors are returned as-is (`InvalidPattern` for a bad parameter); the
/// registry wraps them into `MinerLoadFailure`.
pub fn create(symbol: &str, param: &str) -> Result<Box<dyn Miner>> {
    let (_, constructor) = TABLE
        .iter()
        .find(|(name, _)| *name == symbol)
        .ok_or_else(|| {
            NativexError::InvalidPattern(format!("no built-in miner named {:?}", symbol))
        })?;
    constructor(param)
}

/// Anchored glob matcher over raw bytes
#[derive(Debug)]
pub struct GlobMiner {
    name: &'static str,
    pattern: GlobPattern,
    labels: Vec<String>,
}

impl GlobMiner {
    /// Compile `pattern`
    pub fn new(name: &'static str, pattern: &str, mode: MatchMode) -> Result<Self> {
        Ok(Self {
            name,
            pattern: GlobPattern::new(pattern, mode)?,
            labels: vec![GLOB_LABEL.to_string()],
        })
    }

    /// The compiled pattern
    pub fn pattern(&self) -> &GlobPattern {
        &self.pattern
    }
}

impl Miner for GlobMiner {
    fn name(&self) -> &str {
        self.name
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn mine_at(&self, data: &[u8], pos: usize) -> Option<Hit> {
        self.pattern
            .match_len(data, pos)
            .map(|len| Hit::new(len, GLOB_LABEL))
    }

    fn next_candidate(&self, data: &[u8], from: usize, until: usize) -> Option<usize> {
        self.pattern.next_candidate(data, from, until)
    }
}

/// Whole-word lookup in a Patricia trie
#[derive(Debug)]
pub struct DictionaryMiner {
    trie: Trie,
    labels: Vec<String>,
}

impl DictionaryMiner {
    /// Wrap an existing trie
    pub fn new(trie: impl Into<Trie>) -> Self {
        Self {
            trie: trie.into(),
            labels: vec![DICTIONARY_LABEL.to_string()],
        }
    }

    /// Build from a parameter string: `file:<path>` maps a saved trie,
    /// anything else is a comma-separated word list.
    pub fn from_param(param: &str) -> Result<Self> {
        if let Some(path) = param.strip_prefix("file:") {
            return Ok(Self::new(Trie::open(path)?));
        }
        let trie: PatriciaTrie = param
            .split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .collect();
        if trie.is_empty() {
            return Err(NativexError::InvalidPattern(
                "dictionary needs at least one word".to_string(),
            ));
        }
        Ok(Self::new(trie))
    }

    /// Number of dictionary words
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// True if the dictionary has no words
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    fn starts_word(data: &[u8], pos: usize) -> bool {
        pos == 0 || !is_word_byte(data[pos - 1])
    }
}

impl Miner for DictionaryMiner {
    fn name(&self) -> &str {
        "match_dictionary"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn mine_at(&self, data: &[u8], pos: usize) -> Option<Hit> {
        if pos >= data.len() || !Self::starts_word(data, pos) {
            return None;
        }
        let rest = &data[pos..];
        self.trie
            .prefix_matches(rest)
            .into_iter()
            .rev()
            .find(|&len| len > 0 && rest.get(len).map_or(true, |&b| !is_word_byte(b)))
            .map(|len| Hit::new(len, DICTIONARY_LABEL))
    }

    fn next_candidate(&self, data: &[u8], from: usize, until: usize) -> Option<usize> {
        (from..until.min(data.len())).find(|&pos| Self::starts_word(data, pos))
    }
}
