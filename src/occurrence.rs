//! Match records produced by the extraction engine

use serde::Serialize;
use std::collections::BTreeMap;

/// A single occurrence found in a stream
///
/// Byte offsets (`pos`, `len`) address the raw stream; `upos`/`ulen` count
/// UTF-8 scalar values for callers working in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    /// Label of the entity kind (e.g. "Glob", "Dictionary")
    pub label: String,
    /// Byte offset of the first matched byte
    pub pos: usize,
    /// Length in bytes
    pub len: usize,
    /// Character offset of the first matched byte
    pub upos: usize,
    /// Length in characters
    pub ulen: usize,
    /// Confidence reported by the miner
    pub prob: f32,
    /// Matched bytes, lossily decoded as UTF-8
    pub value: String,
    /// Name of the miner that produced the match
    pub miner: String,
    /// Miner-specific key/value metadata
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Occurrence {
    /// Exclusive end offset in bytes
    pub fn end(&self) -> usize {
        self.pos + self.len
    }

    /// Byte span as a `(start, end)` pair
    pub fn span(&self) -> (usize, usize) {
        (self.pos, self.end())
    }
}

/// Incremental byte → character offset conversion
///
/// Occurrences are produced in non-decreasing start order, so the counter
/// only ever walks forward; a request behind the cursor restarts from 0.
#[derive(Debug, Default, Clone)]
pub(crate) struct CharCounter {
    byte_pos: usize,
    char_pos: usize,
}

impl CharCounter {
    /// Character offset of `byte_pos` within `data`
    pub(crate) fn char_offset(&mut self, data: &[u8], byte_pos: usize) -> usize {
        let byte_pos = byte_pos.min(data.len());
        if byte_pos < self.byte_pos {
            *self = Self::default();
        }
        self.char_pos += count_chars(&data[self.byte_pos..byte_pos]);
        self.byte_pos = byte_pos;
        self.char_pos
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Number of UTF-8 scalar starts in `bytes` (invalid bytes count as one each)
pub(crate) fn count_chars(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_chars() {
        assert_eq!(count_chars(b"abc"), 3);
        assert_eq!(count_chars("münchen".as_bytes()), 7);
        assert_eq!(count_chars(&[0xFF, 0xFE]), 2);
    }

    #[test]
    fn test_char_counter_forward_and_restart() {
        let data = "čaj a kafe".as_bytes();
        let mut counter = CharCounter::default();
        assert_eq!(counter.char_offset(data, 0), 0);
        assert_eq!(counter.char_offset(data, 2), 1);
        assert_eq!(counter.char_offset(data, 6), 5);
        // Going backwards restarts from the beginning
        assert_eq!(counter.char_offset(data, 2), 1);
    }

    #[test]
    fn test_span() {
        let occ = Occurrence {
            label: "Glob".to_string(),
            pos: 4,
            len: 3,
            upos: 4,
            ulen: 3,
            prob: 1.0,
            value: "456".to_string(),
            miner: "match_glob".to_string(),
            fields: BTreeMap::new(),
        };
        assert_eq!(occ.span(), (4, 7));
        let json = serde_json::to_string(&occ).unwrap();
        assert!(json.contains("\"label\":\"Glob\""));
        assert!(!json.contains("fields"));
    }
}
