//! Anchored glob matching over raw bytes.
//!
//! Patterns are parsed into structured segments and matched against a byte
//! slice starting at a fixed offset. Unlike filename globbing, the matcher
//! reports the length of the *longest* match beginning at that offset, which
//! is what an entity miner needs when scanning a stream.
//!
//! # Glob Syntax
//!
//! - `*` - Matches zero or more non-whitespace bytes
//! - `?` - Matches exactly one byte
//! - `[abc]` - Matches one byte from the set (a, b, or c)
//! - `[!abc]` or `[^abc]` - Matches one byte NOT in the set
//! - `[a-z]` - Matches one byte in the range (a through z)
//! - `\x` - Escapes special character x (literal *)
//!
//! # Examples
//!
//! ```
//! use nativex::glob::{GlobPattern, MatchMode};
//!
//! let pattern = GlobPattern::new("????-??-??", MatchMode::CaseSensitive)?;
//! assert_eq!(pattern.match_len(b"on 2020-05-05.", 3), Some(10));
//! assert_eq!(pattern.match_len(b"on 2020-05-05.", 0), None);
//!
//! // `*` stops at whitespace
//! let pattern = GlobPattern::new("id-*", MatchMode::CaseSensitive)?;
//! assert_eq!(pattern.match_len(b"id-42 rest", 0), Some(5));
//! # Ok::<(), nativex::NativexError>(())
//! ```

use crate::error::{NativexError, Result};
use std::fmt;

/// Backtracking budget per anchored match attempt
const MAX_STEPS: usize = 100_000;

/// Match mode for glob patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-sensitive matching
    CaseSensitive,
    /// ASCII case-insensitive matching
    CaseInsensitive,
}

/// A segment of a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobSegment {
    /// Literal bytes (no wildcards)
    Literal(Vec<u8>),

    /// `*` - run of non-whitespace bytes
    Star,

    /// `?` - exactly one byte
    Question,

    /// `[...]` - byte class
    ByteClass {
        /// Bytes or ranges to match
        items: Vec<ClassItem>,
        /// If true, negated class [!...] or [^...]
        negated: bool,
    },
}

/// Item in a byte class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassItem {
    /// Single byte
    Byte(u8),
    /// Range of bytes (inclusive)
    Range(u8, u8),
}

/// A parsed glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    segments: Vec<GlobSegment>,
    mode: MatchMode,
}

impl GlobPattern {
    /// Parse a glob pattern.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` for an empty pattern, an unclosed or empty byte
    /// class, a reversed range, or a trailing backslash.
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self> {
        if pattern.is_empty() {
            return Err(NativexError::InvalidPattern(
                "Empty glob pattern".to_string(),
            ));
        }
        let segments = Self::parse(pattern.as_bytes(), mode)?;
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            mode,
        })
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[GlobSegment] {
        &self.segments
    }

    /// Length of the longest match starting exactly at `pos`.
    ///
    /// Empty matches (e.g. a lone `*` in front of whitespace) are reported as
    /// `None`.
    pub fn match_len(&self, data: &[u8], pos: usize) -> Option<usize> {
        if pos >= data.len() {
            return None;
        }
        let mut steps_remaining = MAX_STEPS;
        self.longest_impl(data, pos, 0, &mut steps_remaining)
            .map(|end| end - pos)
            .filter(|&len| len > 0)
    }

    /// True if the pattern matches the whole of `text`.
    pub fn matches(&self, text: &[u8]) -> bool {
        !text.is_empty() && self.match_len(text, 0) == Some(text.len())
    }

    /// First offset in `from..until` where a match could start.
    ///
    /// Patterns beginning with a literal skip ahead with `memchr`; any other
    /// pattern can start anywhere.
    pub fn next_candidate(&self, data: &[u8], from: usize, until: usize) -> Option<usize> {
        let until = until.min(data.len());
        if from >= until {
            return None;
        }
        let hay = &data[from..until];
        let found = match self.segments.first() {
            Some(GlobSegment::Literal(lit)) => {
                let first = lit[0];
                match self.mode {
                    MatchMode::CaseSensitive => memchr::memchr(first, hay),
                    MatchMode::CaseInsensitive => memchr::memchr2(
                        first.to_ascii_lowercase(),
                        first.to_ascii_uppercase(),
                        hay,
                    ),
                }
            }
            _ => Some(0),
        };
        found.map(|off| from + off)
    }

    /// Largest end offset reachable from (`pos`, `seg_idx`).
    fn longest_impl(
        &self,
        data: &[u8],
        pos: usize,
        seg_idx: usize,
        steps_remaining: &mut usize,
    ) -> Option<usize> {
        if *steps_remaining == 0 {
            return None;
        }
        *steps_remaining -= 1;

        let Some(segment) = self.segments.get(seg_idx) else {
            return Some(pos);
        };

        match segment {
            GlobSegment::Literal(lit) => {
                let remaining = data.get(pos..pos + lit.len())?;
                let matched = match self.mode {
                    MatchMode::CaseSensitive => remaining == lit.as_slice(),
                    MatchMode::CaseInsensitive => remaining.eq_ignore_ascii_case(lit),
                };
                if matched {
                    self.longest_impl(data, pos + lit.len(), seg_idx + 1, steps_remaining)
                } else {
                    None
                }
            }

            GlobSegment::Question => {
                if pos < data.len() {
                    self.longest_impl(data, pos + 1, seg_idx + 1, steps_remaining)
                } else {
                    None
                }
            }

            GlobSegment::ByteClass { items, negated } => {
                let byte = *data.get(pos)?;
                if self.class_contains(items, byte) != *negated {
                    self.longest_impl(data, pos + 1, seg_idx + 1, steps_remaining)
                } else {
                    None
                }
            }

            GlobSegment::Star => {
                let run = data[pos..]
                    .iter()
                    .take_while(|b| !b.is_ascii_whitespace())
                    .count();

                // Trailing star swallows the whole run
                if seg_idx + 1 >= self.segments.len() {
                    return Some(pos + run);
                }

                // Longest first; the first success from the top may still be
                // shorter than a later one, so keep the maximum.
                let mut best: Option<usize> = None;
                for take in (0..=run).rev() {
                    if let Some(end) =
                        self.longest_impl(data, pos + take, seg_idx + 1, steps_remaining)
                    {
                        best = Some(best.map_or(end, |b: usize| b.max(end)));
                    }
                    if *steps_remaining == 0 {
                        break;
                    }
                }
                best
            }
        }
    }

    fn class_contains(&self, items: &[ClassItem], byte: u8) -> bool {
        let fold = |b: u8| match self.mode {
            MatchMode::CaseSensitive => b,
            MatchMode::CaseInsensitive => b.to_ascii_lowercase(),
        };
        let byte = fold(byte);
        items.iter().any(|item| match *item {
            ClassItem::Byte(b) => fold(b) == byte,
            ClassItem::Range(start, end) => {
                let direct = (start..=end).contains(&byte);
                match self.mode {
                    MatchMode::CaseSensitive => direct,
                    MatchMode::CaseInsensitive => {
                        direct || (start..=end).contains(&byte.to_ascii_uppercase())
                    }
                }
            }
        })
    }

    fn parse(pattern: &[u8], _mode: MatchMode) -> Result<Vec<GlobSegment>> {
        let mut segments = Vec::new();
        let mut bytes = pattern.iter().copied().peekable();
        let mut literal_buf = Vec::new();

        let flush_literal = |buf: &mut Vec<u8>, segs: &mut Vec<GlobSegment>| {
            if !buf.is_empty() {
                segs.push(GlobSegment::Literal(std::mem::take(buf)));
            }
        };

        while let Some(b) = bytes.next() {
            match b {
                b'*' => {
                    flush_literal(&mut literal_buf, &mut segments);
                    // Consecutive stars are equivalent to one
                    if segments.last() != Some(&GlobSegment::Star) {
                        segments.push(GlobSegment::Star);
                    }
                }

                b'?' => {
                    flush_literal(&mut literal_buf, &mut segments);
                    segments.push(GlobSegment::Question);
                }

                b'[' => {
                    flush_literal(&mut literal_buf, &mut segments);

                    let mut negated = false;
                    if let Some(&next) = bytes.peek() {
                        if next == b'!' || next == b'^' {
                            negated = true;
                            bytes.next();
                        }
                    }

                    let mut items = Vec::new();
                    let mut prev: Option<u8> = None;
                    // Set after `x-`; holds the range start
                    let mut range_start: Option<u8> = None;

                    loop {
                        let class_b = bytes.next().ok_or_else(|| {
                            NativexError::InvalidPattern("Unclosed character class".to_string())
                        })?;

                        if class_b == b']'
                            && (!items.is_empty() || prev.is_some() || range_start.is_some())
                        {
                            if let Some(p) = prev {
                                items.push(ClassItem::Byte(p));
                            }
                            if let Some(start) = range_start {
                                items.push(ClassItem::Byte(start));
                                items.push(ClassItem::Byte(b'-'));
                            }
                            break;
                        }

                        if let Some(start) = range_start.take() {
                            if start > class_b {
                                return Err(NativexError::InvalidPattern(format!(
                                    "Invalid character range: {}-{}",
                                    start as char, class_b as char
                                )));
                            }
                            items.push(ClassItem::Range(start, class_b));
                        } else if class_b == b'-' && prev.is_some() {
                            range_start = prev.take();
                        } else {
                            if let Some(p) = prev {
                                items.push(ClassItem::Byte(p));
                            }
                            prev = Some(class_b);
                        }
                    }

                    if items.is_empty() {
                        return Err(NativexError::InvalidPattern(
                            "Empty character class".to_string(),
                        ));
                    }

                    segments.push(GlobSegment::ByteClass { items, negated });
                }

                b'\\' => {
                    let escaped = bytes.next().ok_or_else(|| {
                        NativexError::InvalidPattern("Trailing backslash in pattern".to_string())
                    })?;
                    literal_buf.push(escaped);
                }

                _ => literal_buf.push(b),
            }
        }

        flush_literal(&mut literal_buf, &mut segments);
        Ok(segments)
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}
