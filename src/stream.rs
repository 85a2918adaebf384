//! Byte streams scanned by the extraction engine.
//!
//! A [`Stream`] is a single-owner handle over either a file (memory-mapped or
//! decompressed) or a copied-in buffer. It carries the scan cursor and is
//! checked for validity when acquired: opening a missing or unreadable file
//! fails immediately instead of producing a stream that silently yields
//! nothing.
//!
//! ```rust
//! use nativex::Stream;
//!
//! let mut stream = Stream::from_text("2020-05-05");
//! assert!(stream.is_valid());
//! assert_eq!(stream.len(), 10);
//! stream.close();
//! assert!(!stream.is_valid());
//! ```

use crate::error::{NativexError, Result};
use crate::file_reader::{self, FileSource};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a stream's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// File on disk (mapped or decompressed)
    File(PathBuf),
    /// Caller-provided bytes
    Buffer,
}

#[derive(Debug)]
enum Source {
    File(FileSource),
    Buffer(Vec<u8>),
}

impl Source {
    fn as_slice(&self) -> &[u8] {
        match self {
            Source::File(f) => f.as_slice(),
            Source::Buffer(b) => b,
        }
    }
}

/// Cursor over a file- or buffer-backed byte sequence.
///
/// Not `Clone`: binding a stream into an extractor moves it there.
pub struct Stream {
    kind: StreamKind,
    /// `None` once the stream has been closed
    source: Option<Source>,
    position: usize,
}

impl Stream {
    /// Open a file-backed stream.
    ///
    /// `.gz` files are decompressed transparently.
    ///
    /// # Errors
    ///
    /// `ResourceFailure` if the file cannot be opened, mapped or decompressed.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = file_reader::load(path).map_err(|e| {
            NativexError::ResourceFailure(format!("{}: {}", path.display(), e))
        })?;
        tracing::debug!(
            path = %path.display(),
            bytes = source.as_slice().len(),
            mapped = !source.is_buffered(),
            "opened file stream"
        );
        Ok(Self {
            kind: StreamKind::File(path.to_path_buf()),
            source: Some(Source::File(source)),
            position: 0,
        })
    }

    /// Create a buffer-backed stream; the bytes are copied in.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            kind: StreamKind::Buffer,
            source: Some(Source::Buffer(bytes.as_ref().to_vec())),
            position: 0,
        }
    }

    /// Create a buffer-backed stream from text.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// True until the stream is closed
    pub fn is_valid(&self) -> bool {
        self.source.is_some()
    }

    /// Release the underlying source. Idempotent.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            tracing::trace!(kind = ?self.kind, "closed stream");
        }
    }

    /// Source kind
    pub fn kind(&self) -> &StreamKind {
        &self.kind
    }

    /// Stream contents.
    ///
    /// # Errors
    ///
    /// `ResourceFailure` after [`close`](Self::close).
    pub fn data(&self) -> Result<&[u8]> {
        self.source
            .as_ref()
            .map(Source::as_slice)
            .ok_or_else(|| NativexError::ResourceFailure("stream is closed".to_string()))
    }

    /// Total length in bytes (0 once closed)
    pub fn len(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.as_slice().len())
    }

    /// True if the stream has no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// True once the cursor has consumed every byte (always true once closed)
    pub fn is_at_end(&self) -> bool {
        self.position >= self.len()
    }

    /// Move the cursor forward; clamped to the stream length.
    pub(crate) fn advance_to(&mut self, position: usize) {
        self.position = position.min(self.len()).max(self.position);
    }

    /// Move the cursor back to the start
    pub(crate) fn rewind(&mut self) {
        self.position = 0;
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .field("len", &self.len())
            .field("position", &self.position)
            .finish()
    }
}
