//! nativex - Streaming Entity Extraction and Patricia Tries
//!
//! nativex scans byte streams for entities recognized by pluggable *miners*
//! and ships a compressed prefix trie that can be saved once and memory-mapped
//! for read-only reuse by any number of threads or processes.
//!
//! # Quick Start - Extraction
//!
//! ```rust
//! use nativex::{Extractor, Stream};
//!
//! let mut extractor = Extractor::builder().batch_size(100).build()?;
//! extractor.register_builtin_miner("match_glob", "+1 (???) ???-????");
//! extractor.register_builtin_miner("match_dictionary", "praha,brno");
//!
//! extractor.bind_stream(Stream::from_text("call +1 (846) 569-3535 in praha"))?;
//! for batch in extractor.batches() {
//!     for occ in batch? {
//!         println!("{} {:?} at {}", occ.label, occ.value, occ.pos);
//!     }
//! }
//! # Ok::<(), nativex::NativexError>(())
//! ```
//!
//! # Quick Start - Patricia Trie
//!
//! ```rust
//! use nativex::{MappedTrie, PatriciaTrie};
//!
//! let trie: PatriciaTrie = ["new", "new york", "newark"].into_iter().collect();
//! assert_eq!(trie.search("new yorker"), 8);
//!
//! let mapped = MappedTrie::from_bytes(trie.to_bytes()?)?;
//! assert!(mapped.search_extended("newark").terminal);
//! # Ok::<(), nativex::NativexError>(())
//! ```
//!
//! # Key Features
//!
//! - **Batch pulling**: `ceil(K/B)` batches for K matches, end-of-stream known early
//! - **Enclosed-occurrence suppression**: keep only maximal spans on demand
//! - **Parallel scanning**: miners × sub-ranges on a rayon pool, deterministic output
//! - **Plugins**: shared modules through a small C ABI, or built-in miners
//! - **Zero-copy tries**: saved tries are searched straight from the mapping
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  bind   ┌──────────────────────────────┐
//! │   Stream   │───────▶│  Extractor                    │
//! │ mmap / buf │         │  ├─ MinerRegistry             │──▶ Vec<Occurrence>
//! └────────────┘         │  ├─ window scan (rayon)       │
//!                        │  └─ dedup (enclosed filter)   │
//!                        └──────────────────────────────┘
//!                                       │ match_dictionary
//!                                       ▼
//!                        ┌──────────────────────────────┐
//!                        │ Trie: PatriciaTrie | Mapped  │
//!                        └──────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// JSON pipeline configuration
pub mod config;
/// Enclosed-occurrence suppression
pub mod dedup;
pub mod engine;
/// Error types for extraction and trie operations
pub mod error;
pub mod file_reader;
pub mod glob;
pub mod miner;
pub mod occurrence;
pub mod patricia;
pub mod stream;

// Re-exports for Rust consumers

pub use crate::config::{ExtractorConfig, MinerSpec};
pub use crate::dedup::DedupPolicy;
pub use crate::engine::{Batches, EngineState, ExtractionStats, Extractor, ExtractorBuilder};
pub use crate::error::{NativexError, Result};
pub use crate::glob::MatchMode;
pub use crate::miner::{Hit, Miner, MinerMeta, MinerRegistry};
pub use crate::occurrence::Occurrence;
pub use crate::patricia::{MappedTrie, PatriciaTrie, SearchResult, Trie};
pub use crate::stream::{Stream, StreamKind};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
