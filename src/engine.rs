//! Batch-oriented extraction engine.
//!
//! An [`Extractor`] owns a [`MinerRegistry`] and at most one bound
//! [`Stream`]. Each call to [`next_batch`](Extractor::next_batch) scans the
//! stream window by window, asking every miner for anchored matches at the
//! positions it cares about, until enough occurrences are buffered or the
//! stream is exhausted.
//!
//! ```text
//!  Unbound ──bind──▶ Bound ──next_batch──▶ Scanning ──(drained)──▶ AtEnd
//!     ▲                                                               │
//!     └──────────────────────── unbind ◀──────────────────────────────┘
//! ```
//!
//! The engine always scans one window past what it returns, so once the last
//! occurrence has been handed out [`is_at_end`](Extractor::is_at_end) is
//! already true.
//!
//! # Example
//!
//! ```rust
//! use nativex::{DedupPolicy, Extractor, Stream};
//!
//! let mut extractor = Extractor::builder()
//!     .batch_size(10)
//!     .dedup_policy(DedupPolicy::KeepMaximal)
//!     .build()?;
//! extractor.register_builtin_miner("match_glob", "????-??-??");
//! extractor.bind_stream(Stream::from_text("born 1999-12-31, died 2070-01-01"))?;
//!
//! let mut dates = Vec::new();
//! while !extractor.is_at_end()? {
//!     dates.extend(extractor.next_batch()?.into_iter().map(|o| o.value));
//! }
//! assert_eq!(dates, ["1999-12-31", "2070-01-01"]);
//! # Ok::<(), nativex::NativexError>(())
//! ```

use crate::dedup::{sort_candidates, Candidate, DedupPolicy, EnclosedFilter};
use crate::error::{NativexError, Result};
use crate::miner::{Miner, MinerMeta, MinerRegistry};
use crate::occurrence::{count_chars, CharCounter, Occurrence};
use crate::stream::Stream;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;

/// Default number of occurrences per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default scan window in bytes
pub const DEFAULT_WINDOW_SIZE: usize = 64 * 1024;

/// Smallest sub-range handed to one worker task
const MIN_TASK_BYTES: usize = 4 * 1024;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// No stream bound
    Unbound,
    /// Stream bound, nothing scanned yet
    Bound,
    /// Batches are being pulled
    Scanning,
    /// Stream exhausted and every occurrence returned
    AtEnd,
}

/// Counters for the current binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Bytes covered by completed windows
    pub bytes_scanned: u64,
    /// Windows scanned
    pub windows: u64,
    /// Occurrences handed out in batches
    pub occurrences: u64,
    /// Occurrences dropped by the dedup policy
    pub suppressed: u64,
    /// Non-empty batches returned
    pub batches: u64,
}

/// Builder for [`Extractor`]
#[derive(Debug, Clone)]
pub struct ExtractorBuilder {
    threads: usize,
    batch_size: usize,
    dedup_policy: DedupPolicy,
    window_size: usize,
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorBuilder {
    /// Single-threaded, batch size 1000, keep all occurrences, 64 KiB windows
    pub fn new() -> Self {
        Self {
            threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            dedup_policy: DedupPolicy::KeepAll,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Worker threads for scanning; 0 uses all available cores
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Default batch size; 0 keeps the default
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    /// Dedup policy
    pub fn dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup_policy = policy;
        self
    }

    /// Shorthand for `KeepMaximal` / `KeepAll`
    pub fn suppress_enclosed(self, suppress: bool) -> Self {
        self.dedup_policy(DedupPolicy::from_suppress_enclosed(suppress))
    }

    /// Bytes scanned per window (minimum 1)
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// Build the extractor
    ///
    /// # Errors
    ///
    /// `Config` if the worker pool cannot be created.
    pub fn build(self) -> Result<Extractor> {
        let threads = if self.threads == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.threads
        };
        let pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("nativex-scan-{}", i))
                .build()
                .map_err(|e| NativexError::Config(format!("cannot start worker pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        Ok(Extractor::from_settings(&self, threads, pool))
    }
}

/// Streaming extraction over a bound [`Stream`]
pub struct Extractor {
    registry: MinerRegistry,
    stream: Option<Stream>,
    state: EngineState,
    batch_size: usize,
    dedup_policy: DedupPolicy,
    window_size: usize,
    threads: usize,
    pool: Option<rayon::ThreadPool>,
    pending: VecDeque<Occurrence>,
    filter: EnclosedFilter,
    chars: CharCounter,
    stats: ExtractionStats,
    last_error: Option<String>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Single-threaded extractor with default settings
    pub fn new() -> Self {
        Self::from_settings(&ExtractorBuilder::new(), 1, None)
    }

    fn from_settings(
        settings: &ExtractorBuilder,
        threads: usize,
        pool: Option<rayon::ThreadPool>,
    ) -> Self {
        Self {
            registry: MinerRegistry::new(),
            stream: None,
            state: EngineState::Unbound,
            batch_size: settings.batch_size,
            dedup_policy: settings.dedup_policy,
            window_size: settings.window_size,
            threads,
            pool,
            pending: VecDeque::new(),
            filter: EnclosedFilter::default(),
            chars: CharCounter::default(),
            stats: ExtractionStats::default(),
            last_error: None,
        }
    }

    /// Start configuring an extractor
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    // ---- miners -------------------------------------------------------

    /// Load a miner from a shared module.
    ///
    /// Returns `false` on failure; the reason is available from
    /// [`last_error`](Self::last_error) and previously registered miners
    /// are unaffected.
    pub fn register_miner(&mut self, path: &str, symbol: &str, param: &str) -> bool {
        let result = self.registry.register(path, symbol, param);
        self.note_registration(result)
    }

    /// Register a miner from the built-in table; see [`register_miner`](Self::register_miner).
    pub fn register_builtin_miner(&mut self, symbol: &str, param: &str) -> bool {
        let result = self.registry.register_builtin(symbol, param);
        self.note_registration(result)
    }

    /// Register an already constructed miner
    pub fn add_miner(&mut self, miner: Box<dyn Miner>, path: &str) {
        self.registry.register_miner(miner, path);
    }

    fn note_registration(&mut self, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "miner registration failed");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Registered miners
    pub fn miners(&self) -> &MinerRegistry {
        &self.registry
    }

    /// Label → producing miner
    pub fn list_meta(&self) -> BTreeMap<String, MinerMeta> {
        self.registry.list_meta()
    }

    // ---- stream binding -----------------------------------------------

    /// Bind a stream for scanning.
    ///
    /// The stream's cursor is rewound, so scanning always starts at the
    /// first byte. Binding while a previous
    /// stream sits at its end releases that stream.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a stream is bound and not yet exhausted
    /// - `ResourceFailure` if `stream` has been closed
    pub fn bind_stream(&mut self, mut stream: Stream) -> Result<()> {
        if matches!(self.state, EngineState::Bound | EngineState::Scanning) {
            return Err(self.fail(NativexError::InvalidState(
                "a stream is already bound".to_string(),
            )));
        }
        if !stream.is_valid() {
            return Err(self.fail(NativexError::ResourceFailure(
                "cannot bind a closed stream".to_string(),
            )));
        }

        if let Some(mut finished) = self.stream.take() {
            finished.close();
        }
        self.reset_scan();
        stream.rewind();
        tracing::debug!(kind = ?stream.kind(), len = stream.len(), "bound stream");
        self.state = if stream.is_at_end() {
            EngineState::AtEnd
        } else {
            EngineState::Bound
        };
        self.stream = Some(stream);
        Ok(())
    }

    /// Detach the bound stream (if any) and return it. Idempotent.
    ///
    /// Occurrences scanned but not yet returned are discarded.
    pub fn unbind_stream(&mut self) -> Option<Stream> {
        self.reset_scan();
        self.state = EngineState::Unbound;
        self.stream.take()
    }

    /// The bound stream
    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    /// True once every occurrence of the bound stream has been returned
    ///
    /// # Errors
    ///
    /// `InvalidState` if no stream is bound.
    pub fn is_at_end(&self) -> Result<bool> {
        match &self.stream {
            Some(stream) => Ok(self.pending.is_empty() && stream.is_at_end()),
            None => Err(NativexError::InvalidState("no stream bound".to_string())),
        }
    }

    // ---- batching -----------------------------------------------------

    /// Next batch of at most [`batch_size`](Self::batch_size) occurrences
    pub fn next_batch(&mut self) -> Result<Vec<Occurrence>> {
        self.next_batch_of(self.batch_size)
    }

    /// Next batch of at most `size` occurrences (0 = default size).
    ///
    /// May return fewer, including none, when the stream runs out.
    ///
    /// # Errors
    ///
    /// `InvalidState` if no stream is bound.
    pub fn next_batch_of(&mut self, size: usize) -> Result<Vec<Occurrence>> {
        let size = if size == 0 { self.batch_size } else { size };
        if self.stream.is_none() {
            return Err(self.fail(NativexError::InvalidState(
                "next_batch called with no stream bound".to_string(),
            )));
        }
        if self.state == EngineState::Bound {
            self.state = EngineState::Scanning;
        }

        // Keep one occurrence in reserve so the end is known before the
        // final batch is returned.
        while self.pending.len() <= size && !self.stream_exhausted() {
            if let Err(e) = self.scan_window() {
                return Err(self.fail(e));
            }
        }

        let take = size.min(self.pending.len());
        let batch: Vec<Occurrence> = self.pending.drain(..take).collect();
        self.stats.occurrences += batch.len() as u64;
        if !batch.is_empty() {
            self.stats.batches += 1;
        }

        if self.pending.is_empty() && self.stream_exhausted() {
            self.state = EngineState::AtEnd;
        }
        tracing::debug!(
            returned = batch.len(),
            pending = self.pending.len(),
            position = self.stream.as_ref().map_or(0, Stream::position),
            "batch"
        );
        Ok(batch)
    }

    /// Iterator over the remaining non-empty batches
    pub fn batches(&mut self) -> Batches<'_> {
        Batches {
            extractor: self,
            failed: false,
        }
    }

    /// Drain the bound stream into one vector
    pub fn extract_all(&mut self) -> Result<Vec<Occurrence>> {
        let mut all = Vec::new();
        for batch in self.batches() {
            all.extend(batch?);
        }
        Ok(all)
    }

    // ---- settings and diagnostics -------------------------------------

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Default batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the default batch size (0 restores the default)
    pub fn set_batch_size(&mut self, size: usize) {
        self.batch_size = if size == 0 { DEFAULT_BATCH_SIZE } else { size };
    }

    /// Current dedup policy
    pub fn dedup_policy(&self) -> DedupPolicy {
        self.dedup_policy
    }

    /// Change the dedup policy; applies from the next scanned window
    pub fn set_dedup_policy(&mut self, policy: DedupPolicy) {
        self.dedup_policy = policy;
    }

    /// Worker threads used for scanning
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Bytes scanned per window
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Counters for the current binding
    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            suppressed: self.filter.suppressed(),
            ..self.stats
        }
    }

    /// Message of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ---- internals ----------------------------------------------------

    fn fail(&mut self, err: NativexError) -> NativexError {
        self.last_error = Some(err.to_string());
        err
    }

    fn reset_scan(&mut self) {
        self.pending.clear();
        self.filter.reset();
        self.chars.reset();
        self.stats = ExtractionStats::default();
    }

    fn stream_exhausted(&self) -> bool {
        self.stream.as_ref().map_or(true, Stream::is_at_end)
    }

    /// Scan the next window and queue what survives deduplication
    fn scan_window(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(NativexError::InvalidState("no stream bound".to_string()));
        };
        let data = stream.data()?;
        let start = stream.position();
        let end = start.saturating_add(self.window_size).min(data.len());

        let mut candidates = scan_range(&self.registry, self.pool.as_ref(), data, start..end);
        sort_candidates(&mut candidates);
        let raw = candidates.len();
        let kept = self.filter.apply(self.dedup_policy, candidates);

        for candidate in kept {
            let span = &data[candidate.start..candidate.end];
            let miner = self
                .registry
                .get(candidate.miner)
                .map(|entry| entry.symbol().to_string())
                .unwrap_or_default();
            self.pending.push_back(Occurrence {
                label: candidate.hit.label,
                pos: candidate.start,
                len: candidate.end - candidate.start,
                upos: self.chars.char_offset(data, candidate.start),
                ulen: count_chars(span),
                prob: candidate.hit.prob,
                value: String::from_utf8_lossy(span).into_owned(),
                miner,
                fields: candidate.hit.fields.into_iter().collect(),
            });
        }

        stream.advance_to(end);
        self.stats.windows += 1;
        self.stats.bytes_scanned += (end - start) as u64;
        tracing::trace!(start, end, raw, pending = self.pending.len(), "scanned window");
        Ok(())
    }
}

/// Collect every miner's hits starting inside `range`
fn scan_range(
    registry: &MinerRegistry,
    pool: Option<&rayon::ThreadPool>,
    data: &[u8],
    range: Range<usize>,
) -> Vec<Candidate> {
    if range.is_empty() || registry.is_empty() {
        return Vec::new();
    }

    let Some(pool) = pool else {
        return registry
            .iter()
            .enumerate()
            .flat_map(|(idx, entry)| scan_miner(entry.miner(), idx, data, range.clone()))
            .collect();
    };

    // One task per (miner, sub-range); a hit belongs to the sub-range that
    // holds its start, so splitting never loses or duplicates a match.
    let chunk = (range.len() / pool.current_num_threads().max(1)).max(MIN_TASK_BYTES);
    let mut tasks = Vec::new();
    for idx in 0..registry.len() {
        let mut from = range.start;
        while from < range.end {
            let until = (from + chunk).min(range.end);
            tasks.push((idx, from..until));
            from = until;
        }
    }

    let per_task: Vec<Vec<Candidate>> = pool.install(|| {
        tasks
            .into_par_iter()
            .map(|(idx, sub)| match registry.get(idx) {
                Some(entry) => scan_miner(entry.miner(), idx, data, sub),
                None => Vec::new(),
            })
            .collect()
    });
    per_task.into_iter().flatten().collect()
}

fn scan_miner(miner: &dyn Miner, idx: usize, data: &[u8], range: Range<usize>) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut pos = range.start;
    while let Some(at) = miner.next_candidate(data, pos, range.end) {
        if at < pos || at >= range.end {
            break;
        }
        if let Some(hit) = miner.mine_at(data, at) {
            let end = at.checked_add(hit.len).filter(|&end| end <= data.len());
            if let (true, Some(end)) = (hit.len > 0, end) {
                out.push(Candidate {
                    start: at,
                    end,
                    miner: idx,
                    hit,
                });
            }
        }
        pos = at + 1;
    }
    out
}

/// Iterator returned by [`Extractor::batches`]
pub struct Batches<'a> {
    extractor: &'a mut Extractor,
    failed: bool,
}

impl Iterator for Batches<'_> {
    type Item = Result<Vec<Occurrence>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.extractor.is_at_end() {
            Ok(true) => None,
            Ok(false) => match self.extractor.next_batch() {
                Ok(batch) if batch.is_empty() => None,
                Ok(batch) => Some(Ok(batch)),
                Err(e) => {
                    self.failed = true;
                    Some(Err(e))
                }
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("state", &self.state)
            .field("miners", &self.registry.len())
            .field("stream", &self.stream)
            .field("batch_size", &self.batch_size)
            .field("dedup_policy", &self.dedup_policy)
            .field("threads", &self.threads)
            .field("pending", &self.pending.len())
            .finish()
    }
}
