//! JSON description of an extraction pipeline.
//!
//! ```json
//! {
//!   "threads": 4,
//!   "batch_size": 1000,
//!   "suppress_enclosed": true,
//!   "miners": [
//!     { "symbol": "match_glob", "param": "????-??-??" },
//!     { "path": "glob_entities.so", "symbol": "match_glob", "param": "+1*" }
//!   ]
//! }
//! ```
//!
//! A miner without `path` (or with `"path": null`) comes from the built-in
//! table. Every field is optional.

use crate::engine::{Extractor, ExtractorBuilder, DEFAULT_BATCH_SIZE, DEFAULT_WINDOW_SIZE};
use crate::error::{NativexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One miner to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerSpec {
    /// Shared module path; `None` selects the built-in table
    #[serde(default)]
    pub path: Option<String>,
    /// Entry symbol
    pub symbol: String,
    /// Initialization parameter
    #[serde(default)]
    pub param: String,
}

impl MinerSpec {
    /// Built-in miner spec
    pub fn builtin(symbol: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            path: None,
            symbol: symbol.into(),
            param: param.into(),
        }
    }

    /// Parse `PATH:SYMBOL[:PARAM]`; the parameter may itself contain `:`.
    pub fn parse_plugin(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(3, ':');
        let path = parts.next().filter(|p| !p.is_empty());
        let symbol = parts.next().filter(|s| !s.is_empty());
        match (path, symbol) {
            (Some(path), Some(symbol)) => Ok(Self {
                path: Some(path.to_string()),
                symbol: symbol.to_string(),
                param: parts.next().unwrap_or("").to_string(),
            }),
            _ => Err(NativexError::Config(format!(
                "expected PATH:SYMBOL[:PARAM], got {:?}",
                spec
            ))),
        }
    }
}

/// Extraction pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Worker threads (0 = all cores)
    pub threads: usize,
    /// Default batch size
    pub batch_size: usize,
    /// Drop enclosed occurrences
    pub suppress_enclosed: bool,
    /// Bytes per scan window
    pub window_size: usize,
    /// Miners in registration order
    pub miners: Vec<MinerSpec>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            suppress_enclosed: false,
            window_size: DEFAULT_WINDOW_SIZE,
            miners: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Parse from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NativexError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Builder carrying these settings
    pub fn builder(&self) -> ExtractorBuilder {
        ExtractorBuilder::new()
            .threads(self.threads)
            .batch_size(self.batch_size)
            .suppress_enclosed(self.suppress_enclosed)
            .window_size(self.window_size)
    }

    /// Build an extractor and register every miner.
    ///
    /// Unlike [`Extractor::register_miner`], a miner that fails to load is
    /// an error here: a configuration names exactly what it wants.
    pub fn build(&self) -> Result<Extractor> {
        let mut extractor = self.builder().build()?;
        for spec in &self.miners {
            let ok = match &spec.path {
                Some(path) => extractor.register_miner(path, &spec.symbol, &spec.param),
                None => extractor.register_builtin_miner(&spec.symbol, &spec.param),
            };
            if !ok {
                return Err(NativexError::Config(
                    extractor
                        .last_error()
                        .unwrap_or("miner registration failed")
                        .to_string(),
                ));
            }
        }
        Ok(extractor)
    }
}
