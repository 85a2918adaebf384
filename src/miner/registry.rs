//! Ordered collection of loaded miners

use super::dynamic::DynamicMiner;
use super::{builtin, Miner, MinerMeta, BUILTIN_PATH};
use crate::error::{NativexError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// A registered miner and where it came from
pub struct MinerEntry {
    miner: Box<dyn Miner>,
    path: String,
    symbol: String,
    param: String,
}

impl MinerEntry {
    /// The miner itself
    pub fn miner(&self) -> &dyn Miner {
        self.miner.as_ref()
    }

    /// Module path as given at registration (or `<builtin>`)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Entry symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Parameter string passed at initialization
    pub fn param(&self) -> &str {
        &self.param
    }
}

impl fmt::Debug for MinerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinerEntry")
            .field("path", &self.path)
            .field("symbol", &self.symbol)
            .field("param", &self.param)
            .field("labels", &self.miner.labels())
            .finish()
    }
}

/// Miners in registration order.
///
/// A failed registration leaves the registry exactly as it was.
#[derive(Debug, Default)]
pub struct MinerRegistry {
    entries: Vec<MinerEntry>,
}

impl MinerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `symbol` from the shared module at `path`.
    ///
    /// # Errors
    ///
    /// `MinerLoadFailure` when loading, symbol lookup, ABI check or
    /// initialization fails.
    pub fn register(&mut self, path: &str, symbol: &str, param: &str) -> Result<()> {
        let miner = DynamicMiner::load(path, symbol, param)?;
        self.push(Box::new(miner), path, symbol, param);
        Ok(())
    }

    /// Instantiate `symbol` from the built-in table.
    ///
    /// # Errors
    ///
    /// `MinerLoadFailure` for an unknown symbol or a rejected parameter.
    pub fn register_builtin(&mut self, symbol: &str, param: &str) -> Result<()> {
        let miner = builtin::create(symbol, param).map_err(|e| NativexError::MinerLoadFailure {
            path: BUILTIN_PATH.to_string(),
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;
        self.push(miner, BUILTIN_PATH, symbol, param);
        Ok(())
    }

    /// Add an already constructed miner
    pub fn register_miner(&mut self, miner: Box<dyn Miner>, path: &str) {
        let symbol = miner.name().to_string();
        self.push(miner, path, &symbol, "");
    }

    fn push(&mut self, miner: Box<dyn Miner>, path: &str, symbol: &str, param: &str) {
        tracing::debug!(
            path,
            symbol,
            labels = ?miner.labels(),
            index = self.entries.len(),
            "registered miner"
        );
        self.entries.push(MinerEntry {
            miner,
            path: path.to_string(),
            symbol: symbol.to_string(),
            param: param.to_string(),
        });
    }

    /// Label → producing miner; later registrations win on duplicates.
    pub fn list_meta(&self) -> BTreeMap<String, MinerMeta> {
        let mut meta = BTreeMap::new();
        for entry in &self.entries {
            for label in entry.miner.labels() {
                meta.insert(
                    label.clone(),
                    MinerMeta {
                        miner: entry.symbol.clone(),
                        path: entry.path.clone(),
                        label: label.clone(),
                    },
                );
            }
        }
        meta
    }

    /// Number of registered miners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &MinerEntry> {
        self.entries.iter()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&MinerEntry> {
        self.entries.get(index)
    }
}
