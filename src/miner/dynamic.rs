//! Miners loaded from shared modules at runtime.
//!
//! # ABI (version 1)
//!
//! A module exports one or more entry symbols of type
//! [`NxEntryFn`]: `extern "C" fn() -> *const NxMinerVTable`. The returned
//! table must stay valid for as long as the module is loaded.
//!
//! ```c
//! typedef struct {
//!     size_t len;          /* bytes matched, > 0 */
//!     const char *label;   /* NUL-terminated, may be NULL (first label) */
//!     float prob;          /* 0.0 - 1.0 */
//! } nx_hit;
//!
//! typedef struct {
//!     uint32_t abi_version;           /* NX_ABI_VERSION = 1 */
//!     const char *name;
//!     const char *const *labels;      /* NULL-terminated */
//!     void *(*init)(const char *param);   /* NULL on failure */
//!     bool (*mine)(void *state, const uint8_t *data, size_t len,
//!                  size_t pos, nx_hit *out);
//!     void (*destroy)(void *state);
//! } nx_miner_vtable;
//! ```
//!
//! `mine` is called concurrently from several threads with the same state
//! and must not mutate it.

use super::{Hit, Miner};
use crate::error::{NativexError, Result};
use libloading::{Library, Symbol};
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::{Path, PathBuf};

/// ABI version this crate speaks
pub const ABI_VERSION: u32 = 1;

/// Environment variable overriding the miners directory
pub const MINERS_PATH_ENV: &str = "NATIVEX_MINERS_PATH";

/// Directory searched for relative module paths
pub const DEFAULT_MINERS_PATH: &str = "/usr/lib/nativeextractor_miners";

/// Match record filled in by a module's `mine`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NxHit {
    /// Bytes matched
    pub len: usize,
    /// Label; null selects the module's first label
    pub label: *const c_char,
    /// Confidence
    pub prob: f32,
}

/// `init` entry: per-registration state from the parameter string
pub type NxInitFn = unsafe extern "C" fn(param: *const c_char) -> *mut c_void;

/// `mine` entry: anchored match attempt at `pos`
pub type NxMineFn = unsafe extern "C" fn(
    state: *mut c_void,
    data: *const u8,
    len: usize,
    pos: usize,
    out: *mut NxHit,
) -> bool;

/// `destroy` entry: release state returned by `init`
pub type NxDestroyFn = unsafe extern "C" fn(state: *mut c_void);

/// Function table exported by a module
///
/// Entries are nullable on the C side; a null entry fails the load.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NxMinerVTable {
    /// Must equal [`ABI_VERSION`]
    pub abi_version: u32,
    /// Miner name
    pub name: *const c_char,
    /// Null-terminated array of labels
    pub labels: *const *const c_char,
    /// Create per-registration state
    pub init: Option<NxInitFn>,
    /// Match at a position
    pub mine: Option<NxMineFn>,
    /// Release state
    pub destroy: Option<NxDestroyFn>,
}

/// Type of an exported entry symbol
pub type NxEntryFn = unsafe extern "C" fn() -> *const NxMinerVTable;

/// Resolve a module path: absolute paths are used as-is, relative ones are
/// looked up in `$NATIVEX_MINERS_PATH` (or [`DEFAULT_MINERS_PATH`]).
pub fn resolve_module_path(path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() || candidate.exists() {
        return candidate.to_path_buf();
    }
    let base = std::env::var_os(MINERS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MINERS_PATH));
    base.join(candidate)
}

/// A miner backed by a loaded shared module
pub struct DynamicMiner {
    mine: NxMineFn,
    destroy: NxDestroyFn,
    state: *mut c_void,
    name: String,
    labels: Vec<String>,
    path: PathBuf,
    // Dropped after `state` is destroyed (see Drop)
    _library: Library,
}

// SAFETY: the ABI requires `mine` to be callable concurrently on one state;
// `init`/`destroy` are only called from `load` and `Drop`.
unsafe impl Send for DynamicMiner {}
unsafe impl Sync for DynamicMiner {}

impl DynamicMiner {
    /// Load `symbol` from the module at `path` and initialize it with `param`
    ///
    /// # Errors
    ///
    /// `MinerLoadFailure` if the module cannot be loaded, the symbol is
    /// missing, the ABI version differs, or `init` fails.
    pub fn load(path: &str, symbol: &str, param: &str) -> Result<Self> {
        let fail = |reason: String| NativexError::MinerLoadFailure {
            path: path.to_string(),
            symbol: symbol.to_string(),
            reason,
        };

        let resolved = resolve_module_path(path);
        tracing::debug!(path = %resolved.display(), symbol, "loading miner module");

        let c_param =
            CString::new(param).map_err(|_| fail("parameter contains a NUL byte".to_string()))?;

        // SAFETY: loading runs the module's initializers; trusting the
        // module is inherent to registering it. The entry symbol is checked
        // against the ABI version before any other vtable entry is used.
        unsafe {
            let library =
                Library::new(&resolved).map_err(|e| fail(format!("cannot load module: {}", e)))?;

            let vtable = {
                let entry: Symbol<NxEntryFn> = library
                    .get(symbol.as_bytes())
                    .map_err(|e| fail(format!("symbol not found: {}", e)))?;
                let table = entry();
                if table.is_null() {
                    return Err(fail("entry returned no vtable".to_string()));
                }
                *table
            };

            if vtable.abi_version != ABI_VERSION {
                return Err(fail(format!(
                    "ABI version {} (expected {})",
                    vtable.abi_version, ABI_VERSION
                )));
            }

            let name = if vtable.name.is_null() {
                symbol.to_string()
            } else {
                CStr::from_ptr(vtable.name).to_string_lossy().into_owned()
            };
            let (Some(init), Some(mine), Some(destroy)) =
                (vtable.init, vtable.mine, vtable.destroy)
            else {
                return Err(fail("vtable has a null init, mine or destroy entry".to_string()));
            };
            let labels = read_labels(vtable.labels);
            if labels.is_empty() {
                return Err(fail("module declares no labels".to_string()));
            }

            let state = init(c_param.as_ptr());
            if state.is_null() {
                return Err(fail(format!("init rejected parameter {:?}", param)));
            }

            Ok(Self {
                mine,
                destroy,
                state,
                name,
                labels,
                path: resolved,
                _library: library,
            })
        }
    }

    /// Resolved module path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Copy a null-terminated C string array
///
/// # Safety
///
/// `labels` must be null or point to a null-terminated array of valid C strings.
unsafe fn read_labels(labels: *const *const c_char) -> Vec<String> {
    let mut out = Vec::new();
    if labels.is_null() {
        return out;
    }
    let mut cursor = labels;
    while !(*cursor).is_null() {
        out.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
        cursor = cursor.add(1);
    }
    out
}

impl Miner for DynamicMiner {
    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn mine_at(&self, data: &[u8], pos: usize) -> Option<Hit> {
        let mut out = NxHit {
            len: 0,
            label: std::ptr::null(),
            prob: 1.0,
        };
        // SAFETY: state came from this module's init and is still alive;
        // data/len describe a valid slice for the duration of the call.
        let matched =
            unsafe { (self.mine)(self.state, data.as_ptr(), data.len(), pos, &mut out) };
        let in_bounds = pos
            .checked_add(out.len)
            .is_some_and(|end| end <= data.len());
        if !matched || out.len == 0 || !in_bounds {
            return None;
        }
        let label = if out.label.is_null() {
            self.labels[0].clone()
        } else {
            // SAFETY: the ABI requires a NUL-terminated string owned by the module
            unsafe { CStr::from_ptr(out.label) }
                .to_string_lossy()
                .into_owned()
        };
        Some(Hit {
            len: out.len,
            label,
            prob: out.prob.clamp(0.0, 1.0),
            fields: Vec::new(),
        })
    }
}

impl Drop for DynamicMiner {
    fn drop(&mut self) {
        // SAFETY: state is non-null from init and destroyed exactly once,
        // before `_library` is unloaded.
        unsafe { (self.destroy)(self.state) };
        tracing::trace!(miner = %self.name, "destroyed miner state");
    }
}

impl std::fmt::Debug for DynamicMiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicMiner")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_module_fails() {
        let err = DynamicMiner::load("/nonexistent/miner.so", "match_glob", "").unwrap_err();
        match err {
            NativexError::MinerLoadFailure { path, symbol, reason } => {
                assert_eq!(path, "/nonexistent/miner.so");
                assert_eq!(symbol, "match_glob");
                assert!(reason.contains("cannot load module"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nul_in_param_fails() {
        let err = DynamicMiner::load("/nonexistent/miner.so", "x", "a\0b").unwrap_err();
        assert!(err.is_miner_failure());
    }

    #[test]
    fn test_resolve_absolute_path() {
        assert_eq!(
            resolve_module_path("/opt/miners/glob.so"),
            PathBuf::from("/opt/miners/glob.so")
        );
    }

    #[test]
    fn test_read_labels() {
        let a = CString::new("Email").unwrap();
        let b = CString::new("Phone").unwrap();
        let array = [a.as_ptr(), b.as_ptr(), std::ptr::null()];
        let labels = unsafe { read_labels(array.as_ptr()) };
        assert_eq!(labels, vec!["Email", "Phone"]);
        assert!(unsafe { read_labels(std::ptr::null()) }.is_empty());
    }
}
