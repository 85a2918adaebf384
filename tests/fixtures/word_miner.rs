//! Shared miner module used by the dynamic loading tests.
//!
//! `nx_word_miner` matches its parameter word. A word followed by `!` is
//! reported as `Shout` with probability 0.5; otherwise the label is left
//! null and the probability out of range.

use std::ffi::{c_char, c_void, CStr};
use std::sync::Mutex;

#[repr(C)]
pub struct NxHit {
    len: usize,
    label: *const c_char,
    prob: f32,
}

#[repr(C)]
pub struct NxMinerVTable {
    abi_version: u32,
    name: *const c_char,
    labels: *const *const c_char,
    init: Option<unsafe extern "C" fn(*const c_char) -> *mut c_void>,
    mine: Option<unsafe extern "C" fn(*mut c_void, *const u8, usize, usize, *mut NxHit) -> bool>,
    destroy: Option<unsafe extern "C" fn(*mut c_void)>,
}

struct Shared<T>(T);
unsafe impl<T> Sync for Shared<T> {}

const SHOUT: *const c_char = b"Shout\0".as_ptr() as *const c_char;

static LABELS: Shared<[*const c_char; 3]> = Shared([
    b"Word\0".as_ptr() as *const c_char,
    SHOUT,
    std::ptr::null(),
]);

static DESTROYED: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

unsafe extern "C" fn init(param: *const c_char) -> *mut c_void {
    if param.is_null() {
        return std::ptr::null_mut();
    }
    let word = CStr::from_ptr(param).to_bytes().to_vec();
    if word.is_empty() || word == b"reject" {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(word)) as *mut c_void
}

unsafe extern "C" fn mine(
    state: *mut c_void,
    data: *const u8,
    len: usize,
    pos: usize,
    out: *mut NxHit,
) -> bool {
    let word = &*(state as *const Vec<u8>);
    let data = std::slice::from_raw_parts(data, len);
    if pos >= len || !data[pos..].starts_with(word) {
        return false;
    }
    let end = pos + word.len();
    let hit = &mut *out;
    if data.get(end) == Some(&b'!') {
        hit.len = word.len() + 1;
        hit.label = SHOUT;
        hit.prob = 0.5;
    } else {
        hit.len = word.len();
        hit.label = std::ptr::null();
        hit.prob = 7.0;
    }
    true
}

unsafe extern "C" fn destroy(state: *mut c_void) {
    let word = Box::from_raw(state as *mut Vec<u8>);
    if let Ok(mut destroyed) = DESTROYED.lock() {
        destroyed.push(*word);
    }
}

static WORD: Shared<NxMinerVTable> = Shared(NxMinerVTable {
    abi_version: 1,
    name: b"word\0".as_ptr() as *const c_char,
    labels: &LABELS.0 as *const [*const c_char; 3] as *const *const c_char,
    init: Some(init),
    mine: Some(mine),
    destroy: Some(destroy),
});

static FUTURE: Shared<NxMinerVTable> = Shared(NxMinerVTable {
    abi_version: 2,
    name: b"future\0".as_ptr() as *const c_char,
    labels: &LABELS.0 as *const [*const c_char; 3] as *const *const c_char,
    init: Some(init),
    mine: Some(mine),
    destroy: Some(destroy),
});

static INCOMPLETE: Shared<NxMinerVTable> = Shared(NxMinerVTable {
    abi_version: 1,
    name: b"incomplete\0".as_ptr() as *const c_char,
    labels: &LABELS.0 as *const [*const c_char; 3] as *const *const c_char,
    init: Some(init),
    mine: None,
    destroy: Some(destroy),
});

#[no_mangle]
pub extern "C" fn nx_word_miner() -> *const NxMinerVTable {
    &WORD.0
}

#[no_mangle]
pub extern "C" fn nx_future_miner() -> *const NxMinerVTable {
    &FUTURE.0
}

#[no_mangle]
pub extern "C" fn nx_incomplete_miner() -> *const NxMinerVTable {
    &INCOMPLETE.0
}

#[no_mangle]
pub extern "C" fn nx_null_miner() -> *const NxMinerVTable {
    std::ptr::null()
}

/// True once a state initialized with `word` has been destroyed
#[no_mangle]
pub unsafe extern "C" fn nx_was_destroyed(word: *const c_char) -> bool {
    let word = CStr::from_ptr(word).to_bytes();
    DESTROYED
        .lock()
        .map(|d| d.iter().any(|w| w == word))
        .unwrap_or(false)
}
