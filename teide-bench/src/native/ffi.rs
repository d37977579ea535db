//! Raw entry points of the Teide shared library.

use super::{NativeError, NativeResult, SENTINEL_LIMIT};
use libloading::Library;
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};

/// Environment variable naming the shared library.
pub const TEIDE_LIB_ENV: &str = "TEIDE_LIB";

// Aggregation opcodes and join kinds, as defined in td.h.
pub const TD_OP_SUM: u16 = 1;
pub const TD_OP_COUNT: u16 = 2;
pub const TD_OP_AVG: u16 = 3;
pub const TD_JOIN_INNER: u8 = 0;

/// Untyped engine pointer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub usize);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reserved small values that carry no heap object.
    pub fn is_sentinel(self) -> bool {
        self.0 < SENTINEL_LIMIT
    }
}

/// The engine's C interface.
///
/// Functions that take a handle are `unsafe`: the handle must have come from
/// the same library and must not have been released. The safe wrappers in
/// this module are the only intended callers.
pub trait NativeApi {
    fn arena_init(&self);
    fn sym_init(&self);
    /// # Safety
    /// No interned symbol may be used afterwards.
    unsafe fn sym_destroy(&self);
    /// # Safety
    /// Every handle allocated from the arena becomes dangling.
    unsafe fn arena_destroy_all(&self);

    fn read_csv(&self, path: &CStr) -> RawHandle;
    fn sym_intern(&self, name: &CStr) -> i64;
    unsafe fn table_nrows(&self, table: RawHandle) -> i64;
    unsafe fn table_get_col(&self, table: RawHandle, sym: i64) -> RawHandle;

    unsafe fn graph_new(&self, table: RawHandle) -> RawHandle;
    unsafe fn graph_free(&self, graph: RawHandle);

    unsafe fn scan(&self, graph: RawHandle, column: &CStr) -> RawHandle;
    unsafe fn const_table(&self, graph: RawHandle, table: RawHandle) -> RawHandle;
    unsafe fn const_vec(&self, graph: RawHandle, vec: RawHandle) -> RawHandle;
    unsafe fn group(
        &self,
        graph: RawHandle,
        keys: &[RawHandle],
        ops: &[u16],
        inputs: &[RawHandle],
    ) -> RawHandle;
    unsafe fn sort_op(
        &self,
        graph: RawHandle,
        table: RawHandle,
        keys: &[RawHandle],
        descending: &[u8],
    ) -> RawHandle;
    unsafe fn join(
        &self,
        graph: RawHandle,
        left: RawHandle,
        left_keys: &[RawHandle],
        right: RawHandle,
        right_keys: &[RawHandle],
        kind: u8,
    ) -> RawHandle;

    unsafe fn optimize(&self, graph: RawHandle, root: RawHandle) -> RawHandle;
    unsafe fn execute(&self, graph: RawHandle, root: RawHandle) -> RawHandle;
    unsafe fn release(&self, handle: RawHandle);
}

type VoidFn = unsafe extern "C" fn();
type Ptr = *mut c_void;

struct Symbols {
    arena_init: VoidFn,
    sym_init: VoidFn,
    sym_destroy: VoidFn,
    arena_destroy_all: VoidFn,
    read_csv: unsafe extern "C" fn(*const c_char) -> Ptr,
    table_nrows: unsafe extern "C" fn(Ptr) -> i64,
    sym_intern: unsafe extern "C" fn(*const c_char) -> i64,
    table_get_col: unsafe extern "C" fn(Ptr, i64) -> Ptr,
    graph_new: unsafe extern "C" fn(Ptr) -> Ptr,
    graph_free: unsafe extern "C" fn(Ptr),
    scan: unsafe extern "C" fn(Ptr, *const c_char) -> Ptr,
    const_table: unsafe extern "C" fn(Ptr, Ptr) -> Ptr,
    const_vec: unsafe extern "C" fn(Ptr, Ptr) -> Ptr,
    group: unsafe extern "C" fn(Ptr, *const Ptr, u8, *const u16, *const Ptr, u8) -> Ptr,
    sort_op: unsafe extern "C" fn(Ptr, Ptr, *const Ptr, *const u8, u8) -> Ptr,
    join: unsafe extern "C" fn(Ptr, Ptr, *const Ptr, Ptr, *const Ptr, u8, u8) -> Ptr,
    optimize: unsafe extern "C" fn(Ptr, Ptr) -> Ptr,
    execute: unsafe extern "C" fn(Ptr, Ptr) -> Ptr,
    release: unsafe extern "C" fn(Ptr),
}

/// Copy a function pointer out of the library.
///
/// # Safety
/// `T` must match the C signature of `name`.
unsafe fn resolve<T: Copy>(lib: &Library, name: &'static str) -> NativeResult<T> {
    let sym = lib
        .get::<T>(name.as_bytes())
        .map_err(|source| NativeError::Symbol { name, source })?;
    Ok(*sym)
}

macro_rules! resolve_all {
    ($lib:expr, { $($field:ident => $name:literal),* $(,)? }) => {
        Symbols {
            $($field: unsafe { resolve($lib, $name)? },)*
        }
    };
}

/// The engine loaded from a shared library at runtime.
pub struct TeideLib {
    fns: Symbols,
    path: PathBuf,
    // Keeps the copied function pointers valid.
    _lib: Library,
}

impl TeideLib {
    pub fn open(path: &Path) -> NativeResult<Self> {
        let lib = unsafe { Library::new(path) }.map_err(|source| NativeError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let fns = resolve_all!(&lib, {
            arena_init => "td_arena_init",
            sym_init => "td_sym_init",
            sym_destroy => "td_sym_destroy",
            arena_destroy_all => "td_arena_destroy_all",
            read_csv => "td_read_csv",
            table_nrows => "td_table_nrows",
            sym_intern => "td_sym_intern",
            table_get_col => "td_table_get_col",
            graph_new => "td_graph_new",
            graph_free => "td_graph_free",
            scan => "td_scan",
            const_table => "td_const_table",
            const_vec => "td_const_vec",
            group => "td_group",
            sort_op => "td_sort_op",
            join => "td_join",
            optimize => "td_optimize",
            execute => "td_execute",
            release => "td_release",
        });
        tracing::info!(path = %path.display(), "loaded Teide library");
        Ok(Self {
            fns,
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    /// Open the library named by `TEIDE_LIB`.
    pub fn from_env() -> NativeResult<Self> {
        match std::env::var_os(TEIDE_LIB_ENV) {
            Some(path) if !path.is_empty() => Self::open(Path::new(&path)),
            _ => Err(NativeError::LibraryUnset),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ptrs(handles: &[RawHandle]) -> Vec<Ptr> {
    handles.iter().map(|h| h.as_ptr()).collect()
}

// Slice lengths are bounded by MAX_NODE_INPUTS in Graph before they get here.
impl NativeApi for TeideLib {
    fn arena_init(&self) {
        unsafe { (self.fns.arena_init)() }
    }

    fn sym_init(&self) {
        unsafe { (self.fns.sym_init)() }
    }

    unsafe fn sym_destroy(&self) {
        (self.fns.sym_destroy)()
    }

    unsafe fn arena_destroy_all(&self) {
        (self.fns.arena_destroy_all)()
    }

    fn read_csv(&self, path: &CStr) -> RawHandle {
        RawHandle::from_ptr(unsafe { (self.fns.read_csv)(path.as_ptr()) })
    }

    fn sym_intern(&self, name: &CStr) -> i64 {
        unsafe { (self.fns.sym_intern)(name.as_ptr()) }
    }

    unsafe fn table_nrows(&self, table: RawHandle) -> i64 {
        (self.fns.table_nrows)(table.as_ptr())
    }

    unsafe fn table_get_col(&self, table: RawHandle, sym: i64) -> RawHandle {
        RawHandle::from_ptr((self.fns.table_get_col)(table.as_ptr(), sym))
    }

    unsafe fn graph_new(&self, table: RawHandle) -> RawHandle {
        RawHandle::from_ptr((self.fns.graph_new)(table.as_ptr()))
    }

    unsafe fn graph_free(&self, graph: RawHandle) {
        (self.fns.graph_free)(graph.as_ptr())
    }

    unsafe fn scan(&self, graph: RawHandle, column: &CStr) -> RawHandle {
        RawHandle::from_ptr((self.fns.scan)(graph.as_ptr(), column.as_ptr()))
    }

    unsafe fn const_table(&self, graph: RawHandle, table: RawHandle) -> RawHandle {
        RawHandle::from_ptr((self.fns.const_table)(graph.as_ptr(), table.as_ptr()))
    }

    unsafe fn const_vec(&self, graph: RawHandle, vec: RawHandle) -> RawHandle {
        RawHandle::from_ptr((self.fns.const_vec)(graph.as_ptr(), vec.as_ptr()))
    }

    unsafe fn group(
        &self,
        graph: RawHandle,
        keys: &[RawHandle],
        ops: &[u16],
        inputs: &[RawHandle],
    ) -> RawHandle {
        let keys = ptrs(keys);
        let inputs = ptrs(inputs);
        RawHandle::from_ptr((self.fns.group)(
            graph.as_ptr(),
            keys.as_ptr(),
            keys.len() as u8,
            ops.as_ptr(),
            inputs.as_ptr(),
            inputs.len() as u8,
        ))
    }

    unsafe fn sort_op(
        &self,
        graph: RawHandle,
        table: RawHandle,
        keys: &[RawHandle],
        descending: &[u8],
    ) -> RawHandle {
        let keys = ptrs(keys);
        RawHandle::from_ptr((self.fns.sort_op)(
            graph.as_ptr(),
            table.as_ptr(),
            keys.as_ptr(),
            descending.as_ptr(),
            keys.len() as u8,
        ))
    }

    unsafe fn join(
        &self,
        graph: RawHandle,
        left: RawHandle,
        left_keys: &[RawHandle],
        right: RawHandle,
        right_keys: &[RawHandle],
        kind: u8,
    ) -> RawHandle {
        let left_keys = ptrs(left_keys);
        let right_keys = ptrs(right_keys);
        RawHandle::from_ptr((self.fns.join)(
            graph.as_ptr(),
            left.as_ptr(),
            left_keys.as_ptr(),
            right.as_ptr(),
            right_keys.as_ptr(),
            left_keys.len() as u8,
            kind,
        ))
    }

    unsafe fn optimize(&self, graph: RawHandle, root: RawHandle) -> RawHandle {
        RawHandle::from_ptr((self.fns.optimize)(graph.as_ptr(), root.as_ptr()))
    }

    unsafe fn execute(&self, graph: RawHandle, root: RawHandle) -> RawHandle {
        RawHandle::from_ptr((self.fns.execute)(graph.as_ptr(), root.as_ptr()))
    }

    unsafe fn release(&self, handle: RawHandle) {
        (self.fns.release)(handle.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_handle_classes() {
        assert!(RawHandle::NULL.is_null());
        assert!(RawHandle(31).is_sentinel());
        assert!(!RawHandle(32).is_sentinel());
        let p = RawHandle(0x7f00_1000).as_ptr();
        assert_eq!(RawHandle::from_ptr(p), RawHandle(0x7f00_1000));
    }

    #[test]
    fn test_open_missing_library() {
        let err = TeideLib::open(Path::new("/nonexistent/libteide.so"))
            .err()
            .unwrap();
        assert!(matches!(err, NativeError::Load { .. }));
    }
}
