use super::ffi::{NativeApi, RawHandle};
use super::{check, NativeError, NativeResult};
use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// ────────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────────

/// Process-wide engine state: arena allocator and symbol table.
///
/// Tables, graphs and results each hold an `Rc` to the session, so the global
/// teardown in `Drop` runs only after all of them are gone.
pub struct Session<A: NativeApi> {
    api: A,
}

impl<A: NativeApi> Session<A> {
    /// Initialize the arena, then the symbol table.
    pub fn open(api: A) -> Rc<Self> {
        api.arena_init();
        api.sym_init();
        tracing::debug!("teide session initialized");
        Rc::new(Self { api })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn intern(&self, name: &str) -> NativeResult<i64> {
        Ok(self.api.sym_intern(&c_name(name)?))
    }

    /// Load a CSV file into an owned table.
    pub fn read_csv(self: &Rc<Self>, path: &Path) -> NativeResult<Table<A>> {
        let c_path = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| NativeError::InvalidName(path.display().to_string()))?;
        let raw = check("td_read_csv", self.api.read_csv(&c_path))?;
        let table = Table {
            session: Rc::clone(self),
            raw,
            path: path.to_path_buf(),
        };
        tracing::debug!(path = %path.display(), rows = table.nrows(), "teide table loaded");
        Ok(table)
    }
}

impl<A: NativeApi> Drop for Session<A> {
    fn drop(&mut self) {
        // Symbol table first, arena last.
        unsafe {
            self.api.sym_destroy();
            self.api.arena_destroy_all();
        }
        tracing::debug!("teide session destroyed");
    }
}

pub(crate) fn c_name(name: &str) -> NativeResult<CString> {
    CString::new(name).map_err(|_| NativeError::InvalidName(name.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────────
// Tables and columns
// ────────────────────────────────────────────────────────────────────────────────

/// A loaded table. Released when dropped.
pub struct Table<A: NativeApi> {
    session: Rc<Session<A>>,
    raw: RawHandle,
    path: PathBuf,
}

impl<A: NativeApi> Table<A> {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Rc<Session<A>> {
        &self.session
    }

    pub fn nrows(&self) -> i64 {
        unsafe { self.session.api.table_nrows(self.raw) }
    }

    /// Borrow a column vector by name. The table keeps ownership.
    pub fn column(&self, name: &str) -> NativeResult<Column<'_>> {
        let sym = self.session.intern(name)?;
        let raw = unsafe { self.session.api.table_get_col(self.raw, sym) };
        if raw.is_null() || raw.is_sentinel() {
            return Err(NativeError::UnknownColumn(name.to_string()));
        }
        Ok(Column {
            raw,
            _table: PhantomData,
        })
    }
}

impl<A: NativeApi> Drop for Table<A> {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "releasing teide table");
        unsafe { self.session.api.release(self.raw) }
    }
}

impl<A: NativeApi> fmt::Debug for Table<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("raw", &self.raw)
            .field("path", &self.path)
            .finish()
    }
}

/// A column vector owned by a [`Table`] that outlives `'t`.
#[derive(Debug, Clone, Copy)]
pub struct Column<'t> {
    raw: RawHandle,
    _table: PhantomData<&'t ()>,
}

impl Column<'_> {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Execution results
// ────────────────────────────────────────────────────────────────────────────────

/// A heap-resident engine object released exactly once, on drop.
pub struct Owned<A: NativeApi> {
    session: Rc<Session<A>>,
    raw: RawHandle,
}

impl<A: NativeApi> Owned<A> {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn nrows(&self) -> i64 {
        unsafe { self.session.api.table_nrows(self.raw) }
    }
}

impl<A: NativeApi> Drop for Owned<A> {
    fn drop(&mut self) {
        tracing::trace!(raw = self.raw.0, "releasing teide result");
        unsafe { self.session.api.release(self.raw) }
    }
}

/// What `execute` hands back.
pub enum Handle<A: NativeApi> {
    /// A sentinel value; nothing to release.
    Borrowed(RawHandle),
    Owned(Owned<A>),
}

impl<A: NativeApi> Handle<A> {
    /// Classify a non-null execution result.
    pub(crate) fn from_result(session: &Rc<Session<A>>, raw: RawHandle) -> Self {
        if raw.is_sentinel() {
            Handle::Borrowed(raw)
        } else {
            Handle::Owned(Owned {
                session: Rc::clone(session),
                raw,
            })
        }
    }

    pub fn raw(&self) -> RawHandle {
        match self {
            Handle::Borrowed(raw) => *raw,
            Handle::Owned(owned) => owned.raw,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Handle::Owned(_))
    }

    /// Row count of a materialized table result; zero for a sentinel.
    pub fn nrows(&self) -> i64 {
        match self {
            Handle::Borrowed(_) => 0,
            Handle::Owned(owned) => owned.nrows(),
        }
    }
}

impl<A: NativeApi> fmt::Debug for Handle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Borrowed(raw) => f.debug_tuple("Borrowed").field(raw).finish(),
            Handle::Owned(owned) => f.debug_tuple("Owned").field(&owned.raw).finish(),
        }
    }
}
