//! Safe wrapper over the Teide C engine.
//!
//! Every value the engine hands back is an untyped pointer. Values below
//! [`SENTINEL_LIMIT`] are sentinels (status codes, inert results) and are never
//! released; anything else is heap-resident and must be released exactly once.
//! The types here encode that rule:
//!
//! - [`Session`] owns the process-wide arena and symbol table.
//! - [`Table`] owns a loaded table, [`Column`] borrows one of its vectors.
//! - [`Graph`] owns operator nodes and borrows tables/columns for its lifetime.
//! - [`Plan`] is an optimized graph; [`Handle`] is what `execute` returns.

pub mod ffi;
mod graph;
mod handle;

pub use ffi::{NativeApi, RawHandle, TeideLib};
pub use graph::{Graph, Node, Plan};
pub use handle::{Column, Handle, Owned, Session, Table};

use std::path::PathBuf;

/// Pointer values below this are sentinels, never heap objects.
pub const SENTINEL_LIMIT: usize = 32;

/// Largest key or aggregation list a single node accepts.
pub const MAX_NODE_INPUTS: usize = u8::MAX as usize;

pub type NativeResult<T> = std::result::Result<T, NativeError>;

#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    #[error("TEIDE_LIB is not set")]
    LibraryUnset,
    #[error("cannot load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("missing symbol {name}: {source}")]
    Symbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("{op} returned null")]
    Null { op: &'static str },
    #[error("{op} failed with code {code}")]
    Call { op: &'static str, code: usize },
    #[error("name contains a NUL byte: {0:?}")]
    InvalidName(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("node belongs to a different graph")]
    ForeignNode,
    #[error("{op}: {count} inputs exceed the per-node limit")]
    Arity { op: &'static str, count: usize },
}

/// Classify a constructor's return value: null and sentinels are failures.
pub(crate) fn check(op: &'static str, raw: RawHandle) -> NativeResult<RawHandle> {
    if raw.is_null() {
        Err(NativeError::Null { op })
    } else if raw.is_sentinel() {
        Err(NativeError::Call { op, code: raw.0 })
    } else {
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_classifies_returns() {
        assert!(matches!(
            check("td_scan", RawHandle(0)),
            Err(NativeError::Null { op: "td_scan" })
        ));
        assert!(matches!(
            check("td_scan", RawHandle(7)),
            Err(NativeError::Call { code: 7, .. })
        ));
        assert!(matches!(
            check("td_scan", RawHandle(SENTINEL_LIMIT - 1)),
            Err(NativeError::Call { .. })
        ));
        assert_eq!(check("td_scan", RawHandle(SENTINEL_LIMIT)).unwrap(), RawHandle(32));
    }
}
