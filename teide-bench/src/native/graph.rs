use super::ffi::{NativeApi, RawHandle};
use super::handle::{c_name, Column, Handle, Session, Table};
use super::{check, NativeError, NativeResult, MAX_NODE_INPUTS};
use std::marker::PhantomData;
use std::rc::Rc;

/// An operator node inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    graph: RawHandle,
    raw: RawHandle,
}

impl Node {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

/// An operator graph bound to a source table.
///
/// Tables and columns referenced through `const_table` / `const_vec` are
/// borrowed for `'t`; freeing the graph never releases them.
pub struct Graph<'t, A: NativeApi> {
    session: Rc<Session<A>>,
    raw: RawHandle,
    _inputs: PhantomData<&'t Table<A>>,
}

impl<'t, A: NativeApi> Graph<'t, A> {
    pub fn new(source: &'t Table<A>) -> NativeResult<Self> {
        let session = Rc::clone(source.session());
        let raw = check("td_graph_new", unsafe {
            session.api().graph_new(source.raw())
        })?;
        tracing::trace!(graph = raw.0, "teide graph created");
        Ok(Self {
            session,
            raw,
            _inputs: PhantomData,
        })
    }

    fn node(&self, op: &'static str, raw: RawHandle) -> NativeResult<Node> {
        Ok(Node {
            graph: self.raw,
            raw: check(op, raw)?,
        })
    }

    fn own(&self, node: Node) -> NativeResult<RawHandle> {
        if node.graph == self.raw {
            Ok(node.raw)
        } else {
            Err(NativeError::ForeignNode)
        }
    }

    fn own_all(&self, op: &'static str, nodes: &[Node]) -> NativeResult<Vec<RawHandle>> {
        if nodes.len() > MAX_NODE_INPUTS {
            return Err(NativeError::Arity {
                op,
                count: nodes.len(),
            });
        }
        nodes.iter().map(|n| self.own(*n)).collect()
    }

    /// Column reference by name on the graph's source table.
    pub fn scan(&mut self, column: &str) -> NativeResult<Node> {
        let name = c_name(column)?;
        let raw = unsafe { self.session.api().scan(self.raw, &name) };
        self.node("td_scan", raw)
    }

    pub fn const_table(&mut self, table: &'t Table<A>) -> NativeResult<Node> {
        let raw = unsafe { self.session.api().const_table(self.raw, table.raw()) };
        self.node("td_const_table", raw)
    }

    pub fn const_vec(&mut self, column: Column<'t>) -> NativeResult<Node> {
        let raw = unsafe { self.session.api().const_vec(self.raw, column.raw()) };
        self.node("td_const_vec", raw)
    }

    /// `ops[i]` aggregates `inputs[i]`.
    pub fn group(&mut self, keys: &[Node], ops: &[u16], inputs: &[Node]) -> NativeResult<Node> {
        let keys = self.own_all("td_group", keys)?;
        let inputs = self.own_all("td_group", inputs)?;
        if ops.len() != inputs.len() {
            return Err(NativeError::Arity {
                op: "td_group",
                count: ops.len(),
            });
        }
        let raw = unsafe { self.session.api().group(self.raw, &keys, ops, &inputs) };
        self.node("td_group", raw)
    }

    /// `descending[i]` is the direction of `keys[i]`.
    pub fn sort(&mut self, table: Node, keys: &[Node], descending: &[bool]) -> NativeResult<Node> {
        let table = self.own(table)?;
        let keys = self.own_all("td_sort_op", keys)?;
        if descending.len() != keys.len() {
            return Err(NativeError::Arity {
                op: "td_sort_op",
                count: descending.len(),
            });
        }
        let flags: Vec<u8> = descending.iter().map(|d| u8::from(*d)).collect();
        let raw = unsafe { self.session.api().sort_op(self.raw, table, &keys, &flags) };
        self.node("td_sort_op", raw)
    }

    pub fn join(
        &mut self,
        left: Node,
        left_keys: &[Node],
        right: Node,
        right_keys: &[Node],
        kind: u8,
    ) -> NativeResult<Node> {
        let left = self.own(left)?;
        let right = self.own(right)?;
        let left_keys = self.own_all("td_join", left_keys)?;
        let right_keys = self.own_all("td_join", right_keys)?;
        if left_keys.len() != right_keys.len() {
            return Err(NativeError::Arity {
                op: "td_join",
                count: right_keys.len(),
            });
        }
        let raw = unsafe {
            self.session
                .api()
                .join(self.raw, left, &left_keys, right, &right_keys, kind)
        };
        self.node("td_join", raw)
    }

    /// Run the optimizer once. The graph can only be executed through the
    /// returned plan, so a second optimization pass is impossible.
    pub fn optimize(self, root: Node) -> NativeResult<Plan<'t, A>> {
        let root = self.own(root)?;
        let raw = unsafe { self.session.api().optimize(self.raw, root) };
        // On failure `self` drops here and frees the graph.
        let root = check("td_optimize", raw)?;
        Ok(Plan { graph: self, root })
    }
}

impl<A: NativeApi> Drop for Graph<'_, A> {
    fn drop(&mut self) {
        tracing::trace!(graph = self.raw.0, "freeing teide graph");
        unsafe { self.session.api().graph_free(self.raw) }
    }
}

/// An optimized graph ready for repeated execution.
pub struct Plan<'t, A: NativeApi> {
    graph: Graph<'t, A>,
    root: RawHandle,
}

impl<A: NativeApi> Plan<'_, A> {
    /// Execute once. An owned result is released when the handle drops.
    pub fn execute(&self) -> NativeResult<Handle<A>> {
        let raw = unsafe { self.graph.session.api().execute(self.graph.raw, self.root) };
        if raw.is_null() {
            return Err(NativeError::Null { op: "td_execute" });
        }
        Ok(Handle::from_result(&self.graph.session, raw))
    }

    pub fn root(&self) -> RawHandle {
        self.root
    }
}
