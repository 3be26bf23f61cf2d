//! Shared, scoped access to the simulation graph.
//!
//! All agents run on one thread, so the graph lives behind `Rc<RefCell<_>>`.
//! Borrows are scoped guards: they are released when the guard drops and must
//! never be held across a suspension point.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::backend::RawGraph;
use crate::network::Graph;

/// Owned graph trait object.
pub type DynGraph = dyn Graph + 'static;

/// Reference-counted handle to the graph shared by a simulation.
#[derive(Clone)]
pub struct SharedGraph {
    inner: Rc<RefCell<Box<DynGraph>>>,
}

impl SharedGraph {
    pub fn new(graph: impl Graph + 'static) -> Self {
        Self::from_boxed(Box::new(graph))
    }

    pub fn from_boxed(graph: Box<DynGraph>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(graph)),
        }
    }

    /// Scoped read access.
    pub fn handle(&self) -> Ref<'_, DynGraph> {
        Ref::map(self.inner.borrow(), |graph| graph.as_ref())
    }

    /// Scoped write access.
    pub fn handle_mut(&self) -> RefMut<'_, DynGraph> {
        RefMut::map(self.inner.borrow_mut(), |graph| graph.as_mut())
    }

    /// Snapshot detached from the live graph.
    pub fn handle_copy(&self) -> Box<DynGraph> {
        self.inner.borrow().boxed_clone()
    }

    /// Hands the raw back-end representation to an analysis function.
    pub fn apply<R>(&self, func: impl FnOnce(RawGraph<'_>) -> R) -> R {
        let graph = self.inner.borrow();
        func(graph.raw())
    }

    /// Runs a closure against the graph.
    pub fn with<R>(&self, func: impl FnOnce(&DynGraph) -> R) -> R {
        let graph = self.handle();
        func(&*graph)
    }

    /// Runs a mutating closure against the graph.
    pub fn with_mut<R>(&self, func: impl FnOnce(&mut DynGraph) -> R) -> R {
        let mut graph = self.handle_mut();
        func(&mut *graph)
    }

    /// Whether both handles point at the same graph.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(graph) => fmt::Debug::fmt(&**graph, f),
            Err(_) => f.write_str("SharedGraph(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SparseGraph;

    #[test]
    fn test_copy_is_detached() {
        let shared = SharedGraph::new(SparseGraph::undirected(0));
        shared.with_mut(|graph| graph.add_node().map(|_| ())).unwrap();
        let copy = shared.handle_copy();
        shared.with_mut(|graph| graph.add_node().map(|_| ())).unwrap();
        assert_eq!(copy.number_of_nodes(), 1);
        assert_eq!(shared.handle().number_of_nodes(), 2);
    }

    #[test]
    fn test_apply_exposes_raw_representation() {
        let shared = SharedGraph::new(SparseGraph::directed(0));
        let directed = shared.apply(|raw| match raw {
            RawGraph::Adjacency { predecessors, .. } => predecessors.is_some(),
            RawGraph::Matrix { .. } => false,
        });
        assert!(directed);
    }
}
