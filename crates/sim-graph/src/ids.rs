//! Dense Identifier Allocation
//!
//! Issues non-negative integer ids, recycling freed slots before extending
//! the high-water mark.

use std::collections::BTreeSet;

use crate::error::IdError;

/// Identifier of a node in the graph and of the node agent that realizes it.
pub type NodeId = usize;

/// Allocator of dense node ids.
///
/// The live ids are `0..high_water` minus the freed holes. Holes are kept
/// ordered so that [`IdentifierStore::take`] always hands out the smallest
/// free id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierStore {
    high_water: NodeId,
    holes: BTreeSet<NodeId>,
}

impl IdentifierStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the smallest id that is not currently live, consuming it.
    pub fn take(&mut self) -> NodeId {
        match self.holes.pop_first() {
            Some(id) => id,
            None => {
                let id = self.high_water;
                self.high_water += 1;
                id
            }
        }
    }

    /// Returns the id the next [`take`](Self::take) would hand out.
    pub fn peek(&self) -> NodeId {
        self.holes.first().copied().unwrap_or(self.high_water)
    }

    /// Releases a live id.
    ///
    /// Trailing holes collapse back into the high-water mark.
    pub fn free(&mut self, id: NodeId) -> Result<(), IdError> {
        if !self.is_live(id) {
            return Err(IdError::InvalidId(id));
        }
        if id + 1 == self.high_water {
            self.high_water -= 1;
            while self.high_water > 0 && self.holes.remove(&(self.high_water - 1)) {
                self.high_water -= 1;
            }
        } else {
            self.holes.insert(id);
        }
        Ok(())
    }

    /// Checks whether `id` has been taken and not freed.
    pub fn is_live(&self, id: NodeId) -> bool {
        id < self.high_water && !self.holes.contains(&id)
    }

    /// Number of live ids.
    pub fn live_count(&self) -> usize {
        self.high_water - self.holes.len()
    }

    /// One past the largest id ever live and not collapsed.
    pub fn high_water(&self) -> NodeId {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_take_is_dense() {
        let mut store = IdentifierStore::new();
        let ids: Vec<_> = (0..5).map(|_| store.take()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.live_count(), 5);
    }

    #[test]
    fn test_holes_are_reused_smallest_first() {
        let mut store = IdentifierStore::new();
        for _ in 0..6 {
            store.take();
        }
        store.free(3).unwrap();
        store.free(1).unwrap();
        assert_eq!(store.peek(), 1);
        assert_eq!(store.take(), 1);
        assert_eq!(store.take(), 3);
        assert_eq!(store.take(), 6);
    }

    #[test]
    fn test_trailing_holes_collapse() {
        let mut store = IdentifierStore::new();
        for _ in 0..5 {
            store.take();
        }
        store.free(2).unwrap();
        store.free(3).unwrap();
        store.free(4).unwrap();
        assert_eq!(store.high_water(), 2);
        assert_eq!(store.take(), 2);
    }

    #[test]
    fn test_free_rejects_unknown_ids() {
        let mut store = IdentifierStore::new();
        assert_eq!(store.free(0), Err(IdError::InvalidId(0)));
        store.take();
        store.free(0).unwrap();
        assert_eq!(store.free(0), Err(IdError::InvalidId(0)));
    }

    proptest! {
        #[test]
        fn prop_take_returns_smallest_free(ops in proptest::collection::vec((any::<bool>(), 0usize..32), 1..200)) {
            let mut store = IdentifierStore::new();
            let mut live = BTreeSet::new();
            for (take, pick) in ops {
                if take || live.is_empty() {
                    let expected = (0..).find(|i| !live.contains(i)).unwrap();
                    prop_assert_eq!(store.take(), expected);
                    live.insert(expected);
                } else {
                    let victim = *live.iter().nth(pick % live.len()).unwrap();
                    store.free(victim).unwrap();
                    live.remove(&victim);
                }
                prop_assert_eq!(store.live_count(), live.len());
            }
        }
    }
}
