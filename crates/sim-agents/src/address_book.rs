//! Address Book
//!
//! Maps agent ids to live mailbox endpoints, namespaced by the kind of id:
//! integer node ids live in the `node` book, service names in `main`.

use std::collections::HashMap;
use std::hash::Hash;

use sim_graph::NodeId;

use crate::error::AddressingError;
use crate::id::AgentId;
use crate::mailbox::Endpoint;

/// One namespace of bindings.
#[derive(Debug)]
pub struct AddressBook<K> {
    bindings: HashMap<K, Endpoint>,
}

impl<K> Default for AddressBook<K> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> AddressBook<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `endpoint`.
    ///
    /// Rebinding to the same mailbox is a no-op; binding over a different
    /// live mailbox is refused. Bindings whose mailbox has closed count as
    /// absent.
    pub fn register(&mut self, key: K, endpoint: Endpoint) -> Result<(), AddressingError> {
        if let Some(existing) = self.bindings.get(&key) {
            if existing.same_mailbox(&endpoint) {
                return Ok(());
            }
            if !existing.is_closed() {
                return Err(AddressingError::RebindRefused(endpoint.owner().clone()));
            }
        }
        self.bindings.insert(key, endpoint);
        Ok(())
    }

    /// Removes a binding; absent keys are ignored.
    pub fn unregister(&mut self, key: &K) -> Option<Endpoint> {
        self.bindings.remove(key)
    }

    /// Live endpoint for `key`, if any.
    pub fn lookup(&self, key: &K) -> Option<Endpoint> {
        self.bindings
            .get(key)
            .filter(|endpoint| !endpoint.is_closed())
            .cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Keys with live bindings.
    pub fn keys(&self) -> Vec<K> {
        self.bindings
            .iter()
            .filter(|(_, endpoint)| !endpoint.is_closed())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Live endpoints, in no particular order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.bindings
            .values()
            .filter(|endpoint| !endpoint.is_closed())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// The two namespaces of a simulation, routed by id type.
#[derive(Debug, Default)]
pub struct SimulationAddressBook {
    node: AddressBook<NodeId>,
    main: AddressBook<String>,
}

impl SimulationAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &AgentId, endpoint: Endpoint) -> Result<(), AddressingError> {
        match id {
            AgentId::Node(node) => self.node.register(*node, endpoint),
            AgentId::Service(name) => self.main.register(name.clone(), endpoint),
        }
    }

    pub fn unregister(&mut self, id: &AgentId) -> Option<Endpoint> {
        match id {
            AgentId::Node(node) => self.node.unregister(node),
            AgentId::Service(name) => self.main.unregister(name),
        }
    }

    /// Live endpoint for `id`, failing with [`AddressingError::NotFound`].
    pub fn resolve(&self, id: &AgentId) -> Result<Endpoint, AddressingError> {
        let found = match id {
            AgentId::Node(node) => self.node.lookup(node),
            AgentId::Service(name) => self.main.lookup(name),
        };
        found.ok_or_else(|| AddressingError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.resolve(id).is_ok()
    }

    /// Node ids with live mailboxes, ascending.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.node.keys();
        nodes.sort_unstable();
        nodes
    }

    pub fn services(&self) -> Vec<String> {
        let mut names = self.main.keys();
        names.sort();
        names
    }

    /// Every live endpoint across both namespaces.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = self.node.endpoints();
        endpoints.extend(self.main.endpoints());
        endpoints
    }

    pub fn node_book(&self) -> &AddressBook<NodeId> {
        &self.node
    }

    pub fn main_book(&self) -> &AddressBook<String> {
        &self.main
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Mailbox;

    #[test]
    fn test_rebinding_rules() {
        let mut book = SimulationAddressBook::new();
        let id = AgentId::Node(1);
        let first = Mailbox::new(id.clone());
        let second = Mailbox::new(id.clone());

        book.register(&id, first.endpoint()).unwrap();
        book.register(&id, first.endpoint()).unwrap();
        assert_eq!(
            book.register(&id, second.endpoint()),
            Err(AddressingError::RebindRefused(id.clone()))
        );
    }

    #[test]
    fn test_closed_binding_counts_as_absent() {
        let mut book = SimulationAddressBook::new();
        let id = AgentId::service("clock");
        let mailbox = Mailbox::new(id.clone());
        book.register(&id, mailbox.endpoint()).unwrap();
        assert!(book.contains(&id));
        drop(mailbox);
        assert_eq!(book.resolve(&id).unwrap_err(), AddressingError::NotFound(id.clone()));

        let replacement = Mailbox::new(id.clone());
        book.register(&id, replacement.endpoint()).unwrap();
        assert!(book.contains(&id));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let mut book = SimulationAddressBook::new();
        let node = Mailbox::new(AgentId::Node(0));
        let service = Mailbox::new(AgentId::service("0"));
        book.register(&AgentId::Node(0), node.endpoint()).unwrap();
        book.register(&AgentId::service("0"), service.endpoint()).unwrap();
        assert_eq!(book.live_nodes(), vec![0]);
        assert_eq!(book.services(), vec!["0".to_string()]);
        book.unregister(&AgentId::Node(7));
    }
}
