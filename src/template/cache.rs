//! Per-render node cache.
//!
//! Every key is built at most once per [`Template`](super::Template)
//! instance. A key is marked [`Slot::Building`] before its builder runs so a
//! builder that recurses back into its own key is reported instead of
//! looping. The cache lives only as long as the template instance.

use std::collections::HashMap;

use super::node::{Key, NodeRef};

/// State of one key in the cache.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// Builder is running
    Building,
    /// Builder finished
    Built(NodeRef),
}

#[derive(Debug)]
struct Attached {
    key: Key,
    node: NodeRef,
    owner: Option<Key>,
}

/// Cache of built nodes for one template instance.
#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    slots: HashMap<Key, Slot>,
    /// Keys whose builders are running, outermost first
    stack: Vec<Key>,
    /// Auxiliary nodes in insertion order, with the key being built when
    /// each was added
    attached: Vec<Attached>,
    hits: usize,
    misses: usize,
}

impl NodeCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up a key, counting hits and misses.
    pub(crate) fn get(&mut self, key: &Key) -> Option<Slot> {
        let slot = self.slots.get(key).cloned();
        match slot {
            Some(Slot::Built(_)) => self.hits += 1,
            Some(Slot::Building) => {}
            None => self.misses += 1,
        }
        slot
    }

    /// Built node for `key`, without touching statistics.
    pub(crate) fn built(&self, key: &Key) -> Option<&NodeRef> {
        match self.slots.get(key) {
            Some(Slot::Built(node)) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.slots.contains_key(key)
    }

    /// Mark `key` under construction.
    pub(crate) fn begin(&mut self, key: Key) {
        self.slots.insert(key.clone(), Slot::Building);
        self.stack.push(key);
    }

    /// Record the finished node for `key`.
    pub(crate) fn finish(&mut self, key: &Key, node: NodeRef) {
        self.stack.retain(|k| k != key);
        self.slots.insert(key.clone(), Slot::Built(node));
    }

    /// Forget a key whose builder failed, along with the nodes it attached.
    pub(crate) fn abandon(&mut self, key: &Key) {
        self.stack.retain(|k| k != key);
        self.slots.remove(key);
        let slots = &mut self.slots;
        self.attached.retain(|attached| {
            if attached.owner.as_ref() == Some(key) {
                slots.remove(&attached.key);
                false
            } else {
                true
            }
        });
    }

    /// Key whose builder is currently running, innermost.
    pub(crate) fn current(&self) -> Option<&Key> {
        self.stack.last()
    }

    /// Construction chain from the outermost builder back to `key`.
    pub(crate) fn chain_to(&self, key: &Key) -> String {
        let start = self.stack.iter().position(|k| k == key).unwrap_or(0);
        self.stack[start..]
            .iter()
            .chain(std::iter::once(key))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Store an auxiliary node that has no builder of its own. It belongs to
    /// the key currently being built.
    pub(crate) fn attach(&mut self, key: Key, node: NodeRef) {
        self.slots.insert(key.clone(), Slot::Built(node.clone()));
        let owner = self.stack.last().cloned();
        self.attached.push(Attached { key, node, owner });
    }

    /// Auxiliary nodes in insertion order.
    pub(crate) fn attached(&self) -> impl Iterator<Item = &NodeRef> {
        self.attached.iter().map(|attached| &attached.node)
    }

    /// `(hits, misses)`
    pub(crate) fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::definition::{Definition, Parameter};
    use crate::template::node::Node;
    use std::sync::Arc;

    fn node(name: &str) -> NodeRef {
        Arc::new(Node::new(Key::parameter(name), Definition::Parameter(Parameter::string())))
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let mut cache = NodeCache::new();
        let key = Key::parameter("Ip");
        assert!(cache.get(&key).is_none());
        cache.begin(key.clone());
        cache.finish(&key, node("Ip"));
        assert!(matches!(cache.get(&key), Some(Slot::Built(_))));
        assert!(matches!(cache.get(&key), Some(Slot::Built(_))));
        assert_eq!(cache.stats(), (2, 1));
    }

    #[test]
    fn test_chain_starts_at_first_occurrence() {
        let mut cache = NodeCache::new();
        cache.begin(Key::resource("Outer"));
        cache.begin(Key::resource("A"));
        cache.begin(Key::resource("B"));
        assert_eq!(
            cache.chain_to(&Key::resource("A")),
            "resource:A → resource:B → resource:A"
        );
    }

    #[test]
    fn test_abandon_clears_building_marker() {
        let mut cache = NodeCache::new();
        let key = Key::resource("A");
        cache.begin(key.clone());
        cache.abandon(&key);
        assert!(!cache.contains(&key));
        assert!(cache.current().is_none());
    }

    #[test]
    fn test_abandon_drops_nodes_attached_by_the_failed_builder() {
        let mut cache = NodeCache::new();
        let kept = Key::resource("Kept");
        cache.attach(kept.clone(), node("Kept"));

        let owner = Key::resource("Group");
        cache.begin(owner.clone());
        let rule = Key::resource("GroupSelfTCPIngress");
        cache.attach(rule.clone(), node("GroupSelfTCPIngress"));
        cache.abandon(&owner);

        assert!(!cache.contains(&rule));
        assert!(cache.contains(&kept));
        assert_eq!(cache.attached().count(), 1);
    }
}
