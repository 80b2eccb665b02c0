//! Insertion Order Module
//!
//! Tracks the order in which keys were stored, for oldest-first eviction.

use std::collections::VecDeque;

// == Insertion Order ==
/// Tracks insertion order for capacity eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest insertion
/// - Back = Newest insertion
///
/// Reads never reorder keys; only a (re)insertion moves a key to the back.
#[derive(Debug, Default)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Push ==
    /// Records a key as the newest insertion.
    ///
    /// An existing occurrence is dropped first, so overwriting a key
    /// counts as a fresh insertion.
    pub fn push(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Returns and removes the oldest key, or None if empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_new() {
        let order = InsertionOrder::new();
        assert!(order.is_empty());
        assert_eq!(order.len(), 0);
    }

    #[test]
    fn test_evicts_in_insertion_order() {
        let mut order = InsertionOrder::new();

        order.push("insight-LI4");
        order.push("audio-LI4");
        order.push("insight-ST36");

        assert_eq!(order.evict_oldest(), Some("insight-LI4".to_string()));
        assert_eq!(order.evict_oldest(), Some("audio-LI4".to_string()));
        assert_eq!(order.evict_oldest(), Some("insight-ST36".to_string()));
        assert_eq!(order.evict_oldest(), None);
    }

    #[test]
    fn test_reinsertion_moves_key_to_back() {
        let mut order = InsertionOrder::new();

        order.push("a");
        order.push("b");
        order.push("c");

        // Overwriting 'a' makes it the newest
        order.push("a");

        assert_eq!(order.len(), 3);
        assert_eq!(order.evict_oldest(), Some("b".to_string()));
        assert_eq!(order.evict_oldest(), Some("c".to_string()));
        assert_eq!(order.evict_oldest(), Some("a".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut order = InsertionOrder::new();

        order.push("a");
        order.push("b");
        order.push("c");
        order.remove("b");
        order.remove("nonexistent");

        assert_eq!(order.len(), 2);
        assert_eq!(order.evict_oldest(), Some("a".to_string()));
        assert_eq!(order.evict_oldest(), Some("c".to_string()));
    }

    #[test]
    fn test_clear() {
        let mut order = InsertionOrder::new();
        order.push("a");
        order.push("b");
        order.clear();
        assert!(order.is_empty());
        assert_eq!(order.evict_oldest(), None);
    }
}
