//! Composition order.
//!
//! A configured ranking of interceptor type names. It is consulted only when
//! an interceptor is inserted into a chain; chains are never re-sorted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use weft_core::InterceptorHandle;

/// Where interceptor types missing from the configured order are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlistedPlacement {
    /// After every listed type, in arrival order.
    #[default]
    Last,
    /// Before every listed type, in arrival order.
    First,
}

/// Precedence class of a type: lower sorts earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Before,
    Listed(usize),
    After,
}

/// Ranking of interceptor types.
#[derive(Debug, Clone, Default)]
pub struct CompositionOrder {
    types: Vec<String>,
    index: HashMap<String, usize>,
    placement: UnlistedPlacement,
}

impl CompositionOrder {
    /// Build an order from type names, earliest first.
    ///
    /// A name listed twice keeps its first position.
    #[must_use]
    pub fn new<I, S>(order: I, placement: UnlistedPlacement) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut types = Vec::new();
        let mut index = HashMap::new();
        for name in order {
            let name = name.into();
            if !index.contains_key(&name) {
                index.insert(name.clone(), types.len());
                types.push(name);
            }
        }
        Self {
            types,
            index,
            placement,
        }
    }

    /// The configured type names, earliest first.
    #[must_use]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Placement of unlisted types.
    #[must_use]
    pub fn placement(&self) -> UnlistedPlacement {
        self.placement
    }

    /// Declared position of a type, `None` if unlisted.
    #[must_use]
    pub fn index_of(&self, type_name: &str) -> Option<usize> {
        self.index.get(type_name).copied()
    }

    fn precedence(&self, type_name: &str) -> Precedence {
        match (self.index_of(type_name), self.placement) {
            (Some(i), _) => Precedence::Listed(i),
            (None, UnlistedPlacement::Last) => Precedence::After,
            (None, UnlistedPlacement::First) => Precedence::Before,
        }
    }

    /// Insertion index for a new interceptor of `type_name` in `chain`.
    ///
    /// A listed type goes before the first entry ranked at or after it, so
    /// entries of the configured order end up sorted regardless of
    /// insertion order. An unlisted type goes after every entry of its own
    /// class, i.e. unlisted types keep arrival order. Never fails: past the
    /// end means append.
    #[must_use]
    pub fn rank_for(&self, chain: &[InterceptorHandle], type_name: &str) -> usize {
        let new = self.precedence(type_name);
        let listed = matches!(new, Precedence::Listed(_));
        chain
            .iter()
            .position(|entry| {
                let existing = self.precedence(entry.type_name());
                if listed { existing >= new } else { existing > new }
            })
            .unwrap_or(chain.len())
    }

    /// Whether an interceptor of type `first` may run before one of type
    /// `second`.
    #[must_use]
    pub fn are_correctly_ordered(&self, first: &str, second: &str) -> bool {
        self.precedence(first) <= self.precedence(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_test::{CallLog, RecordingInterceptor};

    fn insert_all(order: &CompositionOrder, types: &[&str]) -> Vec<String> {
        let log = CallLog::new();
        let mut chain: Vec<InterceptorHandle> = Vec::new();
        for ty in types {
            let rank = order.rank_for(&chain, ty);
            chain.insert(rank, RecordingInterceptor::handle(*ty, &log));
        }
        chain.iter().map(|h| h.type_name().to_string()).collect()
    }

    #[test]
    fn test_rank_stability() {
        let order = CompositionOrder::new(["A", "B", "C"], UnlistedPlacement::Last);
        assert_eq!(insert_all(&order, &["C", "A", "B"]), vec!["A", "B", "C"]);
        assert_eq!(insert_all(&order, &["B", "C", "A"]), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_unlisted_last_keeps_arrival_order() {
        let order = CompositionOrder::new(["A", "B"], UnlistedPlacement::Last);
        assert_eq!(
            insert_all(&order, &["X", "B", "Y", "A"]),
            vec!["A", "B", "X", "Y"]
        );
    }

    #[test]
    fn test_unlisted_first_keeps_arrival_order() {
        let order = CompositionOrder::new(["A", "B"], UnlistedPlacement::First);
        assert_eq!(
            insert_all(&order, &["B", "X", "A", "Y"]),
            vec!["X", "Y", "A", "B"]
        );
    }

    #[test]
    fn test_empty_order_is_arrival_order() {
        let order = CompositionOrder::default();
        assert_eq!(insert_all(&order, &["Z", "Y", "X"]), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn test_same_type_goes_first() {
        let order = CompositionOrder::new(["A"], UnlistedPlacement::Last);
        let log = CallLog::new();
        let old = RecordingInterceptor::handle("A", &log);
        assert_eq!(order.rank_for(&[old], "A"), 0);
    }

    #[test]
    fn test_index_and_ordering() {
        let order = CompositionOrder::new(["A", "B", "A"], UnlistedPlacement::Last);
        assert_eq!(order.types(), &["A".to_string(), "B".to_string()]);
        assert_eq!(order.index_of("B"), Some(1));
        assert_eq!(order.index_of("Q"), None);
        assert!(order.are_correctly_ordered("A", "B"));
        assert!(!order.are_correctly_ordered("B", "A"));
        assert!(order.are_correctly_ordered("B", "Q"));
        assert!(order.are_correctly_ordered("Q", "R"));
        assert!(!order.are_correctly_ordered("Q", "A"));
    }

    #[test]
    fn test_placement_serde() {
        let p: UnlistedPlacement = serde_json::from_str("\"first\"").unwrap();
        assert_eq!(p, UnlistedPlacement::First);
        assert_eq!(UnlistedPlacement::default(), UnlistedPlacement::Last);
    }
}
