//! Mutation-Dependency Recording
//!
//! Optional observability side-channel: the binding engine reports who
//! mutates what, tooling decides whether to keep it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::EntityId;

/// Records "source mutates target" edges. Injected into the binding
/// engine; the default implementation drops everything.
pub trait DependencyRecorder {
    /// `target`'s `key` is mutated by `source`.
    fn record_key_mutation(&self, target: EntityId, key: &str, source: EntityId);

    /// `target` (a value handle) is mutated by `source` (another handle).
    fn record_value_mutation(&self, target: EntityId, source: EntityId);
}

/// Recorder that drops every edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl DependencyRecorder for NoopRecorder {
    fn record_key_mutation(&self, _target: EntityId, _key: &str, _source: EntityId) {}

    fn record_value_mutation(&self, _target: EntityId, _source: EntityId) {}
}

/// Recorder that keeps an in-memory mutation graph for devtools and tests.
#[derive(Debug, Default)]
pub struct GraphRecorder {
    key_mutations: RefCell<HashMap<(EntityId, String), HashSet<EntityId>>>,
    value_mutations: RefCell<HashMap<EntityId, HashSet<EntityId>>>,
}

impl GraphRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles recorded as mutating `target`'s `key`.
    pub fn key_mutators(&self, target: EntityId, key: &str) -> HashSet<EntityId> {
        self.key_mutations
            .borrow()
            .get(&(target, key.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Handles recorded as mutating the value of `target`.
    pub fn value_mutators(&self, target: EntityId) -> HashSet<EntityId> {
        self.value_mutations
            .borrow()
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_key_mutated_by(&self, target: EntityId, key: &str, source: EntityId) -> bool {
        self.key_mutators(target, key).contains(&source)
    }

    pub fn is_value_mutated_by(&self, target: EntityId, source: EntityId) -> bool {
        self.value_mutators(target).contains(&source)
    }
}

impl DependencyRecorder for GraphRecorder {
    fn record_key_mutation(&self, target: EntityId, key: &str, source: EntityId) {
        self.key_mutations
            .borrow_mut()
            .entry((target, key.to_string()))
            .or_default()
            .insert(source);
    }

    fn record_value_mutation(&self, target: EntityId, source: EntityId) {
        self.value_mutations
            .borrow_mut()
            .entry(target)
            .or_default()
            .insert(source);
    }
}
