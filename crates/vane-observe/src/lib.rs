//! Vane Observe - Observable Values
//!
//! Value model, observable capability trait and mutation-dependency
//! recording used by the binding engine.

mod deps;
mod map;
mod observable;
mod value;

pub use deps::{DependencyRecorder, GraphRecorder, NoopRecorder};
pub use map::ObservableMap;
pub use observable::{ObservableRef, ObservableValue, SettableObservable, SimpleObservable, Updater};
pub use value::{NativeFunction, Opaque, Value};

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an observable entity (a map, an element, a value handle).
///
/// Used by the dependency recorder to name graph nodes without holding
/// references to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh identity.
    pub fn next() -> EntityId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EntityId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}
