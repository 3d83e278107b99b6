//! Observable Map
//!
//! Key/value store with per-key and whole-map change notification.
//! Scope contexts and view-models are observable maps.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::observable::Updater;
use crate::{EntityId, Value};

/// A map whose key writes notify per-key and whole-map listeners.
/// Cloning shares the underlying storage; equality is identity.
#[derive(Clone)]
pub struct ObservableMap {
    inner: Rc<MapInner>,
}

struct MapInner {
    id: EntityId,
    entries: RefCell<HashMap<String, Value>>,
    key_listeners: RefCell<HashMap<String, Vec<Updater>>>,
    map_listeners: RefCell<Vec<Updater>>,
}

impl ObservableMap {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(MapInner {
                id: EntityId::next(),
                entries: RefCell::new(HashMap::new()),
                key_listeners: RefCell::new(HashMap::new()),
                map_listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn from_entries<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let map = Self::new();
        {
            let mut entries = map.inner.entries.borrow_mut();
            for (key, value) in pairs {
                entries.insert(key.to_string(), value);
            }
        }
        map
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn get(&self, key: &str) -> Value {
        self.inner
            .entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    pub fn set(&self, key: &str, value: Value) {
        let changed = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get(key) {
                Some(existing) if *existing == value => false,
                _ => {
                    entries.insert(key.to_string(), value.clone());
                    true
                }
            }
        };
        if changed {
            tracing::trace!(map = self.inner.id.raw(), key, ?value, "key changed");
            self.notify_key(key, &value);
        }
    }

    pub fn delete(&self, key: &str) {
        let removed = self.inner.entries.borrow_mut().remove(key).is_some();
        if removed {
            self.notify_key(key, &Value::Undefined);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Listen for changes to one key.
    pub fn on_key(&self, key: &str, updater: Updater) {
        self.inner
            .key_listeners
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push(updater);
    }

    pub fn off_key(&self, key: &str, updater: &Updater) {
        if let Some(list) = self.inner.key_listeners.borrow_mut().get_mut(key) {
            list.retain(|u| !u.same(updater));
        }
    }

    /// Listen for any key change; the notification value is the map itself.
    pub fn on_change(&self, updater: Updater) {
        self.inner.map_listeners.borrow_mut().push(updater);
    }

    pub fn off_change(&self, updater: &Updater) {
        self.inner.map_listeners.borrow_mut().retain(|u| !u.same(updater));
    }

    /// Read a dot-separated path, descending through nested maps.
    pub fn get_path(&self, path: &str) -> Value {
        let mut current = Value::Map(self.clone());
        for segment in path.split('.') {
            match current {
                Value::Map(map) => current = map.get(segment),
                _ => return Value::Undefined,
            }
        }
        current
    }

    /// Write a dot-separated path, creating intermediate maps as needed.
    pub fn set_path(&self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let mut map = self.clone();
        for segment in &segments[..segments.len() - 1] {
            map = match map.get(segment) {
                Value::Map(next) => next,
                Value::Undefined => {
                    let next = ObservableMap::new();
                    map.set(segment, Value::Map(next.clone()));
                    next
                }
                other => {
                    tracing::warn!(
                        path,
                        segment,
                        ?other,
                        "cannot write through non-map path segment"
                    );
                    return;
                }
            };
        }
        map.set(segments[segments.len() - 1], value);
    }

    /// The map that owns the last segment of `path`, without creating
    /// intermediates. None when an intermediate is missing or not a map.
    pub fn owner_of_path(&self, path: &str) -> Option<(ObservableMap, String)> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut map = self.clone();
        for segment in &segments[..segments.len() - 1] {
            match map.get(segment) {
                Value::Map(next) => map = next,
                _ => return None,
            }
        }
        Some((map, segments[segments.len() - 1].to_string()))
    }

    /// Shallow-copy every entry of `other` into this map.
    pub fn merge(&self, other: &ObservableMap) {
        for key in other.keys() {
            self.set(&key, other.get(&key));
        }
    }

    /// Make this map's contents equal to `value` (which must be a map):
    /// keys absent from the source are deleted, the rest overwritten.
    pub fn replace(&self, value: &Value) {
        match value {
            Value::Map(source) => {
                for key in self.keys() {
                    if !source.has(&key) {
                        self.delete(&key);
                    }
                }
                self.merge(source);
            }
            other => {
                tracing::warn!(?other, "replacing map contents with a non-map has no effect");
            }
        }
    }

    pub fn clear(&self) {
        for key in self.keys() {
            self.delete(&key);
        }
    }

    fn notify_key(&self, key: &str, value: &Value) {
        let key_snapshot: Vec<Updater> = self
            .inner
            .key_listeners
            .borrow()
            .get(key)
            .map(|l| l.to_vec())
            .unwrap_or_default();
        for listener in key_snapshot {
            listener.call(value.clone());
        }

        let map_snapshot: Vec<Updater> = self.inner.map_listeners.borrow().clone();
        for listener in map_snapshot {
            listener.call(Value::Map(self.clone()));
        }
    }
}

impl Default for ObservableMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ObservableMap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableMap(#{})", self.inner.id.raw())
    }
}
