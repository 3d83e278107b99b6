//! Scope Chain
//!
//! A stack of observable-map contexts. Reads climb the chain; writes go
//! to the context that already owns the key, else the root context.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use vane_observe::{EntityId, ObservableMap, ObservableRef, ObservableValue, Updater, Value};

use crate::expression::KeyPath;

/// Result of reading a path off the scope chain.
#[derive(Debug, Clone)]
pub struct ScopeRead {
    pub value: Value,
    /// The map that owns the final key, when it resolved.
    pub owner: Option<ObservableMap>,
    pub key: Option<String>,
}

impl ScopeRead {
    fn miss() -> Self {
        Self {
            value: Value::Undefined,
            owner: None,
            key: None,
        }
    }
}

/// One level of the scope chain. Cloning shares the level.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    context: ObservableMap,
    parent: Option<Scope>,
    special: bool,
}

impl Scope {
    pub fn root(context: ObservableMap) -> Scope {
        Scope {
            inner: Rc::new(ScopeInner {
                context,
                parent: None,
                special: false,
            }),
        }
    }

    /// Push a child context. Special contexts hold injected values
    /// (`element`, `event`, ...) and are skipped as write targets.
    pub fn add(&self, context: ObservableMap, special: bool) -> Scope {
        Scope {
            inner: Rc::new(ScopeInner {
                context,
                parent: Some(self.clone()),
                special,
            }),
        }
    }

    pub fn context(&self) -> &ObservableMap {
        &self.inner.context
    }

    /// Read a path, climbing the chain until a context owns its first
    /// segment.
    pub fn read(&self, path: &KeyPath) -> ScopeRead {
        if path.is_context() {
            let context = self.nearest_regular_context();
            return ScopeRead {
                value: Value::Map(context),
                owner: None,
                key: None,
            };
        }
        let Some(first) = path.first() else {
            return ScopeRead::miss();
        };

        let mut level = Some(self.clone());
        while let Some(scope) = level {
            if scope.inner.context.has(first) {
                let joined = path.joined();
                let value = scope.inner.context.get_path(&joined);
                let (owner, key) = match scope.inner.context.owner_of_path(&joined) {
                    Some((owner, key)) => (Some(owner), Some(key)),
                    None => (None, None),
                };
                return ScopeRead { value, owner, key };
            }
            level = scope.inner.parent.clone();
        }
        ScopeRead::miss()
    }

    /// Convenience read of a dotted path string.
    pub fn get(&self, path: &str) -> Value {
        self.read(&KeyPath::parse(path)).value
    }

    /// Write a path into the owning context, or the root context when no
    /// level owns it yet.
    pub fn set(&self, path: &KeyPath, value: Value) {
        let (context, _) = self.data_for_set(path);
        context.set_path(&path.joined(), value);
    }

    /// Where a `set` of `path` would land: the owning map and key.
    pub fn data_for_set(&self, path: &KeyPath) -> (ObservableMap, String) {
        let first = match path.first() {
            Some(first) => first.to_string(),
            None => return (self.nearest_regular_context(), String::new()),
        };

        let mut level = Some(self.clone());
        while let Some(scope) = level {
            if !scope.inner.special && scope.inner.context.has(&first) {
                let joined = path.joined();
                return scope
                    .inner
                    .context
                    .owner_of_path(&joined)
                    .unwrap_or((scope.inner.context.clone(), joined));
            }
            level = scope.inner.parent.clone();
        }

        (self.root_context(), path.joined())
    }

    /// A live read/write handle on a scope path, bound to the context
    /// that owns it at creation time.
    pub fn key_observable(&self, path: &KeyPath) -> ObservableRef {
        let first = path.first().unwrap_or_default().to_string();

        let mut context = self.root_context();
        let mut level = Some(self.clone());
        while let Some(scope) = level {
            if !scope.inner.special && scope.inner.context.has(&first) {
                context = scope.inner.context.clone();
                break;
            }
            level = scope.inner.parent.clone();
        }

        Rc::new(ScopeKeyObservable {
            id: EntityId::next(),
            context,
            path: path.joined(),
            first,
            translations: RefCell::new(Vec::new()),
        })
    }

    fn nearest_regular_context(&self) -> ObservableMap {
        let mut level = Some(self.clone());
        while let Some(scope) = level {
            if !scope.inner.special {
                return scope.inner.context.clone();
            }
            level = scope.inner.parent.clone();
        }
        self.inner.context.clone()
    }

    fn root_context(&self) -> ObservableMap {
        let mut scope = self.clone();
        loop {
            let parent = scope.inner.parent.clone();
            match parent {
                Some(next) => scope = next,
                None => return scope.inner.context.clone(),
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope({:?}{})",
            self.inner.context,
            if self.inner.special { ", special" } else { "" }
        )
    }
}

/// Read/write handle on one scope path. Subscription listens on the
/// owning context's first segment and re-reads the full path.
struct ScopeKeyObservable {
    id: EntityId,
    context: ObservableMap,
    path: String,
    first: String,
    translations: RefCell<Vec<(Updater, Updater)>>,
}

impl ObservableValue for ScopeKeyObservable {
    fn id(&self) -> EntityId {
        self.id
    }

    fn get(&self) -> Value {
        self.context.get_path(&self.path)
    }

    fn set(&self, value: Value) {
        self.context.set_path(&self.path, value);
    }

    fn on_value(&self, updater: Updater) {
        let context = self.context.clone();
        let path = self.path.clone();
        let outer = updater.clone();
        let translation = Updater::new("scope-key", move |_| {
            outer.call(context.get_path(&path));
        });
        self.context.on_key(&self.first, translation.clone());
        self.translations.borrow_mut().push((updater, translation));
    }

    fn off_value(&self, updater: &Updater) {
        let mut translations = self.translations.borrow_mut();
        if let Some(index) = translations.iter().position(|(u, _)| u.same(updater)) {
            let (_, translation) = translations.remove(index);
            self.context.off_key(&self.first, &translation);
        }
    }

    fn has_dependencies(&self) -> bool {
        true
    }
}
