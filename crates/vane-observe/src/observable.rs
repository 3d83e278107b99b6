//! Observable Capability
//!
//! The uniform gettable/settable/subscribable surface every bindable
//! source exposes, plus the two concrete value observables.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::{EntityId, Value};

/// A change listener with stable identity so it can be unsubscribed.
#[derive(Clone)]
pub struct Updater {
    label: Rc<str>,
    f: Rc<dyn Fn(Value)>,
}

impl Updater {
    pub fn new(label: &str, f: impl Fn(Value) + 'static) -> Self {
        Self {
            label: label.into(),
            f: Rc::new(f),
        }
    }

    /// A listener that ignores every notification. Used to keep a
    /// subscription alive without reacting to it.
    pub fn noop(label: &str) -> Self {
        Self::new(label, |_| {})
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(&self, value: Value) {
        (self.f)(value);
    }

    /// Identity comparison; two clones of one updater are the same.
    pub fn same(&self, other: &Updater) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Updater({})", self.label)
    }
}

/// Capability surface for anything a binding can read, write or watch.
///
/// `is_settable` false means `set` is a no-op; `is_live` false means the
/// value is static and `on_value`/`off_value` are no-ops.
pub trait ObservableValue {
    fn id(&self) -> EntityId;

    fn get(&self) -> Value;

    fn is_settable(&self) -> bool {
        true
    }

    fn set(&self, value: Value);

    fn is_live(&self) -> bool {
        true
    }

    fn on_value(&self, updater: Updater);

    fn off_value(&self, updater: &Updater);

    /// True when the current value is derived from other observables.
    fn has_dependencies(&self) -> bool {
        false
    }

    /// Scheduling hint forwarded from template nesting depth.
    fn set_priority(&self, _priority: u32) {}
}

pub type ObservableRef = Rc<dyn ObservableValue>;

/// Listener bookkeeping shared by the concrete observables.
#[derive(Default)]
pub(crate) struct ListenerList {
    listeners: RefCell<Vec<Updater>>,
}

impl ListenerList {
    pub fn add(&self, updater: Updater) {
        self.listeners.borrow_mut().push(updater);
    }

    pub fn remove(&self, updater: &Updater) {
        self.listeners.borrow_mut().retain(|u| !u.same(updater));
    }

    pub fn notify(&self, value: &Value) {
        // Snapshot so listeners may subscribe/unsubscribe reentrantly.
        let snapshot: Vec<Updater> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener.call(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// A single mutable value with change notification.
#[derive(Clone)]
pub struct SimpleObservable {
    inner: Rc<SimpleInner>,
}

struct SimpleInner {
    id: EntityId,
    value: RefCell<Value>,
    listeners: ListenerList,
    priority: Cell<u32>,
}

impl SimpleObservable {
    pub fn new(value: Value) -> Self {
        Self {
            inner: Rc::new(SimpleInner {
                id: EntityId::next(),
                value: RefCell::new(value),
                listeners: ListenerList::default(),
                priority: Cell::new(0),
            }),
        }
    }

    pub fn handle(&self) -> ObservableRef {
        Rc::new(self.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl Default for SimpleObservable {
    fn default() -> Self {
        Self::new(Value::Undefined)
    }
}

impl ObservableValue for SimpleObservable {
    fn id(&self) -> EntityId {
        self.inner.id
    }

    fn get(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value.clone();
                true
            }
        };
        if changed {
            tracing::trace!(id = self.inner.id.raw(), ?value, "observable changed");
            self.inner.listeners.notify(&value);
        }
    }

    fn on_value(&self, updater: Updater) {
        self.inner.listeners.add(updater);
    }

    fn off_value(&self, updater: &Updater) {
        self.inner.listeners.remove(updater);
    }

    fn set_priority(&self, priority: u32) {
        self.inner.priority.set(priority);
    }
}

impl fmt::Debug for SimpleObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimpleObservable(#{})", self.inner.id.raw())
    }
}

/// An observable whose writes are routed through a setter.
///
/// The setter receives the proposed value and the backing observable and
/// decides what actually gets stored, which lets it coerce or reject the
/// proposal. Reports `has_dependencies` because its value is not a plain
/// stored cell.
#[derive(Clone)]
pub struct SettableObservable {
    inner: Rc<SettableInner>,
}

struct SettableInner {
    id: EntityId,
    current: SimpleObservable,
    setter: Box<dyn Fn(Value, &SimpleObservable)>,
}

impl SettableObservable {
    pub fn new(initial: Value, setter: impl Fn(Value, &SimpleObservable) + 'static) -> Self {
        Self {
            inner: Rc::new(SettableInner {
                id: EntityId::next(),
                current: SimpleObservable::new(initial),
                setter: Box::new(setter),
            }),
        }
    }

    pub fn handle(&self) -> ObservableRef {
        Rc::new(self.clone())
    }
}

impl ObservableValue for SettableObservable {
    fn id(&self) -> EntityId {
        self.inner.id
    }

    fn get(&self) -> Value {
        self.inner.current.get()
    }

    fn set(&self, value: Value) {
        (self.inner.setter)(value, &self.inner.current);
    }

    fn on_value(&self, updater: Updater) {
        self.inner.current.on_value(updater);
    }

    fn off_value(&self, updater: &Updater) {
        self.inner.current.off_value(updater);
    }

    fn has_dependencies(&self) -> bool {
        true
    }

    fn set_priority(&self, priority: u32) {
        self.inner.current.set_priority(priority);
    }
}

impl fmt::Debug for SettableObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SettableObservable(#{})", self.inner.id.raw())
    }
}
