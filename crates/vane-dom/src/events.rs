//! Element Events
//!
//! Event payload and identity-carrying handlers, plus the synthetic
//! event names the binding lifecycle listens to.

use std::fmt;
use std::rc::Rc;

use vane_observe::Value;

/// Synthetic event dispatched when an element attribute changes value.
pub const ATTRIBUTES_EVENT: &str = "attributes";

/// Synthetic event dispatched when an element leaves the document.
pub const REMOVED_EVENT: &str = "removed";

/// An event delivered to element listeners.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    /// Set on `attributes` events: which attribute changed.
    pub attribute_name: Option<String>,
    /// Previous attribute value on `attributes` events.
    pub old_value: Option<String>,
    /// Payload for value-carrying events (key changes on maps).
    pub value: Value,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute_name: None,
            old_value: None,
            value: Value::Undefined,
        }
    }

    /// An `attributes` event for one changed attribute.
    pub fn attribute_changed(attribute: &str, old_value: Option<&str>) -> Self {
        Self {
            name: ATTRIBUTES_EVENT.to_string(),
            attribute_name: Some(attribute.to_string()),
            old_value: old_value.map(|s| s.to_string()),
            value: Value::Undefined,
        }
    }

    /// A `removed` event.
    pub fn removed() -> Self {
        Self::new(REMOVED_EVENT)
    }

    pub fn with_value(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            attribute_name: None,
            old_value: None,
            value,
        }
    }
}

/// A listener with stable identity so it can be removed again.
#[derive(Clone)]
pub struct EventHandler {
    f: Rc<dyn Fn(&Event)>,
}

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn call(&self, event: &Event) {
        (self.f)(event);
    }

    /// Identity comparison; clones of one handler are the same.
    pub fn same(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_changed_event() {
        let event = Event::attribute_changed("value:to", Some("old"));
        assert_eq!(event.name, ATTRIBUTES_EVENT);
        assert_eq!(event.attribute_name.as_deref(), Some("value:to"));
        assert_eq!(event.old_value.as_deref(), Some("old"));
    }

    #[test]
    fn test_handler_identity() {
        let a = EventHandler::new(|_| {});
        let b = a.clone();
        assert!(a.same(&b));
        assert!(!a.same(&EventHandler::new(|_| {})));
    }
}
