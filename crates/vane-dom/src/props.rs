//! Attribute-or-Property Access
//!
//! Uniform get/set over an element, routing special-cased names to
//! element properties and everything else to attribute text.

use vane_observe::Value;

use crate::element::Element;

/// Names backed by element state rather than attribute text.
const PROPERTY_BACKED: &[&str] = &["value", "values", "checked", "selected", "focused"];

/// Properties whose change notification uses an event named after the
/// property itself rather than `change`.
const PROPERTY_NAMED_EVENTS: &[&str] = &["focused"];

/// The trigger event override for special properties, if any.
pub fn special_event(prop: &str) -> Option<&'static str> {
    PROPERTY_NAMED_EVENTS.iter().find(|p| **p == prop).copied()
}

pub fn is_property_backed(prop: &str) -> bool {
    PROPERTY_BACKED.contains(&prop)
}

/// Read a property, falling back to attribute text.
pub fn get(el: &Element, prop: &str) -> Value {
    if let Some(value) = el.get_property(prop) {
        return value;
    }
    match el.get_attribute(prop) {
        Some(text) => Value::String(text),
        None => Value::Undefined,
    }
}

/// Write to the element, mirroring property-backed names into their
/// attribute form where one exists.
pub fn set_attr_or_prop(el: &Element, prop: &str, value: &Value) {
    if is_property_backed(prop) {
        el.set_property(prop, value.clone());
        match prop {
            "value" => el.set_attribute("value", &value.to_attribute_string()),
            "checked" => {
                if matches!(value, Value::Bool(true)) {
                    el.set_attribute("checked", "");
                } else {
                    el.remove_attribute("checked");
                }
            }
            _ => {}
        }
        return;
    }

    match value {
        Value::Undefined | Value::Null => el.remove_attribute(prop),
        Value::Map(_) | Value::Observable(_) | Value::Function(_) | Value::Opaque(_) => {
            tracing::warn!(prop, ?value, "reflecting a non-text value into an attribute");
            el.set_attribute(prop, &value.to_attribute_string());
        }
        other => el.set_attribute(prop, &other.to_attribute_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_property_reflects_attribute() {
        let el = Element::input("text");
        set_attr_or_prop(&el, "value", &Value::from(10i64));

        assert_eq!(get(&el, "value"), Value::from(10i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("10"));
    }

    #[test]
    fn test_checked_reflection() {
        let el = Element::input("checkbox");
        set_attr_or_prop(&el, "checked", &Value::from(true));
        assert!(el.has_attribute("checked"));

        set_attr_or_prop(&el, "checked", &Value::from(false));
        assert!(!el.has_attribute("checked"));
        assert_eq!(get(&el, "checked"), Value::from(false));
    }

    #[test]
    fn test_plain_attribute_fallback() {
        let el = Element::new("div");
        set_attr_or_prop(&el, "title", &Value::from("hi"));
        assert_eq!(get(&el, "title"), Value::from("hi"));

        set_attr_or_prop(&el, "title", &Value::Undefined);
        assert_eq!(get(&el, "title"), Value::Undefined);
    }

    #[test]
    fn test_object_value_writes_placeholder_text() {
        let el = Element::new("div");
        let map = vane_observe::ObservableMap::new();
        set_attr_or_prop(&el, "data-item", &Value::Map(map));
        assert_eq!(el.get_attribute("data-item").as_deref(), Some("[object]"));
    }

    #[test]
    fn test_special_event_lookup() {
        assert_eq!(special_event("focused"), Some("focused"));
        assert_eq!(special_event("value"), None);
    }
}
