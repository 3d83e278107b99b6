//! Element Attributes
//!
//! Ordered attribute collection: get, set, remove, has.

/// A single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Attribute collection preserving insertion order.
///
/// Elements carry a handful of attributes at most, so lookups scan.
#[derive(Debug, Clone, Default)]
pub struct NamedNodeMap {
    attributes: Vec<Attr>,
}

impl NamedNodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute value. Returns the previous value, if any.
    pub fn set(&mut self, name: &str, value: &str) -> Option<String> {
        for attr in &mut self.attributes {
            if attr.name == name {
                return Some(std::mem::replace(&mut attr.value, value.to_string()));
            }
        }
        self.attributes.push(Attr::new(name, value));
        None
    }

    /// Remove an attribute. Returns the removed value, if any.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.attributes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_attribute() {
        let mut attrs = NamedNodeMap::new();
        attrs.set("class", "btn");
        attrs.set("id", "submit");

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("class"), Some("btn"));
        assert_eq!(attrs.get("id"), Some("submit"));
    }

    #[test]
    fn test_set_returns_previous_value() {
        let mut attrs = NamedNodeMap::new();
        assert_eq!(attrs.set("value", "a"), None);
        assert_eq!(attrs.set("value", "b"), Some("a".to_string()));
        assert_eq!(attrs.get("value"), Some("b"));
    }

    #[test]
    fn test_remove_attribute() {
        let mut attrs = NamedNodeMap::new();
        attrs.set("foo", "bar");

        assert!(attrs.has("foo"));
        assert_eq!(attrs.remove("foo"), Some("bar".to_string()));
        assert!(!attrs.has("foo"));
        assert_eq!(attrs.remove("foo"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut attrs = NamedNodeMap::new();
        attrs.set("b", "1");
        attrs.set("a", "2");
        assert_eq!(attrs.names(), vec!["b".to_string(), "a".to_string()]);
    }
}
