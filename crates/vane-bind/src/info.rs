//! Binding Info Resolution
//!
//! Turns one binding attribute (`name="value"`) into a directional
//! description: which side is parent, which is child, which directions
//! propagate, what event triggers child reads, and whether the initial
//! parent value is forwarded as a live handle (`~` sticky marker).

use crate::tokenize::{tokenize, Keyword};

/// Where one side of a data binding reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// The template scope chain.
    Scope,
    /// The element's view-model map.
    ViewModel,
    /// The element's attributes/properties.
    Attribute,
    /// View-model when the element has one, attribute otherwise.
    /// Resolved once, when the binding's observables are created.
    ViewModelOrAttribute,
}

/// Directional description of one data binding attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub parent: BindingSource,
    pub child: BindingSource,
    /// Scope path the parent side binds to, `~` marker stripped.
    pub parent_name: String,
    /// Child-side key, exactly as written (may still carry `@`).
    pub child_name: String,
    pub parent_to_child: bool,
    pub child_to_parent: bool,
    /// After a child write, force the child back to whatever value the
    /// parent actually accepted (two-way bindings against coercing
    /// parents converge this way).
    pub sync_child_with_parent: bool,
    /// `~` marker: the child receives a live handle on the parent as its
    /// initial value instead of a snapshot.
    pub sticky_parent_to_child: bool,
    /// Event that triggers child reads, when `:on:<event>` overrode it.
    pub child_event: Option<String>,
    /// False when an `:on:` override suppresses the initial value sync.
    pub initialize_values: bool,
    pub binding_attribute_name: String,
}

impl BindingInfo {
    /// True when the child side is the whole view-model rather than one
    /// of its keys.
    pub fn is_contextual(&self) -> bool {
        self.child_name == "." || self.child_name == "this"
    }
}

/// Strip the `@` call-marker from a bound name.
pub fn clean_vm_name(name: &str) -> String {
    name.replace('@', "")
}

fn child_source(tokenized: &crate::tokenize::Tokenized, favor_view_model: bool) -> BindingSource {
    if tokenized.has_token("vm") {
        BindingSource::ViewModel
    } else if tokenized.has_token("el") {
        BindingSource::Attribute
    } else if favor_view_model {
        BindingSource::ViewModel
    } else {
        BindingSource::ViewModelOrAttribute
    }
}

/// Resolve a binding attribute into its directional description.
///
/// Returns None when the name carries no binding keyword in a usable
/// position (the keyword needs a bound name before it).
pub fn binding_info(
    attribute_name: &str,
    attribute_value: &str,
    favor_view_model: bool,
) -> Option<BindingInfo> {
    let tokenized = tokenize(attribute_name);

    // (child_to_parent, parent_to_child, sync_child_with_parent)
    let directions = [
        (Keyword::To, (true, false, false)),
        (Keyword::From, (false, true, false)),
        (Keyword::Bind, (true, true, true)),
    ];
    let (index, (child_to_parent, parent_to_child, sync_child_with_parent)) = directions
        .iter()
        .find_map(|(keyword, rule)| {
            let index = tokenized.keyword_index(*keyword)?;
            (index > 0).then_some((index, *rule))
        })?;

    let child_event = tokenized.event_after_on().map(|s| s.to_string());
    let initialize_values = child_event.is_none();

    let trimmed = attribute_value.trim();
    let sticky_parent_to_child = trimmed.starts_with('~');
    let parent_name = trimmed.trim_start_matches('~').to_string();

    Some(BindingInfo {
        parent: BindingSource::Scope,
        child: child_source(&tokenized, favor_view_model),
        parent_name,
        child_name: tokenized.tokens[index - 1].clone(),
        parent_to_child,
        child_to_parent,
        sync_child_with_parent,
        sticky_parent_to_child,
        child_event,
        initialize_values,
        binding_attribute_name: attribute_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_binding() {
        let info = binding_info("value:to", "age", false).unwrap();
        assert!(info.child_to_parent);
        assert!(!info.parent_to_child);
        assert!(!info.sync_child_with_parent);
        assert_eq!(info.child_name, "value");
        assert_eq!(info.parent_name, "age");
        assert_eq!(info.parent, BindingSource::Scope);
        assert_eq!(info.child, BindingSource::ViewModelOrAttribute);
        assert!(info.initialize_values);
    }

    #[test]
    fn test_from_binding() {
        let info = binding_info("value:from", "age", false).unwrap();
        assert!(!info.child_to_parent);
        assert!(info.parent_to_child);
    }

    #[test]
    fn test_bind_is_two_way_and_syncs() {
        let info = binding_info("value:bind", "age", false).unwrap();
        assert!(info.child_to_parent);
        assert!(info.parent_to_child);
        assert!(info.sync_child_with_parent);
    }

    #[test]
    fn test_event_override_suppresses_initialization() {
        let info = binding_info("value:to:on:input", "age", false).unwrap();
        assert_eq!(info.child_event.as_deref(), Some("input"));
        assert!(!info.initialize_values);
        assert_eq!(info.child_name, "value");
    }

    #[test]
    fn test_source_prefixes() {
        let info = binding_info("vm:value:bind", "scope1", false).unwrap();
        assert_eq!(info.child, BindingSource::ViewModel);

        let info = binding_info("el:value:bind", "scope1", false).unwrap();
        assert_eq!(info.child, BindingSource::Attribute);

        let info = binding_info("value:bind", "scope1", true).unwrap();
        assert_eq!(info.child, BindingSource::ViewModel);
    }

    #[test]
    fn test_sticky_marker_is_stripped() {
        let info = binding_info("value:from", "~age", false).unwrap();
        assert!(info.sticky_parent_to_child);
        assert_eq!(info.parent_name, "age");
    }

    #[test]
    fn test_contextual_child() {
        let info = binding_info("this:from", "item", false).unwrap();
        assert!(info.is_contextual());
        let info = binding_info(".:from", "item", false).unwrap();
        assert!(info.is_contextual());
    }

    #[test]
    fn test_keyword_needs_a_bound_name() {
        assert!(binding_info("to:", "x", false).is_none());
        assert!(binding_info("class", "x", false).is_none());
    }

    #[test]
    fn test_clean_vm_name() {
        assert_eq!(clean_vm_name("@save"), "save");
        assert_eq!(clean_vm_name("value"), "value");
    }
}
