//! Binding Lifecycle
//!
//! Element-scoped setup: walk binding attributes, build their data
//! bindings, create the view-model, complete deferred bindings, and
//! keep everything live across attribute rewrites until the element
//! leaves the document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use vane_dom::{Element, EventHandler, ATTRIBUTES_EVENT, REMOVED_EVENT};
use vane_observe::{ObservableMap, Value};
use vane_scope::Scope;

use crate::adapters::{BindingContext, ViewModelAccessor};
use crate::events::bind_event;
use crate::info::{clean_vm_name, BindingInfo, BindingSource};
use crate::sync::{make_data_binding, DataBinding, Semaphore, Teardown};
use crate::{BindError, BindingServices};

/// What kind of binding an attribute name describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeBindingKind {
    Data,
    Event,
}

/// Classify an attribute name, or None when it is not a binding.
pub fn attribute_binding_kind(attribute_name: &str) -> Option<AttributeBindingKind> {
    let data = attribute_name.ends_with(":to")
        || attribute_name.ends_with(":from")
        || attribute_name.ends_with(":bind")
        || attribute_name.contains(":to:on:")
        || attribute_name.contains(":from:on:")
        || attribute_name.contains(":bind:on:");
    if data {
        return Some(AttributeBindingKind::Data);
    }
    if attribute_name.starts_with("on:") {
        return Some(AttributeBindingKind::Event);
    }
    None
}

/// Bind one attribute of an element, whatever kind it is. Returns None
/// for attributes that are not bindings.
pub fn bind_element_attribute(
    el: &Element,
    attribute_name: &str,
    scope: &Scope,
    services: &BindingServices,
) -> Result<Option<Teardown>, BindError> {
    match attribute_binding_kind(attribute_name) {
        Some(AttributeBindingKind::Data) => {
            bind_attribute(el, attribute_name, scope, services).map(Some)
        }
        Some(AttributeBindingKind::Event) => {
            bind_event(el, attribute_name, scope, services).map(Some)
        }
        None => Ok(None),
    }
}

/// Bind a single data-binding attribute on a plain element.
///
/// The binding completes immediately (a view-model is created on demand
/// when the child side needs one), re-binds itself when the attribute is
/// rewritten, and tears down when the element leaves the document.
pub fn bind_attribute(
    el: &Element,
    attribute_name: &str,
    scope: &Scope,
    services: &BindingServices,
) -> Result<Teardown, BindError> {
    if el.prevent_data_bindings() {
        return Ok(Teardown::noop());
    }

    let semaphore = Semaphore::new();
    let get_view_model: ViewModelAccessor = {
        let el = el.clone();
        Rc::new(move || Some(el.view_model_or_create()))
    };
    let mut ctx = BindingContext::new(scope.clone(), services.clone());
    ctx.semaphore = semaphore.clone();
    ctx.get_view_model = get_view_model.clone();

    let value = el.get_attribute(attribute_name).unwrap_or_default();
    let Some(binding) = make_data_binding(attribute_name, &value, el, &ctx) else {
        return Ok(Teardown::noop());
    };
    if binding.info.child == BindingSource::ViewModel && el.view_model().is_none() {
        tracing::warn!(
            attribute = attribute_name,
            "binding to a view-model that does not exist yet, creating one"
        );
    }
    binding.complete();

    let teardown_slot = Rc::new(RefCell::new(binding.teardown.clone()));

    let attributes_handler = EventHandler::new({
        let el = el.clone();
        let scope = scope.clone();
        let services = services.clone();
        let semaphore = semaphore.clone();
        let get_view_model = get_view_model.clone();
        let teardown_slot = teardown_slot.clone();
        let attribute_name = attribute_name.to_string();
        move |event| {
            if event.attribute_name.as_deref() != Some(attribute_name.as_str()) {
                return;
            }
            let current = teardown_slot.borrow().clone();
            current.call();
            if let Some(value) = el.get_attribute(&attribute_name) {
                let mut ctx = BindingContext::new(scope.clone(), services.clone());
                ctx.semaphore = semaphore.clone();
                ctx.get_view_model = get_view_model.clone();
                ctx.initialize_values = true;
                if let Some(binding) = make_data_binding(&attribute_name, &value, &el, &ctx) {
                    binding.complete();
                    *teardown_slot.borrow_mut() = binding.teardown.clone();
                }
            }
        }
    });
    el.add_event_listener(ATTRIBUTES_EVENT, attributes_handler.clone());

    let teardown = Teardown::new({
        let el = el.clone();
        let teardown_slot = teardown_slot.clone();
        move || {
            let current = teardown_slot.borrow().clone();
            current.call();
            el.remove_event_listener(ATTRIBUTES_EVENT, &attributes_handler);
        }
    });
    {
        let teardown = teardown.clone();
        el.once(REMOVED_EVENT, move || teardown.call());
    }
    Ok(teardown)
}

/// Bind every data-binding attribute of a component element around its
/// view-model.
///
/// Bindings whose child is the view-model are deferred: their initial
/// parent values are collected first, `make_view_model` builds the map
/// from them (second argument: whether any data binding exists at all),
/// and only then do the deferred bindings complete.
///
/// With `static_data_bindings_only`, nothing happens (and no view-model
/// is created) unless at least one data binding is present.
pub fn bind_view_model<F>(
    el: &Element,
    scope: &Scope,
    make_view_model: F,
    initial_view_model_data: Option<ObservableMap>,
    static_data_bindings_only: bool,
    services: &BindingServices,
) -> Result<Option<Teardown>, BindError>
where
    F: FnOnce(Value, bool) -> ObservableMap,
{
    let semaphore = Semaphore::new();
    let vm_slot: Rc<RefCell<Option<ObservableMap>>> = Rc::new(RefCell::new(None));
    let get_view_model: ViewModelAccessor = {
        let slot = vm_slot.clone();
        Rc::new(move || slot.borrow().clone())
    };

    let initial_map = ObservableMap::new();
    if let Some(data) = &initial_view_model_data {
        initial_map.merge(data);
    }
    let mut initial_data = Value::Map(initial_map.clone());

    let teardowns: Rc<RefCell<HashMap<String, Teardown>>> = Rc::new(RefCell::new(HashMap::new()));
    let infos: Rc<RefCell<HashMap<String, BindingInfo>>> = Rc::new(RefCell::new(HashMap::new()));
    let mut deferred: Vec<DataBinding> = Vec::new();
    let mut has_data_binding = false;
    let mut is_setting_view_model = false;
    let mut is_setting_on_view_model = false;

    for attribute_name in el.attribute_names() {
        let value = el.get_attribute(&attribute_name).unwrap_or_default();
        let mut ctx = BindingContext::new(scope.clone(), services.clone());
        ctx.semaphore = semaphore.clone();
        ctx.get_view_model = get_view_model.clone();
        ctx.already_updated_child = true;
        ctx.favor_view_model = true;
        let Some(binding) = make_data_binding(&attribute_name, &value, el, &ctx) else {
            continue;
        };

        if binding.info.parent_to_child && binding.info.child == BindingSource::ViewModel {
            let conflict = if binding.info.is_contextual() {
                let conflict = is_setting_view_model || is_setting_on_view_model;
                is_setting_view_model = true;
                conflict
            } else {
                is_setting_on_view_model = true;
                is_setting_view_model
            };
            if conflict {
                binding.teardown.call();
                for teardown in teardowns.borrow().values() {
                    teardown.call();
                }
                return Err(BindError::ConflictingBindings);
            }
        }
        has_data_binding = true;

        if binding.is_deferred()
            && binding.info.parent_to_child
            && !binding.initial_value.is_undefined()
        {
            if binding.info.is_contextual() {
                initial_data = binding.initial_value.clone();
            } else {
                initial_map.set_path(
                    &clean_vm_name(&binding.info.child_name),
                    binding.initial_value.clone(),
                );
            }
        }

        infos
            .borrow_mut()
            .insert(attribute_name.clone(), binding.info.clone());
        teardowns
            .borrow_mut()
            .insert(attribute_name.clone(), binding.teardown.clone());
        if binding.is_deferred() {
            deferred.push(binding);
        }
    }

    if static_data_bindings_only && !has_data_binding {
        return Ok(None);
    }

    let view_model = make_view_model(initial_data, has_data_binding);
    el.set_view_model(Some(view_model.clone()));
    *vm_slot.borrow_mut() = Some(view_model);
    for binding in &deferred {
        binding.complete();
    }

    // Attribute rewrites re-bind that attribute, unless the whole
    // view-model is bound contextually (rewrites cannot change what the
    // view-model is at that point).
    let mut attributes_handler = None;
    if !is_setting_view_model {
        let handler = EventHandler::new({
            let el = el.clone();
            let scope = scope.clone();
            let services = services.clone();
            let get_view_model = get_view_model.clone();
            let teardowns = teardowns.clone();
            let infos = infos.clone();
            move |event| {
                let Some(attribute_name) = event.attribute_name.clone() else {
                    return;
                };
                let existing = teardowns.borrow().get(&attribute_name).cloned();
                if let Some(existing) = existing {
                    existing.call();
                }

                let value = el.get_attribute(&attribute_name);
                let parent_was_attribute = infos
                    .borrow()
                    .get(&attribute_name)
                    .map(|info| info.parent == BindingSource::Attribute)
                    .unwrap_or(false);
                if value.is_some() || parent_was_attribute {
                    let mut ctx = BindingContext::new(scope.clone(), services.clone());
                    ctx.semaphore = Semaphore::new();
                    ctx.get_view_model = get_view_model.clone();
                    ctx.initialize_values = true;
                    ctx.favor_view_model = true;
                    if let Some(binding) =
                        make_data_binding(&attribute_name, &value.unwrap_or_default(), &el, &ctx)
                    {
                        binding.complete();
                        infos
                            .borrow_mut()
                            .insert(attribute_name.clone(), binding.info.clone());
                        teardowns
                            .borrow_mut()
                            .insert(attribute_name, binding.teardown.clone());
                    }
                }
            }
        });
        el.add_event_listener(ATTRIBUTES_EVENT, handler.clone());
        attributes_handler = Some(handler);
    }

    let teardown = Teardown::new({
        let el = el.clone();
        let teardowns = teardowns.clone();
        move || {
            let all: Vec<Teardown> = teardowns.borrow().values().cloned().collect();
            for teardown in all {
                teardown.call();
            }
            if let Some(handler) = &attributes_handler {
                el.remove_event_listener(ATTRIBUTES_EVENT, handler);
            }
        }
    });
    Ok(Some(teardown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vane_observe::ObservableValue;

    fn scope_with(entries: &[(&str, Value)]) -> (ObservableMap, Scope) {
        let root = ObservableMap::new();
        for (key, value) in entries {
            root.set(key, value.clone());
        }
        (root.clone(), Scope::root(root))
    }

    #[test]
    fn test_attribute_binding_kind() {
        assert_eq!(
            attribute_binding_kind("value:to"),
            Some(AttributeBindingKind::Data)
        );
        assert_eq!(
            attribute_binding_kind("value:from"),
            Some(AttributeBindingKind::Data)
        );
        assert_eq!(
            attribute_binding_kind("vm:value:bind"),
            Some(AttributeBindingKind::Data)
        );
        assert_eq!(
            attribute_binding_kind("value:to:on:input"),
            Some(AttributeBindingKind::Data)
        );
        assert_eq!(
            attribute_binding_kind("on:click:value:to"),
            Some(AttributeBindingKind::Data)
        );
        assert_eq!(
            attribute_binding_kind("on:click"),
            Some(AttributeBindingKind::Event)
        );
        assert_eq!(
            attribute_binding_kind("on:vm:name"),
            Some(AttributeBindingKind::Event)
        );
        assert_eq!(attribute_binding_kind("class"), None);
        assert_eq!(attribute_binding_kind("data-on"), None);
    }

    #[test]
    fn test_bind_attribute_from_scope() {
        let (root, scope) = scope_with(&[("age", Value::from(10i64))]);
        let el = Element::input("text");
        el.set_attribute("value:from", "age");

        let teardown =
            bind_attribute(&el, "value:from", &scope, &BindingServices::default()).unwrap();
        assert_eq!(el.get_attribute("value").as_deref(), Some("10"));

        root.set("age", Value::from(20i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("20"));

        teardown.call();
        root.set("age", Value::from(30i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("20"));
    }

    #[test]
    fn test_prevent_data_bindings_skips_setup() {
        let (root, scope) = scope_with(&[("age", Value::from(10i64))]);
        let el = Element::input("text");
        el.set_attribute("value:from", "age");
        el.set_prevent_data_bindings(true);

        bind_attribute(&el, "value:from", &scope, &BindingServices::default()).unwrap();
        assert_eq!(el.get_attribute("value"), None);
        root.set("age", Value::from(20i64));
        assert_eq!(el.get_attribute("value"), None);
    }

    #[test]
    fn test_rebind_when_attribute_rewritten() {
        let (root, scope) = scope_with(&[("a", Value::from(1i64)), ("b", Value::from(2i64))]);
        let el = Element::input("text");
        el.set_attribute("value:from", "a");

        bind_attribute(&el, "value:from", &scope, &BindingServices::default()).unwrap();
        assert_eq!(el.get_attribute("value").as_deref(), Some("1"));

        el.set_attribute("value:from", "b");
        assert_eq!(el.get_attribute("value").as_deref(), Some("2"));

        // The old binding is gone.
        root.set("a", Value::from(9i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("2"));
        root.set("b", Value::from(3i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("3"));
    }

    #[test]
    fn test_element_removal_tears_down() {
        let (root, scope) = scope_with(&[("age", Value::from(10i64))]);
        let el = Element::input("text");
        el.set_attribute("value:from", "age");

        bind_attribute(&el, "value:from", &scope, &BindingServices::default()).unwrap();
        el.remove();
        root.set("age", Value::from(20i64));
        assert_eq!(el.get_attribute("value").as_deref(), Some("10"));
        assert_eq!(el.listener_count(ATTRIBUTES_EVENT), 0);
    }

    #[test]
    fn test_bind_view_model_collects_initial_data() {
        let (_, scope) = scope_with(&[("scope1", Value::from("hello"))]);
        let el = Element::new("comp-1");
        el.set_attribute("vm:value:bind", "scope1");

        let teardown = bind_view_model(
            &el,
            &scope,
            |initial, has_bindings| {
                assert!(has_bindings);
                let map = initial.as_map().cloned().unwrap_or_default();
                assert_eq!(map.get("value"), Value::from("hello"));
                map
            },
            None,
            false,
            &BindingServices::default(),
        )
        .unwrap()
        .unwrap();

        let vm = el.view_model().unwrap();
        assert_eq!(vm.get("value"), Value::from("hello"));
        teardown.call();
    }

    #[test]
    fn test_bind_view_model_two_way_roundtrip() {
        let (root, scope) = scope_with(&[("scope1", Value::from(1i64))]);
        let el = Element::new("comp-1");
        el.set_attribute("vm:value:bind", "scope1");

        bind_view_model(
            &el,
            &scope,
            |initial, _| initial.as_map().cloned().unwrap_or_default(),
            None,
            false,
            &BindingServices::default(),
        )
        .unwrap()
        .unwrap();
        let vm = el.view_model().unwrap();

        root.set("scope1", Value::from(2i64));
        assert_eq!(vm.get("value"), Value::from(2i64));

        vm.set("value", Value::from(3i64));
        assert_eq!(root.get("scope1"), Value::from(3i64));
    }

    #[test]
    fn test_child_value_initializes_parent_when_parent_undefined() {
        let (root, scope) = scope_with(&[]);
        let el = Element::new("comp-1");
        el.set_attribute("vm:value:bind", "scope1");

        bind_view_model(
            &el,
            &scope,
            |_, _| ObservableMap::from_entries([("value", Value::from("default"))]),
            None,
            false,
            &BindingServices::default(),
        )
        .unwrap();

        assert_eq!(root.get("scope1"), Value::from("default"));
    }

    #[test]
    fn test_conflicting_bindings_rejected() {
        let (_, scope) = scope_with(&[("a", Value::from(1i64)), ("b", Value::from(2i64))]);
        let el = Element::new("comp-1");
        el.set_attribute("this:from", "a");
        el.set_attribute("vm:value:from", "b");

        let result = bind_view_model(
            &el,
            &scope,
            |_, _| ObservableMap::new(),
            None,
            false,
            &BindingServices::default(),
        );
        assert!(matches!(result, Err(BindError::ConflictingBindings)));
    }

    #[test]
    fn test_static_data_bindings_only_without_bindings() {
        let (_, scope) = scope_with(&[]);
        let el = Element::new("comp-1");
        el.set_attribute("class", "plain");

        let result = bind_view_model(
            &el,
            &scope,
            |_, _| ObservableMap::new(),
            None,
            true,
            &BindingServices::default(),
        )
        .unwrap();
        assert!(result.is_none());
        assert!(el.view_model().is_none());
    }

    #[test]
    fn test_sticky_binding_stores_live_handle() {
        let root = ObservableMap::from_entries([("source", Value::from(7i64))]);
        let scope = Scope::root(root.clone());

        let el = Element::new("comp-1");
        el.set_attribute("vm:value:from", "~source");

        bind_view_model(
            &el,
            &scope,
            |initial, _| initial.as_map().cloned().unwrap_or_default(),
            None,
            false,
            &BindingServices::default(),
        )
        .unwrap();

        let vm = el.view_model().unwrap();
        // The collected initial value is a live handle on the parent.
        match vm.get("value") {
            Value::Observable(handle) => assert_eq!(handle.get(), Value::from(7i64)),
            other => panic!("expected a live handle, got {other:?}"),
        }
    }
}
