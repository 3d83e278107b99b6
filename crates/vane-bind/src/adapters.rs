//! Observable Adapters
//!
//! Each side of a data binding is turned into an `ObservableValue`
//! handle: scope paths, view-model keys and element
//! attributes/properties all look the same to the sync engine.

use std::cell::RefCell;
use std::rc::Rc;

use vane_dom::{props, Element, EventHandler};
use vane_observe::{
    EntityId, ObservableMap, ObservableRef, ObservableValue, SimpleObservable, Updater, Value,
};
use vane_scope::{Expression, KeyPath, Scope};

use crate::info::{clean_vm_name, BindingSource};
use crate::sync::Semaphore;
use crate::BindingServices;

/// Lazy view-model lookup; the map often does not exist yet when a
/// binding is constructed.
pub type ViewModelAccessor = Rc<dyn Fn() -> Option<ObservableMap>>;

/// Everything the adapters and sync engine need to build one binding.
#[derive(Clone)]
pub struct BindingContext {
    pub scope: Scope,
    pub semaphore: Semaphore,
    pub get_view_model: ViewModelAccessor,
    /// The caller already wrote the initial child value itself; skip the
    /// parent-to-child half of initialization.
    pub already_updated_child: bool,
    /// Force initialization even when an `:on:` override suppressed it
    /// (used when re-binding after an attribute mutation).
    pub initialize_values: bool,
    /// Resolve unprefixed child names to the view-model.
    pub favor_view_model: bool,
    /// Template nesting depth, forwarded as a scheduling priority.
    pub nesting: Option<u32>,
    pub services: BindingServices,
}

impl BindingContext {
    pub fn new(scope: Scope, services: BindingServices) -> Self {
        Self {
            scope,
            semaphore: Semaphore::new(),
            get_view_model: Rc::new(|| None),
            already_updated_child: false,
            initialize_values: false,
            favor_view_model: false,
            nesting: None,
            services,
        }
    }
}

/// Build the observable handle for one side of a binding.
///
/// `must_be_settable` distinguishes parents that are written back to
/// (live scope lookups) from write-only scope targets. `sticky` carries
/// the parent handle when `~` asked for live forwarding. `event`
/// overrides the attribute trigger event.
pub fn observable_for_source(
    source: BindingSource,
    el: &Element,
    ctx: &BindingContext,
    name: &str,
    must_be_settable: bool,
    sticky: Option<ObservableRef>,
    event: Option<&str>,
) -> ObservableRef {
    match source {
        BindingSource::Scope => scope_observable(ctx, name, must_be_settable),
        BindingSource::ViewModel => view_model_observable(ctx, name, sticky),
        BindingSource::Attribute => attribute_observable(el, ctx, name, event),
        BindingSource::ViewModelOrAttribute => {
            // Resolved once, here; later view-model changes do not
            // re-route the binding.
            if el.view_model().is_some() {
                view_model_observable(ctx, name, sticky)
            } else {
                attribute_observable(el, ctx, name, event)
            }
        }
    }
}

fn scope_observable(ctx: &BindingContext, name: &str, must_be_settable: bool) -> ObservableRef {
    if name.is_empty() {
        return SimpleObservable::default().handle();
    }
    if must_be_settable {
        match Expression::parse(name) {
            Ok(expression) => expression.live_value(&ctx.scope),
            Err(error) => {
                tracing::warn!(name, %error, "unparseable scope expression, binding detached");
                SimpleObservable::default().handle()
            }
        }
    } else {
        let path = KeyPath::parse(&clean_vm_name(name));
        let handle = Rc::new(ScopeSetter {
            id: EntityId::next(),
            scope: ctx.scope.clone(),
            path: path.clone(),
        });
        let (target, key) = ctx.scope.data_for_set(&path);
        ctx.services
            .recorder
            .record_key_mutation(target.id(), &key, handle.id);
        handle
    }
}

/// Write-only scope handle for parents that are never read back.
struct ScopeSetter {
    id: EntityId,
    scope: Scope,
    path: KeyPath,
}

impl ObservableValue for ScopeSetter {
    fn id(&self) -> EntityId {
        self.id
    }

    fn get(&self) -> Value {
        Value::Undefined
    }

    fn set(&self, value: Value) {
        self.scope.set(&self.path, value);
    }

    fn is_live(&self) -> bool {
        false
    }

    fn on_value(&self, _updater: Updater) {}

    fn off_value(&self, _updater: &Updater) {}
}

fn view_model_observable(
    ctx: &BindingContext,
    name: &str,
    sticky: Option<ObservableRef>,
) -> ObservableRef {
    let contextual = name == "." || name == "this";
    Rc::new(ViewModelObservable {
        id: EntityId::next(),
        get_view_model: ctx.get_view_model.clone(),
        set_name: clean_vm_name(name),
        contextual,
        sticky,
        subscriptions: RefCell::new(Vec::new()),
    })
}

enum MapSubscription {
    Key {
        map: ObservableMap,
        key: String,
        translation: Updater,
    },
    WholeMap {
        map: ObservableMap,
        translation: Updater,
    },
}

/// Handle on one view-model key (or the whole view-model when
/// contextual). The map is looked up lazily on every access.
struct ViewModelObservable {
    id: EntityId,
    get_view_model: ViewModelAccessor,
    set_name: String,
    contextual: bool,
    /// Present for `~` bindings: writes go through a live handle stored
    /// in the view-model instead of overwriting the key.
    sticky: Option<ObservableRef>,
    subscriptions: RefCell<Vec<(Updater, MapSubscription)>>,
}

impl ObservableValue for ViewModelObservable {
    fn id(&self) -> EntityId {
        self.id
    }

    fn get(&self) -> Value {
        let Some(view_model) = (self.get_view_model)() else {
            return Value::Undefined;
        };
        if self.contextual {
            Value::Map(view_model)
        } else {
            view_model.get_path(&self.set_name)
        }
    }

    fn set(&self, value: Value) {
        let Some(view_model) = (self.get_view_model)() else {
            tracing::warn!(key = %self.set_name, "write to a view-model that does not exist yet");
            return;
        };
        if let Some(sticky) = &self.sticky {
            match view_model.get_path(&self.set_name) {
                Value::Observable(existing) => existing.set(value),
                _ => {
                    // Seed a fresh handle from the parent's current value.
                    let seeded = SimpleObservable::new(sticky.get());
                    view_model.set_path(&self.set_name, Value::Observable(seeded.handle()));
                }
            }
        } else if self.contextual {
            view_model.replace(&value);
        } else {
            view_model.set_path(&self.set_name, value);
        }
    }

    fn on_value(&self, updater: Updater) {
        let Some(view_model) = (self.get_view_model)() else {
            tracing::warn!(key = %self.set_name, "subscribe before the view-model exists");
            return;
        };
        let subscription = if self.contextual {
            let translation = updater.clone();
            view_model.on_change(translation.clone());
            MapSubscription::WholeMap {
                map: view_model,
                translation,
            }
        } else {
            let (map, key) = view_model
                .owner_of_path(&self.set_name)
                .unwrap_or_else(|| {
                    let first = self
                        .set_name
                        .split('.')
                        .next()
                        .unwrap_or(&self.set_name)
                        .to_string();
                    (view_model.clone(), first)
                });
            let root = view_model.clone();
            let path = self.set_name.clone();
            let outer = updater.clone();
            let translation = Updater::new("view-model key", move |_| {
                outer.call(root.get_path(&path));
            });
            map.on_key(&key, translation.clone());
            MapSubscription::Key {
                map,
                key,
                translation,
            }
        };
        self.subscriptions.borrow_mut().push((updater, subscription));
    }

    fn off_value(&self, updater: &Updater) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if let Some(index) = subscriptions.iter().position(|(u, _)| u.same(updater)) {
            match subscriptions.remove(index).1 {
                MapSubscription::Key {
                    map,
                    key,
                    translation,
                } => map.off_key(&key, &translation),
                MapSubscription::WholeMap { map, translation } => map.off_change(&translation),
            }
        }
    }

    fn has_dependencies(&self) -> bool {
        true
    }
}

fn attribute_observable(
    el: &Element,
    ctx: &BindingContext,
    prop: &str,
    event_override: Option<&str>,
) -> ObservableRef {
    let mut prop = prop.to_string();
    if prop == "value" && el.tag() == "select" && el.is_multiple() {
        prop = "values".to_string();
    }

    let event = match event_override {
        Some(event) => event.to_string(),
        None => {
            let radio =
                el.tag() == "input" && el.input_type().as_deref() == Some("radio");
            if radio && prop == "checked" {
                "radiochange".to_string()
            } else if let Some(special) = props::special_event(&prop) {
                special.to_string()
            } else {
                "change".to_string()
            }
        }
    };

    let handle = Rc::new(AttributeObservable {
        id: EntityId::next(),
        el: el.clone(),
        prop: prop.clone(),
        event,
        subscriptions: RefCell::new(Vec::new()),
    });
    ctx.services
        .recorder
        .record_key_mutation(el.id(), &prop, handle.id);
    handle
}

/// Handle on an element attribute/property, read on each trigger event.
struct AttributeObservable {
    id: EntityId,
    el: Element,
    prop: String,
    event: String,
    subscriptions: RefCell<Vec<(Updater, EventHandler)>>,
}

impl ObservableValue for AttributeObservable {
    fn id(&self) -> EntityId {
        self.id
    }

    fn get(&self) -> Value {
        props::get(&self.el, &self.prop)
    }

    fn set(&self, value: Value) {
        props::set_attr_or_prop(&self.el, &self.prop, &value);
    }

    fn on_value(&self, updater: Updater) {
        let el = self.el.clone();
        let prop = self.prop.clone();
        let outer = updater.clone();
        let handler = EventHandler::new(move |_event| {
            outer.call(props::get(&el, &prop));
        });
        self.el.add_event_listener(&self.event, handler.clone());
        if self.event == "radiochange" {
            // Radios also report through the plain change event.
            self.el.add_event_listener("change", handler.clone());
        }
        self.subscriptions.borrow_mut().push((updater, handler));
    }

    fn off_value(&self, updater: &Updater) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if let Some(index) = subscriptions.iter().position(|(u, _)| u.same(updater)) {
            let (_, handler) = subscriptions.remove(index);
            self.el.remove_event_listener(&self.event, &handler);
            if self.event == "radiochange" {
                self.el.remove_event_listener("change", &handler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use vane_observe::ObservableMap;

    fn context_with_vm(vm: ObservableMap) -> BindingContext {
        let mut ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );
        ctx.get_view_model = Rc::new(move || Some(vm.clone()));
        ctx
    }

    #[test]
    fn test_scope_adapter_reads_and_writes() {
        let root = ObservableMap::from_entries([("age", Value::from(10i64))]);
        let ctx = BindingContext::new(Scope::root(root.clone()), BindingServices::default());
        let el = Element::new("div");

        let handle =
            observable_for_source(BindingSource::Scope, &el, &ctx, "age", true, None, None);
        assert_eq!(handle.get(), Value::from(10i64));

        handle.set(Value::from(11i64));
        assert_eq!(root.get("age"), Value::from(11i64));
    }

    #[test]
    fn test_scope_setter_is_write_only() {
        let root = ObservableMap::new();
        let ctx = BindingContext::new(Scope::root(root.clone()), BindingServices::default());
        let el = Element::new("div");

        let handle =
            observable_for_source(BindingSource::Scope, &el, &ctx, "age", false, None, None);
        assert!(!handle.is_live());
        assert_eq!(handle.get(), Value::Undefined);

        handle.set(Value::from(1i64));
        assert_eq!(root.get("age"), Value::from(1i64));
    }

    #[test]
    fn test_view_model_adapter_nested_path() {
        let vm = ObservableMap::new();
        vm.set_path("person.name", Value::from("Kim"));
        let ctx = context_with_vm(vm.clone());
        let el = Element::new("comp-1");

        let handle = observable_for_source(
            BindingSource::ViewModel,
            &el,
            &ctx,
            "person.name",
            true,
            None,
            None,
        );
        assert_eq!(handle.get(), Value::from("Kim"));

        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let sink = seen.clone();
        let updater = Updater::new("test", move |v| sink.borrow_mut().push(v));
        handle.on_value(updater.clone());

        vm.set_path("person.name", Value::from("Lee"));
        assert_eq!(*seen.borrow(), vec![Value::from("Lee")]);

        handle.off_value(&updater);
        vm.set_path("person.name", Value::from("Ash"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_contextual_view_model_adapter_replaces() {
        let vm = ObservableMap::from_entries([("stale", Value::from(1i64))]);
        let ctx = context_with_vm(vm.clone());
        let el = Element::new("comp-1");

        let handle =
            observable_for_source(BindingSource::ViewModel, &el, &ctx, "this", true, None, None);
        assert_eq!(handle.get(), Value::Map(vm.clone()));

        let source = ObservableMap::from_entries([("fresh", Value::from(2i64))]);
        handle.set(Value::Map(source));
        assert!(!vm.has("stale"));
        assert_eq!(vm.get("fresh"), Value::from(2i64));
    }

    #[test]
    fn test_sticky_write_goes_through_stored_handle() {
        let vm = ObservableMap::new();
        let inner = SimpleObservable::new(Value::from(1i64));
        vm.set("value", Value::Observable(inner.handle()));

        let parent = SimpleObservable::new(Value::from(5i64));
        let ctx = context_with_vm(vm.clone());
        let el = Element::new("comp-1");

        let handle = observable_for_source(
            BindingSource::ViewModel,
            &el,
            &ctx,
            "value",
            true,
            Some(parent.handle()),
            None,
        );
        handle.set(Value::from(9i64));
        assert_eq!(inner.get(), Value::from(9i64));

        // Non-observable slot: a fresh handle seeded from the parent.
        vm.set("value", Value::from("plain"));
        handle.set(Value::from(3i64));
        match vm.get("value") {
            Value::Observable(stored) => assert_eq!(stored.get(), Value::from(5i64)),
            other => panic!("expected stored handle, got {other:?}"),
        }
    }

    #[test]
    fn test_attribute_adapter_triggers_on_event() {
        let el = Element::input("text");
        let ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );

        let handle = observable_for_source(
            BindingSource::Attribute,
            &el,
            &ctx,
            "value",
            true,
            None,
            None,
        );
        handle.set(Value::from("abc"));
        assert_eq!(el.get_attribute("value").as_deref(), Some("abc"));

        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let sink = seen.clone();
        let updater = Updater::new("test", move |v| sink.borrow_mut().push(v));
        handle.on_value(updater.clone());

        el.set_property("value", Value::from("typed"));
        el.dispatch(&vane_dom::Event::new("change"));
        assert_eq!(*seen.borrow(), vec![Value::from("typed")]);

        handle.off_value(&updater);
        el.dispatch(&vane_dom::Event::new("change"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_event_override_changes_trigger() {
        let el = Element::input("text");
        let ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );
        let handle = observable_for_source(
            BindingSource::Attribute,
            &el,
            &ctx,
            "value",
            true,
            None,
            Some("input"),
        );

        let seen = Rc::new(StdRefCell::new(0));
        let sink = seen.clone();
        handle.on_value(Updater::new("test", move |_| *sink.borrow_mut() += 1));

        el.set_property("value", Value::from("x"));
        el.dispatch(&vane_dom::Event::new("change"));
        assert_eq!(*seen.borrow(), 0);
        el.dispatch(&vane_dom::Event::new("input"));
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_radio_checked_listens_to_change_too() {
        let el = Element::input("radio");
        let ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );
        let handle = observable_for_source(
            BindingSource::Attribute,
            &el,
            &ctx,
            "checked",
            true,
            None,
            None,
        );

        let seen = Rc::new(StdRefCell::new(0));
        let sink = seen.clone();
        handle.on_value(Updater::new("test", move |_| *sink.borrow_mut() += 1));

        el.set_property("checked", Value::from(true));
        el.dispatch(&vane_dom::Event::new("change"));
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_multi_select_value_routes_to_values() {
        let el = Element::new("select");
        el.set_multiple(true);
        let ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );
        let handle = observable_for_source(
            BindingSource::Attribute,
            &el,
            &ctx,
            "value",
            true,
            None,
            None,
        );

        handle.set(Value::from("a"));
        assert_eq!(el.get_property("values"), Some(Value::from("a")));
        assert_eq!(el.get_property("value"), None);
    }

    #[test]
    fn test_view_model_or_attribute_resolves_once() {
        let el = Element::new("div");
        let ctx = BindingContext::new(
            Scope::root(ObservableMap::new()),
            BindingServices::default(),
        );

        // No view-model at creation: the attribute side wins, and stays
        // the attribute side even after a view-model appears.
        let handle = observable_for_source(
            BindingSource::ViewModelOrAttribute,
            &el,
            &ctx,
            "title",
            true,
            None,
            None,
        );
        handle.set(Value::from("t"));
        assert_eq!(el.get_attribute("title").as_deref(), Some("t"));

        el.set_view_model(Some(ObservableMap::new()));
        handle.set(Value::from("u"));
        assert_eq!(el.get_attribute("title").as_deref(), Some("u"));
        assert!(el.view_model().unwrap().is_empty());
    }
}
