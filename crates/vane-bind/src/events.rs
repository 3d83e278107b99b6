//! Event Bindings
//!
//! `on:<event>="method(...)"` attributes. The event listens on the
//! view-model when the element has one, on the element otherwise;
//! `el:`/`vm:` pin the target and `:by:<path>` redirects it to another
//! observable map. The attribute value is re-read and re-parsed on
//! every firing, so rewrites take effect without re-binding.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use vane_dom::{Element, Event, EventHandler, ATTRIBUTES_EVENT, REMOVED_EVENT};
use vane_observe::{NativeFunction, ObservableMap, Opaque, Updater, Value};
use vane_scope::{Expression, Scope};

use crate::sync::Teardown;
use crate::{BindError, BindingServices};

/// Named fallback functions for event handlers whose callee is not
/// found on the scope.
#[derive(Default)]
pub struct HelperRegistry {
    helpers: RefCell<HashMap<String, NativeFunction>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, function: NativeFunction) {
        self.helpers
            .borrow_mut()
            .insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<NativeFunction> {
        self.helpers.borrow().get(name).cloned()
    }
}

enum Target {
    Element(Element),
    Map(ObservableMap),
}

enum Attached {
    Element {
        el: Element,
        event: String,
        handler: EventHandler,
    },
    Map {
        map: ObservableMap,
        key: String,
        updater: Updater,
    },
}

impl Attached {
    fn detach(&self) {
        match self {
            Attached::Element { el, event, handler } => el.remove_event_listener(event, handler),
            Attached::Map { map, key, updater } => map.off_key(key, updater),
        }
    }
}

/// Bind one `on:` attribute. Fails fast when the current attribute
/// value is not a call expression; later rewrites are only checked at
/// fire time.
pub fn bind_event(
    el: &Element,
    attribute_name: &str,
    scope: &Scope,
    services: &BindingServices,
) -> Result<Teardown, BindError> {
    let Some(descriptor) = attribute_name.strip_prefix("on:") else {
        return Err(BindError::UnsupportedEventBinding {
            attribute: attribute_name.to_string(),
        });
    };

    let mut event_name = descriptor.to_string();
    let mut target;
    if let Some(rest) = event_name.strip_prefix("el:") {
        // el: pins the element; the rest is the literal event name.
        event_name = rest.to_string();
        target = Target::Element(el.clone());
    } else {
        let by_view_model;
        if let Some(rest) = event_name.strip_prefix("vm:") {
            event_name = rest.to_string();
            target = Target::Map(el.view_model_or_create());
            by_view_model = true;
        } else {
            target = match el.view_model() {
                Some(view_model) => Target::Map(view_model),
                None => Target::Element(el.clone()),
            };
            by_view_model = false;
        }

        if let Some(index) = event_name.find(":by:") {
            let path = event_name[index + 4..].to_string();
            let value = if by_view_model {
                el.view_model_or_create().get_path(&path)
            } else {
                scope.get(&path)
            };
            match value {
                Value::Map(map) => target = Target::Map(map),
                other => tracing::warn!(
                    attribute = attribute_name,
                    path = %path,
                    ?other,
                    "event target path does not resolve to a bindable value"
                ),
            }
            event_name.truncate(index);
        }
    }

    if let Some(value) = el.get_attribute(attribute_name) {
        match Expression::parse(&value) {
            Ok(expression) if expression.is_call() => {}
            Ok(_) => {
                return Err(BindError::NotACallExpression {
                    attribute: attribute_name.to_string(),
                    value,
                })
            }
            Err(source) => {
                return Err(BindError::Expr {
                    attribute: attribute_name.to_string(),
                    source,
                })
            }
        }
    }

    let fire: Rc<dyn Fn(&Event)> = {
        let el = el.clone();
        let scope = scope.clone();
        let services = services.clone();
        let attribute = attribute_name.to_string();
        Rc::new(move |event: &Event| {
            let Some(value) = el.get_attribute(&attribute) else {
                return;
            };
            let expression = match Expression::parse(&value) {
                Ok(expression) => expression,
                Err(error) => {
                    tracing::error!(attribute = %attribute, %error, "failed to parse event handler");
                    return;
                }
            };
            let Some(callee) = expression.callee().cloned() else {
                tracing::error!(
                    attribute = %attribute,
                    value = %value,
                    "event handler must be a call expression"
                );
                return;
            };

            let view_model = el.view_model_or_create();
            let special = ObservableMap::new();
            special.set("element", Value::Opaque(Opaque::new(el.clone())));
            special.set("event", Value::Opaque(Opaque::new(event.clone())));
            special.set("viewModel", Value::Map(view_model));
            special.set(
                "arguments",
                Value::Opaque(Opaque::new(vec![Value::Opaque(Opaque::new(event.clone()))])),
            );
            let local = scope.add(special, true);
            let args = expression.args(&local);

            match local.read(&callee).value {
                Value::Function(function) => {
                    let scheduler = services.scheduler.clone();
                    scheduler.run_batched(Box::new(|| {
                        scheduler.enqueue_notify(Box::new(move || {
                            function.call(&args);
                        }));
                    }));
                }
                _ => {
                    let name = callee.joined();
                    match services.helpers.get(&name) {
                        Some(helper) => {
                            helper.call(&args);
                        }
                        None => tracing::warn!(
                            attribute = %attribute,
                            method = %name,
                            "no method or helper found for event binding"
                        ),
                    }
                }
            }
        })
    };

    let attached = match target {
        Target::Element(target_el) => {
            let fire = fire.clone();
            let handler = EventHandler::new(move |event| fire(event));
            target_el.add_event_listener(&event_name, handler.clone());
            Attached::Element {
                el: target_el,
                event: event_name,
                handler,
            }
        }
        Target::Map(map) => {
            let fire = fire.clone();
            let key = event_name.clone();
            let updater = Updater::new(&format!("on:{event_name}"), move |value| {
                fire(&Event::with_value(&key, value));
            });
            map.on_key(&event_name, updater.clone());
            Attached::Map {
                map,
                key: event_name,
                updater,
            }
        }
    };

    let attrs_slot: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));
    let removed_slot: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));

    let teardown = Teardown::new({
        let el = el.clone();
        let attrs_slot = attrs_slot.clone();
        let removed_slot = removed_slot.clone();
        move || {
            attached.detach();
            if let Some(handler) = attrs_slot.borrow_mut().take() {
                el.remove_event_listener(ATTRIBUTES_EVENT, &handler);
            }
            if let Some(handler) = removed_slot.borrow_mut().take() {
                el.remove_event_listener(REMOVED_EVENT, &handler);
            }
        }
    });

    // Unbind when the attribute itself is removed...
    let attrs_handler = EventHandler::new({
        let el = el.clone();
        let attribute = attribute_name.to_string();
        let teardown = teardown.clone();
        move |event| {
            if event.attribute_name.as_deref() == Some(attribute.as_str())
                && el.get_attribute(&attribute).is_none()
            {
                teardown.call();
            }
        }
    });
    *attrs_slot.borrow_mut() = Some(attrs_handler.clone());
    el.add_event_listener(ATTRIBUTES_EVENT, attrs_handler);

    // ...or when the element leaves the document.
    let removed_handler = EventHandler::new({
        let teardown = teardown.clone();
        move |_| teardown.call()
    });
    *removed_slot.borrow_mut() = Some(removed_handler.clone());
    el.add_event_listener(REMOVED_EVENT, removed_handler);

    Ok(teardown)
}
