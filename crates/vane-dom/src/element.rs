//! Element
//!
//! Shared-handle element: attributes, properties, listeners, view-model
//! slot. Attribute writes dispatch the synthetic `attributes` event;
//! removal from the document dispatches `removed`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use vane_observe::{EntityId, ObservableMap, Value};

use crate::attributes::NamedNodeMap;
use crate::events::{Event, EventHandler};

/// A DOM-like element. Cloning shares the element; equality is identity.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

struct ElementInner {
    id: EntityId,
    tag: String,
    input_type: RefCell<Option<String>>,
    multiple: Cell<bool>,
    attributes: RefCell<NamedNodeMap>,
    properties: RefCell<HashMap<String, Value>>,
    listeners: RefCell<HashMap<String, Vec<EventHandler>>>,
    view_model: RefCell<Option<ObservableMap>>,
    prevent_data_bindings: Cell<bool>,
    in_document: Cell<bool>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                id: EntityId::next(),
                tag: tag.to_lowercase(),
                input_type: RefCell::new(None),
                multiple: Cell::new(false),
                attributes: RefCell::new(NamedNodeMap::new()),
                properties: RefCell::new(HashMap::new()),
                listeners: RefCell::new(HashMap::new()),
                view_model: RefCell::new(None),
                prevent_data_bindings: Cell::new(false),
                in_document: Cell::new(true),
            }),
        }
    }

    /// An `<input>` element with the given `type`.
    pub fn input(input_type: &str) -> Self {
        let el = Self::new("input");
        *el.inner.input_type.borrow_mut() = Some(input_type.to_lowercase());
        el.inner
            .attributes
            .borrow_mut()
            .set("type", input_type);
        el
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn input_type(&self) -> Option<String> {
        self.inner.input_type.borrow().clone()
    }

    pub fn is_multiple(&self) -> bool {
        self.inner.multiple.get()
    }

    pub fn set_multiple(&self, multiple: bool) {
        self.inner.multiple.set(multiple);
    }

    // ## Attributes

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).map(|s| s.to_string())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.attributes.borrow().has(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.inner.attributes.borrow().names()
    }

    /// Set an attribute; dispatches an `attributes` event when the value
    /// actually changes.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let old = self.inner.attributes.borrow_mut().set(name, value);
        if old.as_deref() != Some(value) {
            self.dispatch(&Event::attribute_changed(name, old.as_deref()));
        }
    }

    /// Remove an attribute; dispatches an `attributes` event if present.
    pub fn remove_attribute(&self, name: &str) {
        let old = self.inner.attributes.borrow_mut().remove(name);
        if old.is_some() {
            self.dispatch(&Event::attribute_changed(name, old.as_deref()));
        }
    }

    // ## Properties

    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.inner.properties.borrow().get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: Value) {
        self.inner.properties.borrow_mut().insert(name.to_string(), value);
    }

    // ## Events

    pub fn add_event_listener(&self, event: &str, handler: EventHandler) {
        self.inner
            .listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    pub fn remove_event_listener(&self, event: &str, handler: &EventHandler) {
        if let Some(list) = self.inner.listeners.borrow_mut().get_mut(event) {
            list.retain(|h| !h.same(handler));
        }
    }

    /// Attach a listener that runs once, then removes itself.
    pub fn once(&self, event: &str, f: impl FnOnce() + 'static) {
        let slot = Rc::new(RefCell::new(Some(f)));
        let weak = Rc::downgrade(&self.inner);
        let event_name = event.to_string();
        let handler_cell: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));

        let cell = handler_cell.clone();
        let handler = EventHandler::new(move |_event| {
            if let Some(f) = slot.borrow_mut().take() {
                f();
            }
            if let (Some(inner), Some(handler)) = (weak.upgrade(), cell.borrow_mut().take()) {
                Element { inner }.remove_event_listener(&event_name, &handler);
            }
        });
        *handler_cell.borrow_mut() = Some(handler.clone());
        self.add_event_listener(event, handler);
    }

    pub fn dispatch(&self, event: &Event) {
        // Snapshot so handlers may attach/detach listeners reentrantly.
        let snapshot: Vec<EventHandler> = self
            .inner
            .listeners
            .borrow()
            .get(&event.name)
            .map(|l| l.to_vec())
            .unwrap_or_default();
        for handler in snapshot {
            handler.call(event);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(event)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    // ## View-model association

    pub fn view_model(&self) -> Option<ObservableMap> {
        self.inner.view_model.borrow().clone()
    }

    pub fn set_view_model(&self, view_model: Option<ObservableMap>) {
        *self.inner.view_model.borrow_mut() = view_model;
    }

    /// The element's view-model, created on demand.
    pub fn view_model_or_create(&self) -> ObservableMap {
        let mut slot = self.inner.view_model.borrow_mut();
        slot.get_or_insert_with(ObservableMap::new).clone()
    }

    pub fn prevent_data_bindings(&self) -> bool {
        self.inner.prevent_data_bindings.get()
    }

    pub fn set_prevent_data_bindings(&self, prevent: bool) {
        self.inner.prevent_data_bindings.set(prevent);
    }

    // ## Document lifecycle

    pub fn is_in_document(&self) -> bool {
        self.inner.in_document.get()
    }

    /// Detach from the document, dispatching the `removed` event.
    pub fn remove(&self) {
        if self.inner.in_document.get() {
            self.inner.in_document.set(false);
            self.dispatch(&Event::removed());
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} #{}>", self.inner.tag, self.inner.id.raw())
    }
}
