//! Sync Engine
//!
//! Builds the updaters that move values between the two sides of a data
//! binding. A per-attribute semaphore suppresses echoes: it is raised
//! before writing the child, stays raised for every notification that
//! write triggers, and is lowered in the batch's mutation phase.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use vane_dom::Element;
use vane_observe::{ObservableRef, ObservableValue, Updater, Value};

use crate::adapters::{observable_for_source, BindingContext};
use crate::info::{binding_info, BindingInfo, BindingSource};
use crate::BindingServices;

/// Per-attribute reentrancy counters shared by both directions of a
/// binding.
#[derive(Clone, Default)]
pub struct Semaphore {
    counters: Rc<RefCell<HashMap<String, u32>>>,
}

impl Semaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counters.borrow().get(key).copied().unwrap_or(0)
    }

    pub fn is_raised(&self, key: &str) -> bool {
        self.count(key) > 0
    }

    pub fn raise(&self, key: &str) {
        *self.counters.borrow_mut().entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn lower(&self, key: &str) {
        let mut counters = self.counters.borrow_mut();
        match counters.get_mut(key) {
            Some(count) if *count > 0 => *count -= 1,
            _ => tracing::warn!(key, "semaphore lowered below zero"),
        }
    }
}

/// An idempotent teardown callback; calling it twice runs it once.
#[derive(Clone, Default)]
pub struct Teardown {
    action: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Teardown {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self {
            action: Rc::new(RefCell::new(Some(Box::new(f)))),
        }
    }

    pub fn noop() -> Self {
        Self::default()
    }

    pub fn call(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(f) = action {
            f();
        }
    }
}

/// Subscribe the child to the parent. The returned updater writes the
/// child under a raised semaphore so the write cannot echo back.
pub fn parent_to_child(
    parent: &ObservableRef,
    child: &ObservableRef,
    semaphore: &Semaphore,
    attribute_name: &str,
    services: &BindingServices,
) -> Updater {
    let update_child = {
        let child = child.clone();
        let semaphore = semaphore.clone();
        let attribute = attribute_name.to_string();
        let scheduler = services.scheduler.clone();
        Updater::new(&format!("update child of {attribute_name}"), move |value| {
            semaphore.raise(&attribute);
            let lower_semaphore = semaphore.clone();
            let lower_attribute = attribute.clone();
            scheduler.run_batched(Box::new(|| {
                child.set(value);
                scheduler.defer_until_mutation_phase(Box::new(move || {
                    lower_semaphore.lower(&lower_attribute);
                }));
            }));
        })
    };
    if parent.is_live() {
        parent.on_value(update_child.clone());
        services
            .recorder
            .record_value_mutation(child.id(), parent.id());
    }
    update_child
}

/// Subscribe the parent to the child. Writes are skipped while the
/// semaphore is raised. With `sync_child_with_parent`, a parent that
/// coerced the written value forces the child back to what it accepted.
pub fn child_to_parent(
    parent: &ObservableRef,
    child: &ObservableRef,
    semaphore: &Semaphore,
    attribute_name: &str,
    sync_child_with_parent: bool,
    services: &BindingServices,
) -> Updater {
    let update_parent = {
        let parent = parent.clone();
        let child = child.clone();
        let semaphore = semaphore.clone();
        let attribute = attribute_name.to_string();
        let scheduler = services.scheduler.clone();
        Updater::new(&format!("update parent of {attribute_name}"), move |value| {
            if semaphore.is_raised(&attribute) {
                return;
            }
            if parent.is_settable() {
                let has_dependencies = parent.has_dependencies();
                if !has_dependencies || parent.get() != value {
                    parent.set(value.clone());
                }
                if sync_child_with_parent && has_dependencies {
                    let accepted = parent.get();
                    if accepted != child.get() {
                        semaphore.raise(&attribute);
                        let lower_semaphore = semaphore.clone();
                        let lower_attribute = attribute.clone();
                        scheduler.run_batched(Box::new(|| {
                            child.set(accepted);
                            scheduler.defer_until_mutation_phase(Box::new(move || {
                                lower_semaphore.lower(&lower_attribute);
                            }));
                        }));
                    }
                }
            } else if let Value::Map(target) = parent.get() {
                tracing::warn!(
                    attribute = %attribute,
                    "parent is not settable, replacing its map contents instead"
                );
                target.replace(&value);
            }
        })
    };
    if child.is_live() {
        child.on_value(update_parent.clone());
        services
            .recorder
            .record_value_mutation(parent.id(), child.id());
    }
    update_parent
}

/// One initial sync when a binding completes.
///
/// One-way bindings sync their only direction. Two-way bindings prefer
/// parent-to-child, except when only the child has a value.
pub fn initialize_values(
    info: &BindingInfo,
    child: &ObservableRef,
    parent: &ObservableRef,
    update_child: Option<&Updater>,
    update_parent: Option<&Updater>,
    already_updated_child: bool,
) {
    let child_first = if info.parent_to_child && !info.child_to_parent {
        false
    } else if !info.parent_to_child && info.child_to_parent {
        true
    } else if child.get().is_undefined() {
        false
    } else {
        parent.get().is_undefined()
    };

    if child_first {
        if let Some(updater) = update_parent {
            updater.call(child.get());
        }
    } else if !already_updated_child {
        if let Some(updater) = update_child {
            updater.call(parent.get());
        }
    }
}

/// A constructed data binding, possibly waiting for its view-model.
pub struct DataBinding {
    pub info: BindingInfo,
    /// Parent value captured at construction; a live handle on the
    /// parent when the binding is sticky. Only meaningful for deferred
    /// bindings.
    pub initial_value: Value,
    complete: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
    pub teardown: Teardown,
}

impl DataBinding {
    /// Finish the binding: subscribe child-to-parent and run the initial
    /// value sync. No-op when already completed.
    pub fn complete(&self) {
        let action = self.complete.borrow_mut().take();
        if let Some(f) = action {
            f();
        }
    }

    /// True while completion is still pending (view-model children wait
    /// for their map to be created).
    pub fn is_deferred(&self) -> bool {
        self.complete.borrow().is_some()
    }
}

/// Build one data binding from an attribute name/value pair.
///
/// Parent-to-child is wired immediately. Completion — child-to-parent
/// wiring and the initial value sync — runs right away unless the child
/// is the view-model, whose map may not exist yet.
pub fn make_data_binding(
    attribute_name: &str,
    attribute_value: &str,
    el: &Element,
    ctx: &BindingContext,
) -> Option<DataBinding> {
    let mut info = binding_info(attribute_name, attribute_value, ctx.favor_view_model)?;
    if ctx.initialize_values {
        info.initialize_values = true;
    }
    tracing::debug!(
        attribute = attribute_name,
        parent = %info.parent_name,
        child = %info.child_name,
        "creating data binding"
    );

    let parent = observable_for_source(
        info.parent,
        el,
        ctx,
        &info.parent_name,
        info.parent_to_child,
        None,
        None,
    );
    let sticky = info.sticky_parent_to_child.then(|| parent.clone());
    let child = observable_for_source(
        info.child,
        el,
        ctx,
        &info.child_name,
        info.child_to_parent,
        sticky,
        info.child_event.as_deref(),
    );

    if let Some(nesting) = ctx.nesting {
        parent.set_priority(nesting + 1);
        child.set_priority(nesting + 1);
    }

    let update_child = info.parent_to_child.then(|| {
        parent_to_child(
            &parent,
            &child,
            &ctx.semaphore,
            &info.binding_attribute_name,
            &ctx.services,
        )
    });

    let update_parent_slot: Rc<RefCell<Option<Updater>>> = Rc::new(RefCell::new(None));
    let keepalive_slot: Rc<RefCell<Option<Updater>>> = Rc::new(RefCell::new(None));

    let complete_action: Box<dyn FnOnce()> = {
        let info = info.clone();
        let parent = parent.clone();
        let child = child.clone();
        let semaphore = ctx.semaphore.clone();
        let services = ctx.services.clone();
        let update_child = update_child.clone();
        let update_parent_slot = update_parent_slot.clone();
        let keepalive_slot = keepalive_slot.clone();
        let already_updated_child = ctx.already_updated_child;
        Box::new(move || {
            let mut update_parent = None;
            if info.child_to_parent {
                let updater = child_to_parent(
                    &parent,
                    &child,
                    &semaphore,
                    &info.binding_attribute_name,
                    info.sync_child_with_parent,
                    &services,
                );
                *update_parent_slot.borrow_mut() = Some(updater.clone());
                update_parent = Some(updater);
            } else if info.sticky_parent_to_child && child.is_live() {
                // Sticky one-way bindings still observe the child so the
                // stored handle keeps flowing.
                let keepalive = Updater::noop("sticky keepalive");
                child.on_value(keepalive.clone());
                *keepalive_slot.borrow_mut() = Some(keepalive);
            }
            if info.initialize_values {
                initialize_values(
                    &info,
                    &child,
                    &parent,
                    update_child.as_ref(),
                    update_parent.as_ref(),
                    already_updated_child,
                );
            }
        })
    };

    let teardown = Teardown::new({
        let parent = parent.clone();
        let child = child.clone();
        let update_child = update_child.clone();
        let update_parent_slot = update_parent_slot.clone();
        let keepalive_slot = keepalive_slot.clone();
        move || {
            if let Some(updater) = &update_child {
                parent.off_value(updater);
            }
            if let Some(updater) = update_parent_slot.borrow_mut().take() {
                child.off_value(&updater);
            }
            if let Some(updater) = keepalive_slot.borrow_mut().take() {
                child.off_value(&updater);
            }
        }
    });

    let complete = Rc::new(RefCell::new(Some(complete_action)));
    if info.child == BindingSource::ViewModel {
        let initial_value = if info.sticky_parent_to_child {
            Value::Observable(parent.clone())
        } else {
            parent.get()
        };
        Some(DataBinding {
            info,
            initial_value,
            complete,
            teardown,
        })
    } else {
        let action = complete.borrow_mut().take();
        if let Some(f) = action {
            f();
        }
        Some(DataBinding {
            info,
            initial_value: Value::Undefined,
            complete,
            teardown,
        })
    }
}
