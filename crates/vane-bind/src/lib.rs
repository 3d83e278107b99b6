//! Vane Bind - Template Data and Event Bindings
//!
//! Wires template scope, element view-models and element
//! attributes/properties together from binding attributes:
//!
//! - `value:to="age"`, `value:from="age"`, `value:bind="age"` move data
//!   child-to-parent, parent-to-child or both.
//! - `:on:<event>` picks the trigger event for child reads;
//!   `vm:`/`el:` pin the child side; `~` forwards a live handle.
//! - `on:click="doThing()"` binds event handlers to call expressions.
//!
//! Two-way propagation is guarded by a per-attribute semaphore so a
//! write never echoes back through the binding that caused it.

mod adapters;
mod events;
mod info;
mod lifecycle;
mod sync;
mod tokenize;

use std::rc::Rc;

use vane_observe::{DependencyRecorder, NoopRecorder};
use vane_queues::{BatchScheduler, CooperativeQueues};
use vane_scope::ExprError;

pub use adapters::{observable_for_source, BindingContext, ViewModelAccessor};
pub use events::{bind_event, HelperRegistry};
pub use info::{binding_info, clean_vm_name, BindingInfo, BindingSource};
pub use lifecycle::{
    attribute_binding_kind, bind_attribute, bind_element_attribute, bind_view_model,
    AttributeBindingKind,
};
pub use sync::{make_data_binding, DataBinding, Semaphore, Teardown};
pub use tokenize::{tokenize, Keyword, Tokenized};

/// Fatal binding-setup failures.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(
        "cannot mix whole view-model bindings (this:from=\"...\") with \
         single-key view-model bindings on one element"
    )]
    ConflictingBindings,

    #[error("{attribute}={value:?} must be a call expression, like {attribute}=\"method()\"")]
    NotACallExpression { attribute: String, value: String },

    #[error("unsupported event binding attribute {attribute:?}")]
    UnsupportedEventBinding { attribute: String },

    #[error("failed to parse {attribute}: {source}")]
    Expr {
        attribute: String,
        #[source]
        source: ExprError,
    },
}

/// Collaborators every binding consumes, passed explicitly rather than
/// reached for ambiently.
#[derive(Clone)]
pub struct BindingServices {
    pub scheduler: Rc<dyn BatchScheduler>,
    pub recorder: Rc<dyn DependencyRecorder>,
    pub helpers: Rc<HelperRegistry>,
}

impl BindingServices {
    pub fn new(scheduler: Rc<dyn BatchScheduler>) -> Self {
        Self {
            scheduler,
            recorder: Rc::new(NoopRecorder),
            helpers: Rc::new(HelperRegistry::new()),
        }
    }

    pub fn with_recorder(mut self, recorder: Rc<dyn DependencyRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_helpers(mut self, helpers: Rc<HelperRegistry>) -> Self {
        self.helpers = helpers;
        self
    }
}

impl Default for BindingServices {
    fn default() -> Self {
        Self::new(CooperativeQueues::new())
    }
}
