//! Vane DOM - Element Surface
//!
//! The minimal DOM-like element the binding engine runs against:
//! attributes, properties, event listeners, and the synthetic
//! `attributes`/`removed` events that drive binding lifecycle.

mod attributes;
mod element;
mod events;
pub mod props;

pub use attributes::{Attr, NamedNodeMap};
pub use element::Element;
pub use events::{Event, EventHandler, ATTRIBUTES_EVENT, REMOVED_EVENT};
