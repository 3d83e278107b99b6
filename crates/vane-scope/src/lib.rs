//! Vane Scope - Scope Chain and Expressions
//!
//! The template scope chain (a stack of observable-map contexts) and the
//! small expression language binding attributes evaluate against it.

mod expression;
mod scope;

pub use expression::{ExprError, Expression, KeyPath};
pub use scope::{Scope, ScopeRead};
