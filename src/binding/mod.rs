//! UI-facing projections of a store.
//!
//! A [`Binding`] keeps one selected value in sync with a store and tells its
//! owner when that value, not merely the state, has changed.

mod binding;

pub use binding::{create_binding, Binding};
