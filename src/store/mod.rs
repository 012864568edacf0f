//! The store engine: state cell, equality-gated commits and listener fan-out.
//!
//! A [`Store`] owns one [`State`](crate::State) at a time. Every commit goes
//! through [`SetState`]; the core resolves the [`Update`], skips it when no
//! field changed, and otherwise swaps the snapshot and notifies listeners
//! synchronously, in subscription order.

mod listeners;
mod store;
mod update;

pub use listeners::Listener;
pub use store::{create_store, GetState, MiddlewareApi, Store, StoreApi, Unsubscribe};
pub use update::{ComputeFn, Recipe, SetState, Update};
