//! # Tinstore
//!
//! A minimal observable state store for Rust.
//!
//! A [`Store`] holds one immutable [`State`] snapshot at a time. Updates are
//! fragments merged into the snapshot, functions of the current snapshot, or
//! in-place edits of a copy-on-write [`Draft`]. A commit that changes no field
//! is skipped; every other commit swaps the snapshot and synchronously
//! notifies listeners in subscription order.
//!
//! ## Store
//!
//! - `Store` - the state cell, built once from a factory and a middleware list
//! - `SetState` - the commit function handed to the factory and to actions
//! - `Binding` - a selected projection that reports when it changes
//!
//! ## Middleware
//!
//! Wrappers around the commit function, composed so that the first one in
//! the list is the outermost:
//! - `throttle` - rate-limits commits that change tracked fields
//! - `draft` - turns draft recipes into plain compute functions
//! - `logger` - structured before/after records through `tracing`
//! - `persist` - hydrates from and writes to a `Storage` backend
//! - `devtools` - bridges the store to an external `Inspector`

pub mod binding;
pub mod error;
pub mod middleware;
pub mod runtime;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use binding::{create_binding, Binding};
pub use error::{PersistError, StoreError};
pub use middleware::{from_fn, Middleware};
#[cfg(feature = "tokio")]
pub use runtime::TokioTimers;
pub use runtime::{ManualTimers, Timers};
pub use state::{produce, Action, Draft, State, Value};
pub use store::{
    create_store, GetState, Listener, MiddlewareApi, SetState, Store, StoreApi, Unsubscribe,
    Update,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = create_store(|_, _, _| State::new().with("count", 0), vec![]);
        assert_eq!(store.get_state().get("count"), Some(&Value::from(0)));
        store.set_state(State::new().with("count", 42), false);
        assert_eq!(store.get_state().get("count"), Some(&Value::from(42)));
    }
}
