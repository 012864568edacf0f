use crate::state::State;
use crate::store::{Store, Unsubscribe};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A selected projection of a store's state, kept current by a subscription.
///
/// `on_change` runs after a commit only when the projection differs
/// (`PartialEq`) from the previous one. Dropping the binding unsubscribes.
pub struct Binding<U> {
    current: Rc<RefCell<U>>,
    subscription: Unsubscribe,
}

impl<U> Binding<U>
where
    U: Clone + PartialEq + 'static,
{
    pub fn new<S, C>(store: &Store, selector: S, on_change: C) -> Self
    where
        S: Fn(&State) -> U + 'static,
        C: Fn(&U) + 'static,
    {
        let current = Rc::new(RefCell::new(store.select(&selector)));
        let subscription = {
            let current = current.clone();
            store.subscribe(move |state| {
                let next = selector(state);
                if *current.borrow() == next {
                    return;
                }
                *current.borrow_mut() = next.clone();
                on_change(&next);
            })
        };
        Self {
            current,
            subscription,
        }
    }

    /// The latest projection.
    pub fn get(&self) -> U {
        self.current.borrow().clone()
    }

    /// Borrow the latest projection without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&U) -> R) -> R {
        f(&self.current.borrow())
    }

    pub fn borrow(&self) -> Ref<'_, U> {
        self.current.borrow()
    }
}

impl<U> Drop for Binding<U> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<U: fmt::Debug> fmt::Debug for Binding<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("current", &self.current.borrow())
            .finish()
    }
}

/// Bind `selector` over `store`; see [`Binding::new`].
///
/// # Example
///
/// ```
/// use tinstore::{create_binding, State, Store, Value};
///
/// let store = Store::new(|_, _, _| State::new().with("count", 1).with("other", 0), vec![]);
/// let count = create_binding(
///     &store,
///     |s| s.get("count").and_then(Value::as_int),
///     |count| println!("count is now {count:?}"),
/// );
///
/// store.set_state(State::new().with("count", 2), false);
/// assert_eq!(count.get(), Some(2));
/// ```
pub fn create_binding<U, S, C>(store: &Store, selector: S, on_change: C) -> Binding<U>
where
    U: Clone + PartialEq + 'static,
    S: Fn(&State) -> U + 'static,
    C: Fn(&U) + 'static,
{
    Binding::new(store, selector, on_change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Value;
    use std::cell::Cell;

    fn store() -> Store {
        Store::new(|_, _, _| State::new().with("count", 0).with("label", "a"), vec![])
    }

    fn count(state: &State) -> i64 {
        state.get("count").and_then(Value::as_int).unwrap_or_default()
    }

    #[test]
    fn notifies_only_when_projection_changes() {
        let store = store();
        let changes = Rc::new(Cell::new(0));
        let seen = changes.clone();
        let binding = Binding::new(&store, count, move |_| seen.set(seen.get() + 1));

        store.set_state(State::new().with("label", "b"), false);
        assert_eq!(changes.get(), 0);

        store.set_state(State::new().with("count", 3), false);
        assert_eq!(changes.get(), 1);
        assert_eq!(binding.get(), 3);
        assert_eq!(binding.with(|n| n * 2), 6);
    }

    #[test]
    fn dropping_unsubscribes() {
        let store = store();
        let binding = Binding::new(&store, count, |_| {});
        assert_eq!(store.listener_count(), 1);

        drop(binding);

        assert_eq!(store.listener_count(), 0);
    }
}
