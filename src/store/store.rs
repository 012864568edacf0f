use super::listeners::{Listener, ListenerId, ListenerSet};
use super::update::{SetState, Update};
use crate::middleware::{compose, Middleware};
use crate::state::State;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// The state cell and its listeners.
///
/// No `RefCell` borrow is held while user code (update functions, listeners)
/// runs, so both may re-enter the store.
struct Core {
    state: RefCell<State>,
    listeners: RefCell<ListenerSet>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
            listeners: RefCell::new(ListenerSet::default()),
        }
    }

    fn get_state(&self) -> State {
        self.state.borrow().clone()
    }

    fn commit(&self, update: Update, replace: bool) {
        let current = self.get_state();
        let fragment = update.resolve(&current);

        if current.is_unchanged_by(&fragment) {
            trace!(fields = fragment.len(), "commit skipped: no field changed");
            return;
        }

        let next = if replace {
            fragment
        } else {
            current.merged(&fragment)
        };
        *self.state.borrow_mut() = next.clone();

        let listeners = self.listeners.borrow().snapshot();
        trace!(replace, listeners = listeners.len(), "state committed");
        for listener in listeners {
            listener.notify(&next);
        }
    }

    /// Install the factory's state under anything committed while the
    /// middleware chain was being built.
    fn install(&self, initial: State) {
        let committed = self.get_state();
        *self.state.borrow_mut() = initial.merged(&committed);
    }

    fn subscribe(self: &Rc<Self>, listener: Listener) -> Unsubscribe {
        let id = self.listeners.borrow_mut().insert(listener);
        if id.is_none() {
            debug!("subscribe after destroy ignored");
        }
        Unsubscribe {
            core: Rc::downgrade(self),
            id,
        }
    }

    fn destroy(&self) {
        self.listeners.borrow_mut().destroy();
        debug!("store destroyed");
    }
}

fn read(core: &Weak<Core>) -> State {
    core.upgrade().map(|core| core.get_state()).unwrap_or_default()
}

fn commit(core: &Weak<Core>, update: Update, replace: bool) {
    match core.upgrade() {
        Some(core) => core.commit(update, replace),
        None => debug!("commit dropped: store no longer exists"),
    }
}

fn subscribe(core: &Weak<Core>, listener: Listener) -> Unsubscribe {
    match core.upgrade() {
        Some(core) => core.subscribe(listener),
        None => Unsubscribe {
            core: Weak::new(),
            id: None,
        },
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it does not unsubscribe; calling [`Unsubscribe::unsubscribe`]
/// does, and calling it again is a no-op.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    core: Weak<Core>,
    id: Option<ListenerId>,
}

impl Unsubscribe {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let (Some(core), Some(id)) = (self.core.upgrade(), self.id) {
            core.listeners.borrow_mut().remove(id);
        }
    }
}

/// Reads the current state; handed to the state factory.
#[derive(Clone)]
pub struct GetState {
    core: Weak<Core>,
}

impl GetState {
    /// The current snapshot.
    pub fn get(&self) -> State {
        read(&self.core)
    }
}

/// The full store API handed to the state factory.
///
/// `set_state` commits straight to the core without passing through the
/// middleware chain. Once the store is dropped, reads return an empty state
/// and commits are discarded.
#[derive(Clone)]
pub struct StoreApi {
    core: Weak<Core>,
}

impl StoreApi {
    /// The current snapshot.
    pub fn get_state(&self) -> State {
        read(&self.core)
    }

    /// Commit straight to the core, bypassing every middleware.
    pub fn set_state(&self, update: impl Into<Update>, replace: bool) {
        commit(&self.core, update.into(), replace)
    }

    /// Register a listener called after every committed change.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&State) + 'static,
    {
        subscribe(&self.core, Listener::new(listener))
    }

    /// Drop every listener for good.
    pub fn destroy(&self) {
        if let Some(core) = self.core.upgrade() {
            core.destroy();
        }
    }
}

/// The restricted store API handed to middleware: no `destroy`.
#[derive(Clone)]
pub struct MiddlewareApi {
    core: Weak<Core>,
}

impl MiddlewareApi {
    /// The current snapshot.
    pub fn get_state(&self) -> State {
        read(&self.core)
    }

    /// Commit straight to the core, bypassing every middleware.
    pub fn set_state(&self, update: impl Into<Update>, replace: bool) {
        commit(&self.core, update.into(), replace)
    }

    /// Register a listener called after every committed change.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&State) + 'static,
    {
        subscribe(&self.core, Listener::new(listener))
    }
}

/// A single-threaded observable state container.
///
/// Cloning a store yields another handle to the same state and listeners.
///
/// # Examples
///
/// ```
/// use tinstore::{Action, State, Store, Value};
///
/// let store = Store::new(
///     |set, _get, _api| {
///         State::new().with("count", 0).with(
///             "increment",
///             Action::unit(move || {
///                 set.update(|state| {
///                     let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
///                     State::new().with("count", count + 1)
///                 })
///             }),
///         )
///     },
///     vec![],
/// );
///
/// store.get_state().call("increment").unwrap();
/// assert_eq!(store.select(|s| s.get("count").and_then(Value::as_int)), Some(1));
/// ```
#[derive(Clone)]
pub struct Store {
    core: Rc<Core>,
    set: SetState,
}

impl Store {
    /// Build a store.
    ///
    /// The middleware chain is composed first, right to left, so the first
    /// middleware is the outermost. `factory` then runs exactly once with the
    /// composed chain as `set`. Fields committed while the chain was being
    /// built (for example by a persistence layer hydrating from storage) take
    /// precedence over the factory's defaults.
    pub fn new<F>(factory: F, middlewares: Vec<Box<dyn Middleware>>) -> Self
    where
        F: FnOnce(SetState, GetState, &StoreApi) -> State,
    {
        let core = Rc::new(Core::new());
        let weak = Rc::downgrade(&core);
        let layers = middlewares.len();

        let terminal = {
            let core = weak.clone();
            SetState::new(move |update, replace| commit(&core, update, replace))
        };
        let set = compose(MiddlewareApi { core: weak.clone() }, middlewares, terminal);

        let api = StoreApi { core: weak.clone() };
        let initial = factory(set.clone(), GetState { core: weak }, &api);
        core.install(initial);
        debug!(
            fields = core.state.borrow().len(),
            middlewares = layers,
            "store created"
        );

        Self { core, set }
    }

    /// The current snapshot.
    pub fn get_state(&self) -> State {
        self.core.get_state()
    }

    /// Commit straight to the core, bypassing the middleware chain.
    ///
    /// Use [`Store::setter`] to go through the chain.
    pub fn set_state(&self, update: impl Into<Update>, replace: bool) {
        self.core.commit(update.into(), replace)
    }

    /// The composed commit function the factory received.
    pub fn setter(&self) -> SetState {
        self.set.clone()
    }

    /// The full API, as handed to the factory.
    pub fn api(&self) -> StoreApi {
        StoreApi {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Register a listener called, in subscription order, after every
    /// committed change.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&State) + 'static,
    {
        self.core.subscribe(Listener::new(listener))
    }

    /// Subscribe a shared listener handle; repeated handles collapse.
    pub fn subscribe_listener(&self, listener: Listener) -> Unsubscribe {
        self.core.subscribe(listener)
    }

    /// Drop every listener for good. State keeps changing, unobserved.
    pub fn destroy(&self) {
        self.core.destroy()
    }

    /// Project the current state.
    pub fn select<R>(&self, selector: impl FnOnce(&State) -> R) -> R {
        let state = self.get_state();
        selector(&state)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }
}

/// Shorthand for [`Store::new`].
pub fn create_store<F>(factory: F, middlewares: Vec<Box<dyn Middleware>>) -> Store
where
    F: FnOnce(SetState, GetState, &StoreApi) -> State,
{
    Store::new(factory, middlewares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, Value};
    use std::cell::{Cell, RefCell};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn count(state: &State) -> i64 {
        state.get("count").and_then(Value::as_int).unwrap_or_default()
    }

    fn counter() -> Store {
        Store::new(
            |set, _get, _api| {
                State::new()
                    .with("count", 0)
                    .with(
                        "increment",
                        Action::unit(move || set.update(|s| State::new().with("count", count(s) + 1))),
                    )
            },
            vec![],
        )
    }

    #[test]
    fn factory_state_is_initial() {
        let store = counter();
        assert_eq!(count(&store.get_state()), 0);
        assert!(store.get_state().get("increment").unwrap().is_action());
    }

    #[test]
    fn actions_update_state() {
        let store = counter();
        store.get_state().call("increment").unwrap();
        store.get_state().call("increment").unwrap();
        assert_eq!(count(&store.get_state()), 2);
    }

    #[test]
    fn merge_and_replace() {
        let store = Store::new(|_, _, _| State::new().with("a", 1).with("b", 2), vec![]);

        store.set_state(State::new().with("a", 9), false);
        assert_eq!(store.get_state(), State::new().with("a", 9).with("b", 2));

        store.set_state(State::new().with("a", 7), true);
        assert_eq!(store.get_state(), State::new().with("a", 7));
    }

    #[test]
    fn identical_fragment_is_a_no_op() {
        let store = counter();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        store.subscribe(move |_| seen.set(seen.get() + 1));

        let before = store.get_state();
        store.set_state(State::new().with("count", 0), false);
        store.setter().update(|s| State::new().with("count", count(s)));

        assert_eq!(calls.get(), 0);
        assert!(store.get_state().ptr_eq(&before));
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let store = counter();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = log.clone();
            store.subscribe(move |state| log.borrow_mut().push((name, count(state))));
        }

        store.get_state().call("increment").unwrap();

        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("third", 1)]
        );
    }

    #[test]
    fn unsubscribe_twice_is_harmless() {
        let store = counter();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let handle = store.subscribe(move |_| seen.set(seen.get() + 1));

        store.get_state().call("increment").unwrap();
        handle.unsubscribe();
        handle.unsubscribe();
        store.get_state().call("increment").unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn shared_listener_handle_registers_once() {
        let store = counter();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let listener = Listener::new(move |_| seen.set(seen.get() + 1));

        store.subscribe_listener(listener.clone());
        store.subscribe_listener(listener);
        store.get_state().call("increment").unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn destroy_is_final() {
        let store = counter();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        store.subscribe(move |_| seen.set(seen.get() + 1));

        store.destroy();
        store.get_state().call("increment").unwrap();
        let late = calls.clone();
        store.subscribe(move |_| late.set(late.get() + 1));
        store.get_state().call("increment").unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(count(&store.get_state()), 2);
    }

    #[test]
    fn listener_may_commit_reentrantly() {
        let store = Store::new(|_, _, _| State::new().with("a", 0).with("b", 0), vec![]);
        let api = store.api();
        store.subscribe(move |state| {
            if state.get("a") == Some(&Value::from(1)) {
                api.set_state(State::new().with("b", 1), false);
            }
        });

        store.set_state(State::new().with("a", 1), false);

        assert_eq!(store.get_state(), State::new().with("a", 1).with("b", 1));
    }

    #[test]
    fn subscribing_mid_pass_waits_for_next_commit() {
        let store = counter();
        let late_calls = Rc::new(Cell::new(0));
        let api = store.api();
        let late = late_calls.clone();
        let added = Cell::new(false);
        store.subscribe(move |_| {
            if !added.replace(true) {
                let late = late.clone();
                api.subscribe(move |_| late.set(late.get() + 1));
            }
        });

        store.get_state().call("increment").unwrap();
        assert_eq!(late_calls.get(), 0);

        store.get_state().call("increment").unwrap();
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn panicking_listener_stops_the_pass_but_keeps_the_commit() {
        let store = counter();
        let later = Rc::new(Cell::new(0));
        store.subscribe(|_| {});
        store.subscribe(|_| panic!("listener failed"));
        let seen = later.clone();
        store.subscribe(move |_| seen.set(seen.get() + 1));

        let result = catch_unwind(AssertUnwindSafe(|| {
            store.set_state(State::new().with("count", 5), false);
        }));

        assert!(result.is_err());
        assert_eq!(later.get(), 0);
        assert_eq!(count(&store.get_state()), 5);
    }

    #[test]
    fn panicking_update_leaves_state_untouched() {
        let store = counter();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        store.subscribe(move |_| seen.set(seen.get() + 1));
        let before = store.get_state();

        let result = catch_unwind(AssertUnwindSafe(|| {
            store.setter().update(|_| panic!("update failed"));
        }));

        assert!(result.is_err());
        assert!(store.get_state().ptr_eq(&before));
        assert_eq!(calls.get(), 0);

        store.get_state().call("increment").unwrap();
        assert_eq!(count(&store.get_state()), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn listener_removed_mid_pass_is_never_called_again() {
        let store = counter();
        let victim: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let target = victim.clone();
        store.subscribe(move |_| {
            if let Some(handle) = target.borrow_mut().take() {
                handle.unsubscribe();
            }
        });
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        *victim.borrow_mut() = Some(store.subscribe(move |_| seen.set(seen.get() + 1)));

        store.get_state().call("increment").unwrap();
        assert!(calls.get() <= 1);
        let after_first = calls.get();

        store.get_state().call("increment").unwrap();
        assert_eq!(calls.get(), after_first);
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn select_projects_current_state() {
        let store = counter();
        store.get_state().call("increment").unwrap();
        assert_eq!(store.select(count), 1);
    }

    #[test]
    fn dropped_store_discards_commits() {
        let store = counter();
        let set = store.setter();
        drop(store);
        set.set(State::new().with("count", 5));
    }
}
