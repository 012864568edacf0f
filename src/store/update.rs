use crate::state::{produce, Draft, State};
use std::fmt;
use std::rc::Rc;

/// A pure function from the current state to a fragment.
pub type ComputeFn = Rc<dyn Fn(&State) -> State>;

/// An in-place edit of a draft of the current state.
pub type Recipe = Rc<dyn Fn(&mut Draft)>;

/// One attempted state transition.
#[derive(Clone)]
pub enum Update {
    /// A fragment merged into (or replacing) the current state.
    Fragment(State),
    /// A function of the current state producing the fragment.
    Compute(ComputeFn),
    /// A draft recipe; its result is the whole edited snapshot.
    Draft(Recipe),
}

impl Update {
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&State) -> State + 'static,
    {
        Update::Compute(Rc::new(f))
    }

    pub fn draft<F>(f: F) -> Self
    where
        F: Fn(&mut Draft) + 'static,
    {
        Update::Draft(Rc::new(f))
    }

    /// Function-form updates depend on the state they are applied to.
    pub fn is_function(&self) -> bool {
        !matches!(self, Update::Fragment(_))
    }

    /// The concrete fragment this update produces against `current`.
    pub fn resolve(&self, current: &State) -> State {
        match self {
            Update::Fragment(fragment) => fragment.clone(),
            Update::Compute(f) => f(current),
            Update::Draft(recipe) => produce(current, |draft| recipe(draft)),
        }
    }
}

impl From<State> for Update {
    fn from(fragment: State) -> Self {
        Update::Fragment(fragment)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Fragment(fragment) => f.debug_tuple("Fragment").field(fragment).finish(),
            Update::Compute(_) => f.write_str("Compute(<fn>)"),
            Update::Draft(_) => f.write_str("Draft(<fn>)"),
        }
    }
}

/// A commit function: the store core, or a middleware wrapped around it.
///
/// Cloning shares the same function. The `bool` passed along with every
/// update is the replace flag.
#[derive(Clone)]
pub struct SetState(Rc<dyn Fn(Update, bool)>);

impl SetState {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Update, bool) + 'static,
    {
        Self(Rc::new(f))
    }

    /// Submit `update` with an explicit replace flag.
    pub fn call(&self, update: impl Into<Update>, replace: bool) {
        (self.0)(update.into(), replace)
    }

    /// Submit `update`, merging the result into the current state.
    pub fn set(&self, update: impl Into<Update>) {
        self.call(update, false)
    }

    /// Submit `update`, making the result the whole next state.
    pub fn replace(&self, update: impl Into<Update>) {
        self.call(update, true)
    }

    /// Merge the fragment computed from the current state.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&State) -> State + 'static,
    {
        self.set(Update::compute(f))
    }

    /// Edit a draft of the current state in place.
    pub fn mutate<F>(&self, f: F)
    where
        F: Fn(&mut Draft) + 'static,
    {
        self.set(Update::draft(f))
    }
}

impl fmt::Debug for SetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SetState(<fn>)")
    }
}
