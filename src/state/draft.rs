use super::State;
use std::ops::{Deref, DerefMut};

/// A mutable working copy of a state snapshot.
///
/// Edits go through [`State`]'s copy-on-write methods, so only the fields and
/// nested maps or lists that are actually written get copied. Everything else
/// stays shared with (and identical to) the snapshot the draft started from.
#[derive(Debug)]
pub struct Draft {
    working: State,
}

impl Draft {
    fn new(base: &State) -> Self {
        Self {
            working: base.clone(),
        }
    }

    /// Discard the edits so far and make `state` the draft's result.
    pub fn replace(&mut self, state: State) {
        self.working = state;
    }

    /// The snapshot as currently edited.
    pub fn current(&self) -> &State {
        &self.working
    }
}

impl Deref for Draft {
    type Target = State;

    fn deref(&self) -> &State {
        &self.working
    }
}

impl DerefMut for Draft {
    fn deref_mut(&mut self) -> &mut State {
        &mut self.working
    }
}

/// Run `recipe` against a draft of `base` and return the resulting snapshot.
///
/// A recipe that writes nothing (or only writes identical values) returns a
/// snapshot that is [`State::ptr_eq`] to `base`.
pub fn produce<F>(base: &State, recipe: F) -> State
where
    F: FnOnce(&mut Draft),
{
    let mut draft = Draft::new(base);
    recipe(&mut draft);
    draft.working
}
