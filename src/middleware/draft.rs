use super::{from_fn, Middleware};
use crate::state::produce;
use crate::store::{MiddlewareApi, SetState, Update};

/// Rewrite draft recipes into plain compute functions.
///
/// Layers below this one only ever see fragments and compute functions.
/// The compute function runs the recipe against a copy-on-write draft of the
/// state it is given, so untouched fields stay identical.
pub fn draft() -> Box<dyn Middleware> {
    from_fn(|_api: MiddlewareApi, next: SetState| {
        SetState::new(move |update, replace| match update {
            Update::Draft(recipe) => next.call(
                Update::compute(move |state| produce(state, |draft| recipe(draft))),
                replace,
            ),
            other => next.call(other, replace),
        })
    })
}
