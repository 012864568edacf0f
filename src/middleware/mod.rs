//! Middleware: wrappers around the commit function.
//!
//! A middleware receives the restricted [`MiddlewareApi`] and the next
//! [`SetState`] in the chain and returns a new `SetState`. Given the list
//! `[a, b]`, a commit runs `a`, then `b`, then the store core.
//!
//! Plain closures implement [`Middleware`]; [`from_fn`] boxes one for the
//! list passed to [`Store::new`](crate::Store::new).

mod devtools;
mod draft;
mod logger;
mod persist;
mod throttle;

use crate::store::{MiddlewareApi, SetState};

pub use devtools::{devtools, DevtoolsOptions, Inspector, InspectorConnection, InspectorMessage};
pub use draft::draft;
pub use logger::{logger, Formatter, LoggerOptions};
pub use persist::{
    persist, Deserializer, FileStorage, MemoryStorage, PersistOptions, Serializer, Storage,
};
pub use throttle::{throttle, ThrottleOptions};

/// Wraps the next commit function in the chain.
pub trait Middleware {
    fn wrap(self: Box<Self>, api: MiddlewareApi, next: SetState) -> SetState;
}

impl<F> Middleware for F
where
    F: FnOnce(MiddlewareApi, SetState) -> SetState,
{
    fn wrap(self: Box<Self>, api: MiddlewareApi, next: SetState) -> SetState {
        (*self)(api, next)
    }
}

/// Box a closure as a middleware.
///
/// ```
/// use tinstore::middleware::from_fn;
/// use tinstore::{SetState, State, Store};
///
/// let tag = from_fn(|_api, next: SetState| {
///     SetState::new(move |update, replace| next.call(update, replace))
/// });
/// let store = Store::new(|_, _, _| State::new(), vec![tag]);
/// # drop(store);
/// ```
pub fn from_fn<F>(f: F) -> Box<dyn Middleware>
where
    F: FnOnce(MiddlewareApi, SetState) -> SetState + 'static,
{
    Box::new(f)
}

/// Fold `middlewares` around `terminal`, last one innermost.
pub(crate) fn compose(
    api: MiddlewareApi,
    middlewares: Vec<Box<dyn Middleware>>,
    terminal: SetState,
) -> SetState {
    middlewares
        .into_iter()
        .rev()
        .fold(terminal, |next, middleware| middleware.wrap(api.clone(), next))
}
