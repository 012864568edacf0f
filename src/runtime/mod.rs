//! Runtime support for time-based middleware.
//!
//! The store itself never waits on a clock. Middleware that does (the
//! throttle gate) asks a [`Timers`] implementation to run a task later.

mod timers;

#[cfg(feature = "tokio")]
pub use timers::TokioTimers;
pub use timers::{ManualTimers, Task, TimerId, Timers};
