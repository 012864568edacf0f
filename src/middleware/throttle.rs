use super::{from_fn, Middleware};
use crate::runtime::{TimerId, Timers};
use crate::state::State;
use crate::store::{MiddlewareApi, SetState, Update};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

/// Window configuration for [`throttle`].
///
/// Deserializes from `{"wait": 250, "leading": true, "trailing": false}`
/// with every key optional; `wait` is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleOptions {
    #[serde(with = "millis")]
    pub wait: Duration,
    pub leading: bool,
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(1000),
            leading: true,
            trailing: true,
        }
    }
}

impl ThrottleOptions {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(wait: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

struct Pending {
    update: Update,
    replace: bool,
}

/// Mutable state of one throttle application.
struct Gate {
    options: ThrottleOptions,
    active: bool,
    seen_tracked: bool,
    pending: Option<Pending>,
    timer: Option<TimerId>,
    timers: Rc<dyn Timers>,
}

impl Drop for Gate {
    fn drop(&mut self) {
        if let Some(id) = self.timer.take() {
            self.timers.cancel(id);
        }
    }
}

/// Whether `update` changes at least one tracked field of `current`.
///
/// Plain fragments never count; only functions of the current state do.
fn is_dirty(paths: &[String], current: &State, update: &Update, replace: bool) -> bool {
    if !update.is_function() {
        return false;
    }
    let fragment = update.resolve(current);
    paths.iter().any(|path| {
        let before = current.get(path);
        let after = match fragment.get(path) {
            Some(value) => Some(value),
            None if replace => None,
            None => before,
        };
        match (before, after) {
            (Some(before), Some(after)) => !before.same_data(after),
            (before, after) => before.is_some() != after.is_some(),
        }
    })
}

fn admit(gate: &Rc<RefCell<Gate>>, next: &SetState, update: Update, replace: bool) {
    let mut state = gate.borrow_mut();

    if state.active {
        if state.options.trailing {
            debug!(replace, "throttled update queued");
            state.pending = Some(Pending { update, replace });
        } else {
            debug!("throttled update dropped");
        }
        return;
    }

    // Only the very first tracked update of a gate may be deferred; every
    // later window opens on the leading edge.
    let defer = !state.seen_tracked && !state.options.leading;
    let flush = defer || state.options.trailing;
    state.seen_tracked = true;
    state.active = true;

    let task = {
        let gate = Rc::downgrade(gate);
        let next = next.clone();
        Box::new(move || expire(&gate, &next, flush))
    };
    let id = state.timers.schedule(state.options.wait, task);
    state.timer = Some(id);

    if defer {
        debug!("first throttled update deferred to window end");
        state.pending = Some(Pending { update, replace });
        return;
    }
    drop(state);
    next.call(update, replace);
}

fn expire(gate: &Weak<RefCell<Gate>>, next: &SetState, flush: bool) {
    let Some(gate) = gate.upgrade() else {
        return;
    };
    let pending = {
        let mut state = gate.borrow_mut();
        state.active = false;
        state.timer = None;
        state.pending.take()
    };
    match pending {
        Some(pending) if flush => {
            debug!(replace = pending.replace, "flushing throttled update");
            next.call(pending.update, pending.replace);
        }
        _ => {}
    }
}

/// Rate-limit commits that change any of `paths`.
///
/// Commits whose update is a function of the current state and changes at
/// least one tracked field go through a window gate: with `leading`, the
/// first one applies immediately and opens a `wait`-long window; commits
/// arriving while the window is open are dropped, except that with
/// `trailing` the most recent one is applied when the window closes.
/// Everything else passes straight through.
///
/// With `leading` disabled, only the gate's first tracked commit is held
/// back until its window closes; later windows open on the leading edge.
///
/// The gate's pending timer is cancelled when the store is dropped.
pub fn throttle<I, S>(
    paths: I,
    options: ThrottleOptions,
    timers: impl Timers + 'static,
) -> Box<dyn Middleware>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let paths: Rc<[String]> = paths.into_iter().map(Into::into).collect();
    let timers: Rc<dyn Timers> = Rc::new(timers);

    from_fn(move |api: MiddlewareApi, next: SetState| {
        if paths.is_empty() {
            return next;
        }
        let gate = Rc::new(RefCell::new(Gate {
            options,
            active: false,
            seen_tracked: false,
            pending: None,
            timer: None,
            timers,
        }));

        SetState::new(move |update, replace| {
            if is_dirty(&paths, &api.get_state(), &update, replace) {
                admit(&gate, &next, update, replace);
            } else {
                next.call(update, replace);
            }
        })
    })
}
