use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Identifies one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A deferred task.
pub type Task = Box<dyn FnOnce()>;

/// The host's timer facility.
///
/// Tasks run on the thread that owns the store, never concurrently with a
/// commit. Cancelling a task that already ran (or was never scheduled) is a
/// no-op.
pub trait Timers {
    /// Run `task` once, after `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Forget a scheduled task.
    fn cancel(&self, id: TimerId);
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

/// A virtual clock that only moves when told to.
///
/// Handy for tests and for hosts that drive time from their own loop.
/// Clones share the same clock.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
/// use tinstore::runtime::{ManualTimers, Timers};
///
/// let timers = ManualTimers::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = fired.clone();
/// timers.schedule(Duration::from_millis(10), Box::new(move || flag.set(true)));
///
/// timers.advance(Duration::from_millis(9));
/// assert!(!fired.get());
/// timers.advance(Duration::from_millis(1));
/// assert!(fired.get());
/// ```
#[derive(Clone, Default)]
pub struct ManualTimers {
    inner: Rc<RefCell<ManualInner>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on this clock.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of tasks waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Move the clock forward, running every task that comes due, in
    /// deadline order. Tasks scheduled by a running task fire in the same
    /// call if their deadline falls within the advanced range.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                let key = match inner.queue.keys().next() {
                    Some(&key) if key.0 <= target => key,
                    _ => break,
                };
                inner.now = key.0;
                inner.queue.remove(&key)
            };
            if let Some(task) = task {
                task();
            }
        }
        self.inner.borrow_mut().now = target;
    }
}

impl Timers for ManualTimers {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let at = inner.now + delay;
        inner.queue.insert((at, id), task);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let task = {
            let mut inner = self.inner.borrow_mut();
            let key = inner.queue.keys().find(|(_, queued)| *queued == id.0).copied();
            key.and_then(|key| inner.queue.remove(&key))
        };
        // Dropped outside the borrow: the task may own handles that cancel
        // timers of their own when dropped.
        drop(task);
    }
}

impl fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ManualTimers")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_timers::TokioTimers;

#[cfg(feature = "tokio")]
mod tokio_timers {
    use super::{Task, TimerId, Timers};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::task::AbortHandle;

    #[derive(Default)]
    struct Registry {
        next_id: u64,
        handles: HashMap<u64, AbortHandle>,
    }

    /// Timers backed by tokio's clock.
    ///
    /// Tasks are spawned with `tokio::task::spawn_local`, so scheduling must
    /// happen inside a `LocalSet`.
    #[derive(Clone, Default)]
    pub struct TokioTimers {
        registry: Rc<RefCell<Registry>>,
    }

    impl TokioTimers {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pending(&self) -> usize {
            self.registry.borrow().handles.len()
        }
    }

    impl Timers for TokioTimers {
        fn schedule(&self, delay: Duration, task: Task) -> TimerId {
            let id = {
                let mut registry = self.registry.borrow_mut();
                let id = registry.next_id;
                registry.next_id += 1;
                id
            };
            let registry = Rc::downgrade(&self.registry);
            let handle = tokio::task::spawn_local(async move {
                tokio::time::sleep(delay).await;
                if let Some(registry) = registry.upgrade() {
                    registry.borrow_mut().handles.remove(&id);
                }
                task();
            });
            self.registry
                .borrow_mut()
                .handles
                .insert(id, handle.abort_handle());
            TimerId(id)
        }

        fn cancel(&self, id: TimerId) {
            let handle = self.registry.borrow_mut().handles.remove(&id.0);
            if let Some(handle) = handle {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let task = move |name: &'static str| -> Task {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name))
        };
        (log, task)
    }

    #[test]
    fn fires_in_deadline_order() {
        let timers = ManualTimers::new();
        let (log, task) = recorder();

        timers.schedule(Duration::from_millis(30), task("late"));
        timers.schedule(Duration::from_millis(10), task("early"));
        timers.schedule(Duration::from_millis(10), task("early-second"));

        timers.advance(Duration::from_millis(100));

        assert_eq!(*log.borrow(), vec!["early", "early-second", "late"]);
        assert_eq!(timers.now(), Duration::from_millis(100));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let timers = ManualTimers::new();
        let (log, task) = recorder();

        let id = timers.schedule(Duration::from_millis(10), task("cancelled"));
        timers.cancel(id);
        timers.cancel(id);
        timers.advance(Duration::from_millis(20));

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn tasks_may_schedule_more_tasks() {
        let timers = ManualTimers::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_log = log.clone();
        let inner_timers = timers.clone();
        timers.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_log.borrow_mut().push(inner_timers.now());
                let again = inner_log.clone();
                let clock = inner_timers.clone();
                inner_timers.schedule(
                    Duration::from_millis(10),
                    Box::new(move || again.borrow_mut().push(clock.now())),
                );
            }),
        );

        timers.advance(Duration::from_millis(25));

        assert_eq!(
            *log.borrow(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn tokio_timers_follow_the_runtime_clock() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let timers = TokioTimers::new();
                let (log, task) = recorder();

                timers.schedule(Duration::from_millis(100), task("fired"));
                let id = timers.schedule(Duration::from_millis(100), task("cancelled"));
                timers.cancel(id);

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert!(log.borrow().is_empty());

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(*log.borrow(), vec!["fired"]);
                assert_eq!(timers.pending(), 0);
            })
            .await;
    }
}
