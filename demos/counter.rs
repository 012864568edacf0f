//! Counter application: actions, logging and a throttled tracked field

use std::time::Duration;
use tinstore::middleware::{logger, throttle, LoggerOptions, ThrottleOptions};
use tinstore::{create_binding, Action, State, Store, TokioTimers, Value};

fn count(state: &State) -> i64 {
    state.get("count").and_then(Value::as_int).unwrap_or_default()
}

fn counter(timers: TokioTimers) -> Store {
    Store::new(
        |set, _get, _api| {
            let step = set.clone();
            State::new()
                .with("count", 0)
                .with("step", 1)
                .with(
                    "increment",
                    Action::unit(move || {
                        set.update(|s| {
                            let step = s.get("step").and_then(Value::as_int).unwrap_or(1);
                            State::new().with("count", count(s) + step)
                        })
                    }),
                )
                .with(
                    "set_step",
                    Action::new(move |value: Value| step.set(State::new().with("step", value))),
                )
        },
        vec![
            logger(LoggerOptions::default().with_name("Counter")),
            throttle(
                ["count"],
                ThrottleOptions::default().with_wait(Duration::from_millis(200)),
                timers,
            ),
        ],
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== Throttled Counter ===\n");

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let store = counter(TokioTimers::new());
            let _display = create_binding(&store, count, |count| {
                println!("   [Display] count = {count}");
            });

            println!("1. Burst of five increments");
            for _ in 0..5 {
                store.get_state().call("increment").ok();
            }
            println!("   count right after the burst: {}", count(&store.get_state()));

            println!("\n2. Waiting for the window to close");
            tokio::time::sleep(Duration::from_millis(250)).await;
            println!("   count after the window: {}", count(&store.get_state()));

            println!("\n3. Changing the step (not throttled)");
            store.get_state().call_with("set_step", 10).ok();
            store.get_state().call("increment").ok();
            println!("   final count: {}", count(&store.get_state()));
        })
        .await;
}
