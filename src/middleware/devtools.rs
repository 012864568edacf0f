use super::{from_fn, Middleware};
use crate::state::State;
use crate::store::{MiddlewareApi, SetState};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, warn};

const DEFAULT_NAME: &str = "tinstore";

/// Configuration for [`devtools`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevtoolsOptions {
    /// Connection name shown by the inspector; defaults to `"tinstore"`.
    pub name: Option<String>,
    /// `Some(false)` turns the bridge off; `Some(true)` warns when no
    /// inspector is available.
    pub enabled: Option<bool>,
}

impl DevtoolsOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

/// A message sent by the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectorMessage {
    /// Time travel: restore the JSON-encoded snapshot.
    JumpToState(String),
    /// Anything else; ignored.
    Other(String),
}

/// An open channel to an inspector.
pub trait InspectorConnection {
    fn send(&self, action: &str, state: &State);
}

/// An external state inspector (a debugger UI, a recorder, ...).
pub trait Inspector {
    fn connect(
        &self,
        name: &str,
        on_message: Box<dyn Fn(InspectorMessage)>,
    ) -> Rc<dyn InspectorConnection>;
}

fn restore(next: &SetState, current: &State, json: &str) {
    match serde_json::from_str::<State>(json) {
        Ok(restored) => {
            debug!(fields = restored.len(), "jumping to inspected state");
            next.replace(current.actions().merged(&restored));
        }
        Err(err) => warn!(error = %err, "inspector sent an unreadable state"),
    }
}

/// Bridge the store to an [`Inspector`].
///
/// Every notified commit is sent as `"State Update"`. A
/// [`InspectorMessage::JumpToState`] replaces the data fields with the
/// decoded snapshot through the rest of the chain, keeping the current
/// actions.
pub fn devtools(
    options: DevtoolsOptions,
    inspector: Option<Rc<dyn Inspector>>,
) -> Box<dyn Middleware> {
    from_fn(move |api: MiddlewareApi, next: SetState| {
        if options.enabled == Some(false) {
            return next;
        }
        let Some(inspector) = inspector else {
            if options.enabled == Some(true) {
                warn!("devtools enabled but no inspector is available");
            }
            return next;
        };

        let name = options.name.as_deref().unwrap_or(DEFAULT_NAME);
        let on_message = {
            let api = api.clone();
            let next = next.clone();
            Box::new(move |message: InspectorMessage| match message {
                InspectorMessage::JumpToState(json) => restore(&next, &api.get_state(), &json),
                InspectorMessage::Other(kind) => debug!(%kind, "inspector message ignored"),
            })
        };
        let connection = inspector.connect(name, on_message);
        api.subscribe(move |state| connection.send("State Update", state));

        next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, Value};
    use crate::store::Store;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        name: RefCell<Option<String>>,
        sent: RefCell<Vec<(String, State)>>,
        handler: RefCell<Option<Box<dyn Fn(InspectorMessage)>>>,
    }

    impl InspectorConnection for Recorder {
        fn send(&self, action: &str, state: &State) {
            self.sent.borrow_mut().push((action.to_owned(), state.clone()));
        }
    }

    struct FakeInspector(Rc<Recorder>);

    impl Inspector for FakeInspector {
        fn connect(
            &self,
            name: &str,
            on_message: Box<dyn Fn(InspectorMessage)>,
        ) -> Rc<dyn InspectorConnection> {
            *self.0.name.borrow_mut() = Some(name.to_owned());
            *self.0.handler.borrow_mut() = Some(on_message);
            self.0.clone()
        }
    }

    fn store(options: DevtoolsOptions, recorder: &Rc<Recorder>) -> Store {
        let inspector: Rc<dyn Inspector> = Rc::new(FakeInspector(recorder.clone()));
        Store::new(
            |_, _, _| {
                State::new()
                    .with("count", 0)
                    .with("reset", Action::unit(|| {}))
            },
            vec![devtools(options, Some(inspector))],
        )
    }

    #[test]
    fn sends_every_commit() {
        let recorder = Rc::new(Recorder::default());
        let store = store(DevtoolsOptions::default(), &recorder);

        store.set_state(State::new().with("count", 1), false);

        assert_eq!(recorder.name.borrow().as_deref(), Some("tinstore"));
        let sent = recorder.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "State Update");
        assert_eq!(sent[0].1.get("count"), Some(&Value::from(1)));
    }

    #[test]
    fn jump_to_state_keeps_actions() {
        let recorder = Rc::new(Recorder::default());
        let store = store(DevtoolsOptions::default().with_name("app"), &recorder);
        let reset = store.get_state().get("reset").cloned();

        let handler = recorder.handler.borrow_mut().take().unwrap();
        handler(InspectorMessage::JumpToState(r#"{"count":7}"#.to_owned()));
        handler(InspectorMessage::JumpToState("garbage".to_owned()));
        handler(InspectorMessage::Other("COMMIT".to_owned()));

        let state = store.get_state();
        assert_eq!(recorder.name.borrow().as_deref(), Some("app"));
        assert_eq!(state.get("count"), Some(&Value::from(7)));
        assert_eq!(state.get("reset"), reset.as_ref());
    }

    #[test]
    fn disabled_bridge_never_connects() {
        let recorder = Rc::new(Recorder::default());
        let store = store(DevtoolsOptions::default().with_enabled(false), &recorder);

        store.set_state(State::new().with("count", 1), false);

        assert!(recorder.name.borrow().is_none());
        assert!(recorder.sent.borrow().is_empty());
    }

    #[test]
    fn missing_inspector_is_a_pass_through() {
        let store = Store::new(
            |_, _, _| State::new().with("count", 0),
            vec![devtools(DevtoolsOptions::default().with_enabled(true), None)],
        );
        store.setter().set(State::new().with("count", 2));
        assert_eq!(store.get_state().get("count"), Some(&Value::from(2)));
    }
}
