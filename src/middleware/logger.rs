use super::{from_fn, Middleware};
use crate::state::State;
use crate::store::{MiddlewareApi, SetState};
use std::fmt;
use std::rc::Rc;
use tracing::info;

/// Renders a state snapshot for the log.
pub type Formatter = Rc<dyn Fn(&State) -> String>;

/// Configuration for [`logger`].
#[derive(Clone)]
pub struct LoggerOptions {
    pub enabled: bool,
    pub name: String,
    /// Defaults to the state's `Debug` output.
    pub formatter: Option<Formatter>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "Store".to_string(),
            formatter: None,
        }
    }
}

impl LoggerOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&State) -> String + 'static,
    {
        self.formatter = Some(Rc::new(formatter));
        self
    }
}

impl fmt::Debug for LoggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOptions")
            .field("enabled", &self.enabled)
            .field("name", &self.name)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Log every commit passing through as an `info` span named after the
/// store, with the state before, the update, and the state after.
///
/// No-op commits are logged too; their before and after records match.
pub fn logger(options: LoggerOptions) -> Box<dyn Middleware> {
    from_fn(move |api: MiddlewareApi, next: SetState| {
        if !options.enabled {
            return next;
        }
        let LoggerOptions {
            name, formatter, ..
        } = options;
        let render = move |state: &State| match &formatter {
            Some(format) => format(state),
            None => format!("{state:?}"),
        };

        SetState::new(move |update, replace| {
            let span = tracing::info_span!("state_update", store = %name);
            let _entered = span.enter();

            info!(state = %render(&api.get_state()), "prev state");
            info!(?update, replace, "action");
            next.call(update, replace);
            info!(state = %render(&api.get_state()), "next state");
        })
    })
}
