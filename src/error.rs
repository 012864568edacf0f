use thiserror::Error;

/// Errors raised by state records at the typed boundary and by action lookup.
///
/// The commit path itself never fails: update functions and listeners that
/// panic unwind straight through `set_state`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// `State::call` named a field that does not exist.
    #[error("no field named `{0}`")]
    UnknownField(String),

    /// `State::call` named a field that holds data, not an action.
    #[error("field `{field}` is a {kind}, not an action")]
    NotAnAction {
        /// The field that was called.
        field: String,
        /// What the field holds instead.
        kind: &'static str,
    },

    /// A typed value did not serialize to a JSON object.
    #[error("state root must be an object, found {0}")]
    NotAnObject(&'static str),

    /// Conversion between a typed shape and a state record failed.
    #[error("state conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
}

/// Errors raised by persistence backends.
///
/// The persist middleware recovers from every one of these locally and
/// reports it with `tracing::warn!`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The state could not be serialized or the stored text could not be parsed.
    #[error("state (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The stored snapshot decoded to something other than a state record.
    #[error(transparent)]
    State(#[from] StoreError),
}
