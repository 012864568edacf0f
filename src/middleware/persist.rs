use super::{from_fn, Middleware};
use crate::error::PersistError;
use crate::state::State;
use crate::store::{MiddlewareApi, SetState};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// A string key-value backend.
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove_item(&self, key: &str) -> Result<(), PersistError>;
}

/// In-process storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Turns a snapshot into stored text.
pub type Serializer = Rc<dyn Fn(&State) -> Result<String, PersistError>>;

/// Turns stored text back into a snapshot.
pub type Deserializer = Rc<dyn Fn(&str) -> Result<State, PersistError>>;

fn to_json(state: &State) -> Result<String, PersistError> {
    Ok(serde_json::to_string(state)?)
}

fn from_json(text: &str) -> Result<State, PersistError> {
    Ok(serde_json::from_str(text)?)
}

/// Configuration for [`persist`].
#[derive(Clone)]
pub struct PersistOptions {
    /// Storage key.
    pub name: String,
    pub storage: Rc<dyn Storage>,
    pub serialize: Serializer,
    pub deserialize: Deserializer,
}

impl PersistOptions {
    /// JSON into a fresh [`MemoryStorage`] under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: Rc::new(MemoryStorage::new()),
            serialize: Rc::new(to_json),
            deserialize: Rc::new(from_json),
        }
    }

    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Rc::new(storage);
        self
    }

    pub fn with_serializer<F>(mut self, serialize: F) -> Self
    where
        F: Fn(&State) -> Result<String, PersistError> + 'static,
    {
        self.serialize = Rc::new(serialize);
        self
    }

    pub fn with_deserializer<F>(mut self, deserialize: F) -> Self
    where
        F: Fn(&str) -> Result<State, PersistError> + 'static,
    {
        self.deserialize = Rc::new(deserialize);
        self
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn hydrate(options: &PersistOptions) -> Result<Option<State>, PersistError> {
    match options.storage.get_item(&options.name)? {
        Some(text) => (options.deserialize)(&text).map(Some),
        None => Ok(None),
    }
}

/// Mirror the store's data fields into `options.storage`.
///
/// The stored snapshot is read once, when the middleware is applied, and
/// committed to the store; those fields then take precedence over the
/// factory's defaults. After that every notified commit writes the new
/// snapshot. Failures on either side are logged and otherwise ignored.
pub fn persist(options: PersistOptions) -> Box<dyn Middleware> {
    from_fn(move |api: MiddlewareApi, next: SetState| {
        match hydrate(&options) {
            Ok(Some(state)) => {
                debug!(key = %options.name, fields = state.len(), "hydrated persisted state");
                api.set_state(state, false);
            }
            Ok(None) => {}
            Err(err) => warn!(key = %options.name, error = %err, "failed to load persisted state"),
        }

        api.subscribe(move |state| {
            let written = (options.serialize)(state)
                .and_then(|text| options.storage.set_item(&options.name, &text));
            if let Err(err) = written {
                warn!(key = %options.name, error = %err, "failed to persist state");
            }
        });

        next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, Value};
    use crate::store::Store;

    fn counter(storage: &MemoryStorage) -> Store {
        Store::new(
            |set, _, _| {
                State::new().with("count", 0).with(
                    "increment",
                    Action::unit(move || {
                        set.update(|s| {
                            let n = s.get("count").and_then(Value::as_int).unwrap_or(0);
                            State::new().with("count", n + 1)
                        })
                    }),
                )
            },
            vec![persist(
                PersistOptions::new("counter").with_storage(storage.clone()),
            )],
        )
    }

    #[test]
    fn writes_data_fields_on_commit() {
        let storage = MemoryStorage::new();
        let store = counter(&storage);

        store.get_state().call("increment").unwrap();

        assert_eq!(
            storage.get_item("counter").unwrap().as_deref(),
            Some(r#"{"count":1}"#)
        );
    }

    #[test]
    fn hydrated_fields_win_over_defaults() {
        let storage = MemoryStorage::new();
        storage.set_item("counter", r#"{"count":41}"#).unwrap();

        let store = counter(&storage);
        store.get_state().call("increment").unwrap();

        assert_eq!(store.get_state().get("count"), Some(&Value::from(42)));
    }

    #[test]
    fn corrupt_snapshot_is_ignored() {
        let storage = MemoryStorage::new();
        storage.set_item("counter", "{not json").unwrap();

        let store = counter(&storage);

        assert_eq!(store.get_state().get("count"), Some(&Value::from(0)));
    }

    #[test]
    fn file_storage_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get_item("app").unwrap(), None);
        storage.set_item("app", "{}").unwrap();
        assert_eq!(storage.get_item("app").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("nested/app.json").exists());

        storage.remove_item("app").unwrap();
        storage.remove_item("app").unwrap();
        assert_eq!(storage.get_item("app").unwrap(), None);
    }
}
