use super::Value;
use crate::error::StoreError;
use serde::de::{self, Deserialize, DeserializeOwned, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::rc::Rc;

type Fields = im::OrdMap<String, Value>;

/// An immutable-by-convention record of named fields.
///
/// `State` is both the store's current value and the shape of every partial
/// update ("fragment"). Cloning is O(1) and yields an *identical* record
/// ([`State::ptr_eq`]). Mutating methods copy the shared field table on first
/// write, so a snapshot handed out by the store never changes underneath its
/// holder.
#[derive(Clone, Default)]
pub struct State {
    fields: Rc<Fields>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field. Writing a value identical to the current one leaves the
    /// record untouched.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self
            .fields
            .get(&key)
            .is_some_and(|current| current.is_identical(&value))
        {
            return;
        }
        Rc::make_mut(&mut self.fields).insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Mutable access to one field, copying the field table if it is shared.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if !self.fields.contains_key(key) {
            return None;
        }
        Rc::make_mut(&mut self.fields).get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.fields.contains_key(key) {
            return None;
        }
        Rc::make_mut(&mut self.fields).remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Follow a path of nested map fields.
    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.get(first)?, |value, key| value.get(key))
    }

    /// Set a nested field, copying only the maps along `path`.
    ///
    /// Returns `false` (and changes nothing) when the path is empty or an
    /// intermediate field is missing or not a map.
    pub fn set_in(&mut self, path: &[&str], value: impl Into<Value>) -> bool {
        let value = value.into();
        if self
            .get_in(path)
            .is_some_and(|current| current.is_identical(&value))
        {
            return true;
        }
        match path {
            [] => false,
            [key] => {
                self.insert(*key, value);
                true
            }
            [key, rest @ ..] => {
                if !matches!(self.get(key), Some(Value::Map(_))) {
                    return false;
                }
                match self.get_mut(key).and_then(Value::as_map_mut) {
                    Some(inner) => inner.set_in(rest, value),
                    None => false,
                }
            }
        }
    }

    /// Shallow merge: `fragment` fields win, every other field is shared.
    pub fn merged(&self, fragment: &State) -> State {
        if fragment.is_empty() {
            return self.clone();
        }
        let mut fields = (*self.fields).clone();
        for (key, value) in fragment.fields.iter() {
            fields.insert(key.clone(), value.clone());
        }
        Self {
            fields: Rc::new(fields),
        }
    }

    /// True when every field of `fragment` is identical to the same field here.
    pub fn is_unchanged_by(&self, fragment: &State) -> bool {
        fragment.iter().all(|(key, value)| {
            self.get(key)
                .is_some_and(|current| current.is_identical(value))
        })
    }

    /// Whether both records are the same snapshot.
    pub fn ptr_eq(&self, other: &State) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields)
    }

    /// Invoke the action stored in `name` with no argument.
    pub fn call(&self, name: &str) -> Result<(), StoreError> {
        self.call_with(name, Value::Null)
    }

    /// Invoke the action stored in `name`.
    pub fn call_with(&self, name: &str, arg: impl Into<Value>) -> Result<(), StoreError> {
        match self.get(name) {
            Some(Value::Action(action)) => {
                action.call(arg.into());
                Ok(())
            }
            Some(other) => Err(StoreError::NotAnAction {
                field: name.to_owned(),
                kind: other.kind(),
            }),
            None => Err(StoreError::UnknownField(name.to_owned())),
        }
    }

    /// Only the action fields.
    pub fn actions(&self) -> State {
        self.iter()
            .filter(|(_, value)| value.is_action())
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }

    /// Only the data fields.
    pub fn without_actions(&self) -> State {
        self.iter()
            .filter(|(_, value)| !value.is_action())
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }

    /// Bind a typed value into a record. The value must serialize to an object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<State, StoreError> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(State::from(map)),
            other => Err(StoreError::NotAnObject(json_kind(&other))),
        }
    }

    /// Read the record's data fields back as a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let json = serde_json::to_value(self)?;
        Ok(serde_json::from_value(json)?)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl PartialEq for State {
    fn eq(&self, other: &State) -> bool {
        self.ptr_eq(other) || *self.fields == *other.fields
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for State
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields: Fields = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            fields: Rc::new(fields),
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for State {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Action fields are skipped.
impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.values().filter(|value| !value.is_action()).count();
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in self.iter().filter(|(_, value)| !value.is_action()) {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Object(map) => Ok(State::from(map)),
            other => Err(de::Error::custom(format!(
                "expected a state object, found {}",
                json_kind(&other)
            ))),
        }
    }
}
