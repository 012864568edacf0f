//! Dynamically shaped state records.
//!
//! The store does not know the shape of the state it holds. A [`State`] is a
//! persistent map from field name to [`Value`]; typed shapes are bound at the
//! boundary with [`State::from_serialize`] and [`State::decode`].

mod draft;
mod record;
mod value;

pub use draft::{produce, Draft};
pub use record::State;
pub use value::{Action, Value};
