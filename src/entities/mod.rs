//! Typed entities
//!
//! One struct per schema model. Scalars map to their camelCase field names;
//! relation fields stay `None` unless the query included them.

mod auth;
mod catalog;
mod project;
mod roadmap;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use auth::{Account, Session, User, Verification};
pub use catalog::Model;
pub use project::{ChatHistory, Message, Project};
pub use roadmap::{CodeSnippet, Node, RoadMap};

pub use roadmap_macros::Entity;

/// A struct bound to a schema model.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the model in the schema registry
    const MODEL: &'static str;
    /// Scalar fields, in declaration order
    const FIELDS: &'static [&'static str];
}
