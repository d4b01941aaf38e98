//! Ontology (T-Box) loading and immutable schema snapshots

mod loader;
mod types;

pub use loader::{load, OntologyParseError, SchemaResult};
pub use types::{LiteralType, PredicateDef, RangeConstraint, SchemaSnapshot, SchemaVersion};
