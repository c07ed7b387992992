//! Data model types for object graphs.
//!
//! This module contains the types the codec reads and writes:
//! - Values (the tagged union of every serializable datum)
//! - Shared objects (records, arrays, collections with identity)
//! - Schemas (record types, enum types, type descriptors)
//! - Graph comparison and traversal

pub mod graph;
pub mod schema;
pub mod value;

pub use graph::{detach, isomorphic, visit};
pub use schema::{EnumType, FieldDesc, RecordType, RecordTypeBuilder, TypeDesc};
pub use value::{
    ArrayRef, CollectionRef, EnumConstant, RecordRef, Shared, Value, ValueKind,
};
