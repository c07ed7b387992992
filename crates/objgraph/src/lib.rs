//! objgraph: a self-describing binary format for typed object graphs.
//!
//! This crate provides encoding, decoding, typed extraction and validation
//! for graphs of records, arrays and collections, including graphs with
//! shared references and cycles.
//!
//! # Overview
//!
//! A stream carries everything needed to rebuild the graph:
//! - **Typed primitives**: bool, byte, char, short, int, long, float, double
//!   keep their exact widths
//! - **Schemas inline**: each record type is declared on first use and
//!   referenced by offset afterwards
//! - **Identity preserved**: an object reached twice is written once; the
//!   decoded graph shares the same instance in both places
//!
//! # Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use objgraph::{RecordRef, RecordType, TypeDesc, Value, decode, encode};
//!
//! let node_type = Rc::new(
//!     RecordType::builder("example.Node")
//!         .field("id", TypeDesc::Int)
//!         .field("next", TypeDesc::record("example.Node"))
//!         .build(),
//! );
//!
//! // A node that points to itself
//! let node = RecordRef::new(node_type, vec![Value::Int(1), Value::Null]);
//! node.set_field("next", Value::Record(node.clone()));
//! let root = Value::Record(node);
//!
//! let bytes = encode(&root).unwrap();
//! let decoded = decode(&bytes).unwrap();
//! assert_eq!(decoded, root);
//!
//! let decoded_node = decoded.as_record().unwrap();
//! assert!(decoded_node.field("next").unwrap().same_object(&decoded));
//! assert_eq!(decoded_node.get_as::<i64>("id"), Ok(1));
//! # objgraph::detach(&root);
//! # objgraph::detach(&decoded);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Values, shared objects, schemas, graph comparison
//! - [`codec`]: Binary encoding/decoding with compression support
//! - [`cast`]: Typed extraction with lossless widening
//! - [`validate`]: Validation against expected schemas
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decoding limits
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - All allocations are bounded by limits or by the bytes remaining
//! - Decoding is iterative, so deep or cyclic graphs cannot overflow the stack
//! - Invalid data is rejected with descriptive errors carrying byte offsets
//!
//! # Wire Format
//!
//! Streams use a big-endian binary format with optional zstd compression:
//! - Uncompressed: `OG` magic + version + values
//! - Compressed: `OZ` magic + version + uncompressed size + zstd data
//!
//! The decoder automatically detects and handles both formats.

pub mod cast;
pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use cast::FromValue;
pub use codec::{
    DecodeOptions, Decoder, EncodeOptions, EncodeStats, Encoder, decode, decode_all,
    decode_all_with_options, decode_from, decode_with_options, decompress, encode, encode_all,
    encode_compressed, encode_profiled, encode_to, encode_with_options,
};
pub use error::{CastError, DecodeError, EncodeError, ErrorKind, ValidationError};
pub use model::{
    ArrayRef, CollectionRef, EnumConstant, EnumType, FieldDesc, RecordRef, RecordType,
    RecordTypeBuilder, Shared, TypeDesc, Value, ValueKind, detach, isomorphic, visit,
};
pub use validate::{SchemaContext, validate_value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire format version this crate writes.
pub const FORMAT_VERSION: u8 = limits::FORMAT_VERSION;
