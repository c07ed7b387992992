//! Error types for encoding, decoding, typed extraction and validation.

use thiserror::Error;

use crate::model::TypeDesc;

/// Error classes shared by encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// E001: Unrecognized magic or version
    UnsupportedVersion,
    /// E002: Fewer bytes remain than a token needs
    TruncatedStream,
    /// E003: Tag byte does not match any known kind
    MalformedTag,
    /// E004: Schema or enum type reference cannot be resolved
    UnknownTypeReference,
    /// E005: Structurally invalid content (UTF-8, limits, conformance, ...)
    MalformedEncoding,
    /// E006: Value does not fit the slot it is written to
    UnsupportedValueKind,
    /// E007: Output sink rejected bytes
    WriteFailure,
    /// E008: Input source failed
    ReadFailure,
}

impl ErrorKind {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedVersion => "E001",
            ErrorKind::TruncatedStream => "E002",
            ErrorKind::MalformedTag => "E003",
            ErrorKind::UnknownTypeReference => "E004",
            ErrorKind::MalformedEncoding => "E005",
            ErrorKind::UnsupportedValueKind => "E006",
            ErrorKind::WriteFailure => "E007",
            ErrorKind::ReadFailure => "E008",
        }
    }
}

/// Error during decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === E001: Unsupported version ===
    #[error("[E001] invalid magic bytes: expected OG or OZ, found {found:?}")]
    InvalidMagic { found: [u8; 2] },

    #[error("[E001] unsupported version: {version}")]
    UnsupportedVersion { version: u8 },

    // === E002: Truncated stream ===
    #[error("[E002] unexpected end of input at offset {at} while reading {context}")]
    UnexpectedEof { context: &'static str, at: usize },

    // === E003: Malformed tag ===
    #[error("[E003] unknown tag 0x{tag:02x} at offset {at} (expected {context})")]
    MalformedTag {
        tag: u8,
        context: &'static str,
        at: usize,
    },

    // === E004: Unknown type reference ===
    #[error("[E004] type reference at offset {at} points to {offset}, which declares no {expected}")]
    UnknownTypeReference {
        offset: u32,
        expected: &'static str,
        at: usize,
    },

    // === E005: Malformed encoding ===
    #[error("[E005] back-reference at offset {at} points to {offset}, which holds no object")]
    DanglingReference { offset: u32, at: usize },

    #[error("[E005] invalid UTF-8 in {field} at offset {at}")]
    InvalidUtf8 { field: &'static str, at: usize },

    #[error("[E005] invalid bool value 0x{value:02x} at offset {at} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8, at: usize },

    #[error("[E005] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E005] value of kind {found} at offset {at} is not admitted by declared type {expected}")]
    TypeMismatch {
        expected: TypeDesc,
        found: &'static str,
        at: usize,
    },

    #[error("[E005] schema fingerprint mismatch for {type_name}: declared {declared:016x}, computed {computed:016x}")]
    FingerprintMismatch {
        type_name: String,
        declared: u64,
        computed: u64,
    },

    #[error("[E005] object count exceeds maximum {max}")]
    TooManyObjects { max: usize },

    #[error("[E005] {remaining} trailing bytes after root value at offset {at}")]
    TrailingBytes { remaining: usize, at: usize },

    #[error("[E005] zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("[E005] decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    // === E008: Read failure ===
    #[error("[E008] reading input failed: {0}")]
    ReadFailure(String),
}

impl DecodeError {
    /// Returns the error class for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::InvalidMagic { .. } | DecodeError::UnsupportedVersion { .. } => {
                ErrorKind::UnsupportedVersion
            }
            DecodeError::UnexpectedEof { .. } => ErrorKind::TruncatedStream,
            DecodeError::MalformedTag { .. } => ErrorKind::MalformedTag,
            DecodeError::UnknownTypeReference { .. } => ErrorKind::UnknownTypeReference,
            DecodeError::ReadFailure(_) => ErrorKind::ReadFailure,
            _ => ErrorKind::MalformedEncoding,
        }
    }

    /// Returns the byte offset at which the failure was detected, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::UnexpectedEof { at, .. }
            | DecodeError::MalformedTag { at, .. }
            | DecodeError::UnknownTypeReference { at, .. }
            | DecodeError::DanglingReference { at, .. }
            | DecodeError::InvalidUtf8 { at, .. }
            | DecodeError::InvalidBool { at, .. }
            | DecodeError::TypeMismatch { at, .. }
            | DecodeError::TrailingBytes { at, .. } => Some(*at),
            _ => None,
        }
    }
}

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("[E006] value of kind {found} is not admitted by {slot} of type {expected}")]
    UnsupportedValueKind {
        slot: String,
        expected: TypeDesc,
        found: &'static str,
    },

    #[error("[E006] record of type {type_name} has {actual} values but its schema declares {expected} fields")]
    FieldCountMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("[E006] record type {type_name} was already written with a different schema")]
    SchemaConflict { type_name: String },

    #[error("[E006] object is mutably borrowed while being encoded")]
    ObjectBorrowed,

    #[error("[E005] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E005] stream offset {offset} exceeds the 4-byte offset range")]
    StreamTooLarge { offset: usize },

    #[error("[E005] zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("[E007] writing output failed: {0}")]
    WriteFailure(String),
}

impl EncodeError {
    /// Returns the error class for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::UnsupportedValueKind { .. }
            | EncodeError::FieldCountMismatch { .. }
            | EncodeError::SchemaConflict { .. }
            | EncodeError::ObjectBorrowed => ErrorKind::UnsupportedValueKind,
            EncodeError::WriteFailure(_) => ErrorKind::WriteFailure,
            _ => ErrorKind::MalformedEncoding,
        }
    }
}

/// Error while extracting a typed Rust value from a [`crate::Value`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastError {
    #[error("cannot cast {found} to {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} is out of range for {expected}")]
    OutOfRange { expected: &'static str, value: i64 },

    #[error("record type {type_name} has no field {field:?}")]
    MissingField { type_name: String, field: String },

    #[error("object is mutably borrowed")]
    Borrowed,
}

/// Error during semantic validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("record type {type_name} does not match the registered schema")]
    SchemaMismatch { type_name: String },

    #[error("record of type {type_name} has {actual} values but its schema declares {expected} fields")]
    FieldCountMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("field {field} of {type_name} does not admit a value of kind {found}")]
    FieldTypeMismatch {
        type_name: String,
        field: String,
        found: &'static str,
    },

    #[error("{constant:?} is not a constant of enum type {type_name}")]
    UnknownEnumConstant { type_name: String, constant: String },

    #[error("object is mutably borrowed")]
    Borrowed,
}
