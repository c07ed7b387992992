//! Format constants and security limits for decoding.
//!
//! Every allocation the decoder makes is bounded by one of these values or by
//! the number of bytes actually remaining in the input.

/// Magic bytes of an uncompressed stream.
pub const MAGIC: &[u8; 2] = b"OG";

/// Magic bytes of a zstd-compressed stream envelope.
pub const MAGIC_COMPRESSED: &[u8; 2] = b"OZ";

/// Current format version written by the encoder.
pub const FORMAT_VERSION: u8 = 1;

/// Oldest format version the decoder accepts.
pub const MIN_FORMAT_VERSION: u8 = 1;

/// Length of the stream header (magic + version).
pub const HEADER_LEN: usize = 3;

/// Maximum stream size. Offsets are 4-byte unsigned integers.
pub const MAX_STREAM_SIZE: usize = u32::MAX as usize;

/// Maximum UTF-8 length of a text value or a name.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum length of a byte sequence.
pub const MAX_BYTES_LEN: usize = 64 * 1024 * 1024;

/// Maximum number of elements in an array or collection.
pub const MAX_ELEMENTS: usize = 16 * 1024 * 1024;

/// Maximum number of fields in a record schema.
pub const MAX_FIELDS: usize = 65_535;

/// Maximum nesting of array type descriptors (`int[][]...`).
pub const MAX_TYPE_DEPTH: usize = 32;

/// Default cap on the number of objects one decode may allocate.
pub const MAX_OBJECTS: usize = 16 * 1024 * 1024;
