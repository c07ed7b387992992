//! Stream decoding.
//!
//! Decoding is a single linear scan. Objects are created as soon as their tag
//! is read and registered under their offset before any slot is read, so a
//! back-reference from inside an object to itself or to an enclosing object
//! resolves to the same instance. Slots are filled from an explicit stack.

use std::io::{self, Read};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::codec::primitives::Reader;
use crate::codec::schema::{
    TAG_BACK_REF, TAG_ENUM_DECL, TAG_RESET, TAG_TYPE_DECL, TAG_TYPE_REF, read_enum_decl,
    read_record_decl, read_type_desc,
};
use crate::error::DecodeError;
use crate::limits::{
    FORMAT_VERSION, HEADER_LEN, MAGIC, MAGIC_COMPRESSED, MAX_BYTES_LEN, MAX_ELEMENTS, MAX_OBJECTS,
    MAX_STREAM_SIZE, MAX_STRING_LEN, MIN_FORMAT_VERSION,
};
use crate::model::graph::clear;
use crate::model::{
    ArrayRef, CollectionRef, EnumConstant, RecordRef, RecordType, TypeDesc, Value, ValueKind,
};

/// Options for decoding streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Largest accepted stream, after decompression.
    pub max_input_size: usize,
    /// Largest number of objects one decoder may allocate.
    pub max_objects: usize,
    /// Number of top-level values after which `decode_all_with_options`
    /// stops reading.
    pub max_values: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_input_size: MAX_STREAM_SIZE,
            max_objects: MAX_OBJECTS,
            max_values: usize::MAX,
        }
    }
}

impl DecodeOptions {
    /// Creates default decoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted stream size.
    pub fn max_input_size(mut self, max: usize) -> Self {
        self.max_input_size = max;
        self
    }

    /// Sets the largest number of objects.
    pub fn max_objects(mut self, max: usize) -> Self {
        self.max_objects = max;
        self
    }

    /// Sets how many top-level values `decode_all_with_options` reads.
    pub fn max_values(mut self, max: usize) -> Self {
        self.max_values = max;
        self
    }
}

/// A declared type, keyed by the offset of its declaration.
#[derive(Debug, Clone)]
enum TypeEntry {
    Record(Rc<RecordType>),
    Enum(String),
}

/// An object whose slots are still being read.
struct Fill {
    target: Value,
    remaining: usize,
    index: usize,
}

static ANY: TypeDesc = TypeDesc::Any;

/// Declared type of slot `index` of an object being filled.
fn slot_type(target: &Value, index: usize) -> &TypeDesc {
    match target {
        Value::Record(r) => r
            .record_type()
            .fields()
            .get(index)
            .map_or(&ANY, |field| &field.ty),
        Value::Array(a) => a.element_type(),
        _ => &ANY,
    }
}

/// Incremental stream decoder over an uncompressed stream.
///
/// Use [`decompress`] first for compressed input.
pub struct Decoder<'a> {
    reader: Reader<'a>,
    options: DecodeOptions,
    objects: FxHashMap<u32, Value>,
    types: FxHashMap<u32, TypeEntry>,
    object_count: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder with default options and validates the header.
    pub fn new(input: &'a [u8]) -> Result<Self, DecodeError> {
        Self::with_options(input, DecodeOptions::default())
    }

    /// Creates a decoder with options and validates the header.
    pub fn with_options(input: &'a [u8], options: DecodeOptions) -> Result<Self, DecodeError> {
        // Offsets are u32, so positions in an accepted stream always fit one.
        let max = options.max_input_size.min(MAX_STREAM_SIZE);
        if input.len() > max {
            return Err(DecodeError::LengthExceedsLimit {
                field: "stream",
                len: input.len(),
                max,
            });
        }

        let mut reader = Reader::new(input);
        let magic = reader.read_bytes(MAGIC.len(), "magic")?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic {
                found: [magic[0], magic[1]],
            });
        }
        check_version(reader.read_byte("version")?)?;

        Ok(Self {
            reader,
            options,
            objects: FxHashMap::default(),
            types: FxHashMap::default(),
            object_count: 0,
        })
    }

    /// Returns true once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// Returns the current offset in the stream.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Reads the next top-level value, or None at the end of the stream.
    ///
    /// Reset markers before the value are consumed and clear the decoder's
    /// tables. On error, objects created by this call are emptied so that
    /// partially built cycles can be freed.
    pub fn read_value(&mut self) -> Result<Option<Value>, DecodeError> {
        while self.reader.peek_byte() == Some(TAG_RESET) {
            self.reader.read_byte("reset")?;
            self.objects.clear();
            self.types.clear();
        }
        if self.reader.is_empty() {
            return Ok(None);
        }

        let start = self.reader.position() as u32;
        match self.read_root() {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                for (_, object) in self.objects.iter().filter(|(offset, _)| **offset >= start) {
                    clear(object);
                }
                Err(err)
            }
        }
    }

    fn read_root(&mut self) -> Result<Value, DecodeError> {
        let mut stack: Vec<Fill> = Vec::new();
        let root = self.read_token(&mut stack)?;

        while let Some(fill) = stack.last_mut() {
            if fill.remaining == 0 {
                stack.pop();
                continue;
            }
            fill.remaining -= 1;
            let index = fill.index;
            fill.index += 1;
            let target = fill.target.clone();

            let at = self.reader.position();
            let child = self.read_token(&mut stack)?;

            // Headers only: the child may be `target` itself.
            let declared = slot_type(&target, index);
            if !declared.admits(&child) {
                return Err(DecodeError::TypeMismatch {
                    expected: declared.clone(),
                    found: child.kind_name(),
                    at,
                });
            }
            push_slot(&target, child);
        }

        Ok(root)
    }

    /// Reads one value token. New objects are registered and pushed onto
    /// `stack` with their slot count.
    fn read_token(&mut self, stack: &mut Vec<Fill>) -> Result<Value, DecodeError> {
        let at = self.reader.position();
        let tag = self.reader.read_byte("value tag")?;

        if tag == TAG_BACK_REF {
            let offset = self.reader.read_u32("back-reference")?;
            return self
                .objects
                .get(&offset)
                .cloned()
                .ok_or(DecodeError::DanglingReference { offset, at });
        }

        let Some(kind) = ValueKind::from_u8(tag) else {
            return Err(DecodeError::MalformedTag {
                tag,
                context: "value tag",
                at,
            });
        };

        let value = match kind {
            ValueKind::Null => Value::Null,
            ValueKind::Bool => {
                let pos = self.reader.position();
                match self.reader.read_byte("bool")? {
                    0x00 => Value::Bool(false),
                    0x01 => Value::Bool(true),
                    value => return Err(DecodeError::InvalidBool { value, at: pos }),
                }
            }
            ValueKind::Byte => Value::Byte(self.reader.read_i8("byte")?),
            ValueKind::Char => Value::Char(self.reader.read_u16("char")?),
            ValueKind::Short => Value::Short(self.reader.read_i16("short")?),
            ValueKind::Int => Value::Int(self.reader.read_i32("int")?),
            ValueKind::Long => Value::Long(self.reader.read_i64("long")?),
            ValueKind::Float => Value::Float(self.reader.read_f32("float")?),
            ValueKind::Double => Value::Double(self.reader.read_f64("double")?),
            ValueKind::Text => Value::Text(self.reader.read_string(MAX_STRING_LEN, "text")?),
            ValueKind::Bytes => {
                Value::Bytes(self.reader.read_bytes_prefixed(MAX_BYTES_LEN, "bytes")?)
            }
            ValueKind::Enum => {
                let type_name = self.read_enum_type()?;
                let name = self.reader.read_string(MAX_STRING_LEN, "enum constant")?;
                Value::Enum(EnumConstant::new(type_name, name))
            }
            ValueKind::Record => {
                let record_type = self.read_record_type()?;
                let fields = record_type.fields().len();
                // Every field needs at least a tag byte.
                if fields > self.reader.remaining_len() {
                    return Err(DecodeError::UnexpectedEof {
                        context: "record fields",
                        at: self.reader.position(),
                    });
                }
                let record = Value::Record(RecordRef::with_slots(
                    record_type,
                    Vec::with_capacity(fields),
                ));
                self.register(at, &record)?;
                stack.push(Fill {
                    target: record.clone(),
                    remaining: fields,
                    index: 0,
                });
                record
            }
            ValueKind::Array => {
                let element_type = read_type_desc(&mut self.reader)?;
                let len = self.reader.read_len(MAX_ELEMENTS, 1, "array length")?;
                let array = Value::Array(ArrayRef::new(element_type, Vec::with_capacity(len)));
                self.register(at, &array)?;
                stack.push(Fill {
                    target: array.clone(),
                    remaining: len,
                    index: 0,
                });
                array
            }
            ValueKind::Collection => {
                let len = self.reader.read_len(MAX_ELEMENTS, 1, "collection length")?;
                let collection = Value::Collection(CollectionRef::new(Vec::with_capacity(len)));
                self.register(at, &collection)?;
                stack.push(Fill {
                    target: collection.clone(),
                    remaining: len,
                    index: 0,
                });
                collection
            }
        };
        Ok(value)
    }

    fn register(&mut self, at: usize, object: &Value) -> Result<(), DecodeError> {
        if self.object_count >= self.options.max_objects {
            return Err(DecodeError::TooManyObjects {
                max: self.options.max_objects,
            });
        }
        self.object_count += 1;
        self.objects.insert(at as u32, object.clone());
        Ok(())
    }

    fn read_record_type(&mut self) -> Result<Rc<RecordType>, DecodeError> {
        let at = self.reader.position();
        match self.reader.read_byte("record type")? {
            TAG_TYPE_DECL => {
                let record_type = Rc::new(read_record_decl(&mut self.reader)?);
                self.types
                    .insert(at as u32, TypeEntry::Record(Rc::clone(&record_type)));
                Ok(record_type)
            }
            TAG_TYPE_REF => {
                let offset = self.reader.read_u32("type reference")?;
                match self.types.get(&offset) {
                    Some(TypeEntry::Record(record_type)) => Ok(Rc::clone(record_type)),
                    _ => Err(DecodeError::UnknownTypeReference {
                        offset,
                        expected: "record schema",
                        at,
                    }),
                }
            }
            tag => Err(DecodeError::MalformedTag {
                tag,
                context: "record type",
                at,
            }),
        }
    }

    fn read_enum_type(&mut self) -> Result<String, DecodeError> {
        let at = self.reader.position();
        match self.reader.read_byte("enum type")? {
            TAG_ENUM_DECL => {
                let name = read_enum_decl(&mut self.reader)?;
                self.types.insert(at as u32, TypeEntry::Enum(name.clone()));
                Ok(name)
            }
            TAG_TYPE_REF => {
                let offset = self.reader.read_u32("type reference")?;
                match self.types.get(&offset) {
                    Some(TypeEntry::Enum(name)) => Ok(name.clone()),
                    _ => Err(DecodeError::UnknownTypeReference {
                        offset,
                        expected: "enum type",
                        at,
                    }),
                }
            }
            tag => Err(DecodeError::MalformedTag {
                tag,
                context: "enum type",
                at,
            }),
        }
    }
}

fn push_slot(target: &Value, child: Value) {
    match target {
        Value::Record(r) => r.push(child),
        Value::Array(a) => a.push(child),
        Value::Collection(c) => c.push(child),
        _ => {}
    }
}

fn check_version(version: u8) -> Result<(), DecodeError> {
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    Ok(())
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Decodes a stream holding exactly one value.
///
/// Handles both plain (`OG`) and compressed (`OZ`) streams.
pub fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    decode_with_options(input, DecodeOptions::default())
}

/// Decodes a stream holding exactly one value, with options.
pub fn decode_with_options(input: &[u8], options: DecodeOptions) -> Result<Value, DecodeError> {
    if is_compressed(input) {
        let stream = decompress_with_limit(input, options.max_input_size)?;
        return decode_single(&stream, options);
    }
    decode_single(input, options)
}

fn decode_single(stream: &[u8], options: DecodeOptions) -> Result<Value, DecodeError> {
    let mut decoder = Decoder::with_options(stream, options)?;
    let at = decoder.position();
    let root = decoder.read_value()?.ok_or(DecodeError::UnexpectedEof {
        context: "root value",
        at,
    })?;
    if !decoder.is_empty() {
        let at = decoder.position();
        return Err(DecodeError::TrailingBytes {
            remaining: stream.len() - at,
            at,
        });
    }
    Ok(root)
}

/// Decodes every top-level value in a stream.
pub fn decode_all(input: &[u8]) -> Result<Vec<Value>, DecodeError> {
    decode_all_with_options(input, DecodeOptions::default())
}

/// Decodes top-level values, at most `options.max_values` of them.
///
/// Bytes after the last value read are left unchecked.
pub fn decode_all_with_options(
    input: &[u8],
    options: DecodeOptions,
) -> Result<Vec<Value>, DecodeError> {
    let decompressed;
    let stream = if is_compressed(input) {
        decompressed = decompress_with_limit(input, options.max_input_size)?;
        decompressed.as_slice()
    } else {
        input
    };

    let mut decoder = Decoder::with_options(stream, options)?;
    let mut values = Vec::new();
    while values.len() < options.max_values {
        match decoder.read_value()? {
            Some(value) => values.push(value),
            None => break,
        }
    }
    Ok(values)
}

/// Reads a whole stream from `source` and decodes one value.
pub fn decode_from<R: Read>(source: R) -> Result<Value, DecodeError> {
    let mut input = Vec::new();
    source
        .take(MAX_STREAM_SIZE as u64 + 1)
        .read_to_end(&mut input)
        .map_err(|e| DecodeError::ReadFailure(e.to_string()))?;
    decode(&input)
}

fn is_compressed(input: &[u8]) -> bool {
    input.get(..MAGIC_COMPRESSED.len()) == Some(MAGIC_COMPRESSED.as_slice())
}

/// Unwraps a compressed envelope and returns the plain stream.
///
/// ```ignore
/// let stream = decompress(&compressed)?;
/// let mut decoder = Decoder::new(&stream)?;
/// ```
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decompress_with_limit(input, MAX_STREAM_SIZE)
}

fn decompress_with_limit(input: &[u8], max_size: usize) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(input);
    let magic = reader.read_bytes(MAGIC_COMPRESSED.len(), "magic")?;
    if magic != MAGIC_COMPRESSED {
        return Err(DecodeError::InvalidMagic {
            found: [magic[0], magic[1]],
        });
    }
    check_version(reader.read_byte("version")?)?;

    let declared_size = reader.read_u32("uncompressed size")? as usize;
    let max = max_size.min(MAX_STREAM_SIZE);
    if declared_size > max {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed size",
            len: declared_size,
            max,
        });
    }

    let compressed_data = reader.remaining();
    let decoder = zstd::Decoder::new(compressed_data)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // Never trust the declared size for more than the input can justify.
    let mut decompressed =
        Vec::with_capacity(declared_size.min(compressed_data.len().saturating_mul(8)));
    decoder
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| match e.kind() {
            // The frame ended early: the envelope was cut short.
            io::ErrorKind::UnexpectedEof => DecodeError::UnexpectedEof {
                context: "compressed data",
                at: input.len(),
            },
            _ => DecodeError::DecompressionFailed(e.to_string()),
        })?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed)
}
