//! Stream encoding.
//!
//! The encoder walks a value graph depth-first with an explicit stack, so the
//! depth of a graph is limited by memory rather than by the call stack. Every
//! object is written once; later occurrences become back-references to the
//! offset of its first tag byte.

use std::io::Write;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::codec::primitives::Writer;
use crate::codec::schema::{
    TAG_BACK_REF, TAG_RESET, TAG_TYPE_REF, write_enum_decl, write_record_decl, write_type_desc,
};
use crate::error::EncodeError;
use crate::limits::{
    FORMAT_VERSION, HEADER_LEN, MAGIC, MAGIC_COMPRESSED, MAX_BYTES_LEN, MAX_ELEMENTS,
    MAX_STRING_LEN,
};
use crate::model::{ArrayRef, CollectionRef, RecordRef, RecordType, TypeDesc, Value, ValueKind};

/// Options for encoding values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Wrap the stream in a zstd envelope at this compression level.
    ///
    /// `None` writes a plain stream. Compressed streams are recognized by
    /// [`crate::decode`] automatically.
    pub compression_level: Option<i32>,
}

impl EncodeOptions {
    /// Creates default (uncompressed) encoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that compress at the given zstd level.
    pub fn compressed(level: i32) -> Self {
        Self {
            compression_level: Some(level),
        }
    }
}

/// Counters collected while encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Value tokens written, back-references included.
    pub values: usize,
    /// Distinct objects written in full.
    pub objects: usize,
    /// Back-references written in place of repeated objects.
    pub back_references: usize,
    /// Record schemas and enum types declared.
    pub schemas_declared: usize,
    /// Bytes written so far, header included.
    pub bytes: usize,
}

/// An object whose slots are still being written.
enum Frame {
    Record(RecordRef, usize),
    Array(ArrayRef, usize),
    Collection(CollectionRef, usize),
}

static ANY: TypeDesc = TypeDesc::Any;

impl Frame {
    /// Returns the next slot value and its declared type, advancing the cursor.
    fn next(&mut self) -> Result<Option<(Value, TypeDesc, usize)>, EncodeError> {
        let (slot, index) = match self {
            Frame::Record(r, index) => (next_slot(r.try_slots(), *index)?, index),
            Frame::Array(a, index) => (next_slot(a.try_slots(), *index)?, index),
            Frame::Collection(c, index) => (next_slot(c.try_slots(), *index)?, index),
        };
        let Some(slot) = slot else {
            return Ok(None);
        };
        let current = *index;
        *index += 1;
        Ok(Some((slot, self.slot_type(current).clone(), current)))
    }

    fn slot_type(&self, index: usize) -> &TypeDesc {
        match self {
            Frame::Record(r, _) => r
                .record_type()
                .fields()
                .get(index)
                .map_or(&ANY, |field| &field.ty),
            Frame::Array(a, _) => a.element_type(),
            Frame::Collection(..) => &ANY,
        }
    }

    /// Describes a slot for error messages.
    fn describe(&self, index: usize) -> String {
        match self {
            Frame::Record(r, _) => {
                let record_type = r.record_type();
                match record_type.fields().get(index) {
                    Some(field) => format!("field {}.{}", record_type.name(), field.name),
                    None => format!("field #{index} of {}", record_type.name()),
                }
            }
            Frame::Array(a, _) => format!("element {index} of {}[]", a.element_type()),
            Frame::Collection(..) => format!("element {index} of collection"),
        }
    }
}

fn next_slot(
    slots: Option<std::cell::Ref<'_, Vec<Value>>>,
    index: usize,
) -> Result<Option<Value>, EncodeError> {
    let slots = slots.ok_or(EncodeError::ObjectBorrowed)?;
    Ok(slots.get(index).cloned())
}

/// Incremental stream encoder.
///
/// Writes the header on creation; each [`Encoder::write_value`] appends one
/// top-level value. Objects and types written earlier in the stream are
/// referenced rather than repeated until [`Encoder::reset`] is called.
///
/// After an error the stream contents are unspecified and the encoder should
/// be discarded.
pub struct Encoder {
    writer: Writer,
    /// Object address -> (offset, strong handle). The handle keeps the address
    /// from being reused by a new allocation while the encoder is alive.
    objects: FxHashMap<usize, (u32, Value)>,
    records: FxHashMap<String, (u32, Rc<RecordType>)>,
    enums: FxHashMap<String, u32>,
    stats: EncodeStats,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates an encoder and writes the stream header.
    pub fn new() -> Self {
        let mut writer = Writer::with_capacity(256);
        writer.write_bytes(MAGIC);
        writer.write_byte(FORMAT_VERSION);
        Self {
            writer,
            objects: FxHashMap::default(),
            records: FxHashMap::default(),
            enums: FxHashMap::default(),
            stats: EncodeStats::default(),
        }
    }

    /// Appends one top-level value.
    pub fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        let mut stack: Vec<Frame> = Vec::new();
        self.write_token(value, &mut stack)?;

        while let Some(frame) = stack.last_mut() {
            let Some((child, slot_type, index)) = frame.next()? else {
                stack.pop();
                continue;
            };
            if !slot_type.admits(&child) {
                return Err(EncodeError::UnsupportedValueKind {
                    slot: frame.describe(index),
                    expected: slot_type,
                    found: child.kind_name(),
                });
            }
            self.write_token(&child, &mut stack)?;
        }
        Ok(())
    }

    /// Writes a reset marker and forgets every object and type written so far.
    ///
    /// Values written after a reset never reference values written before it.
    pub fn reset(&mut self) {
        self.writer.write_byte(TAG_RESET);
        self.objects.clear();
        self.records.clear();
        self.enums.clear();
    }

    /// Returns the counters collected so far.
    pub fn stats(&self) -> EncodeStats {
        EncodeStats {
            bytes: self.writer.len(),
            ..self.stats
        }
    }

    /// Consumes the encoder and returns the stream bytes.
    pub fn finish(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    /// Current position as a stream offset.
    fn offset(&self) -> Result<u32, EncodeError> {
        let len = self.writer.len();
        u32::try_from(len).map_err(|_| EncodeError::StreamTooLarge { offset: len })
    }

    /// Writes one value token. Objects are registered and pushed onto `stack`
    /// so their slots are written next.
    fn write_token(&mut self, value: &Value, stack: &mut Vec<Frame>) -> Result<(), EncodeError> {
        self.stats.values += 1;
        let offset = self.offset()?;

        if let Some(addr) = value.object_addr() {
            if let Some(&(first, _)) = self.objects.get(&addr) {
                self.writer.write_byte(TAG_BACK_REF);
                self.writer.write_u32(first);
                self.stats.back_references += 1;
                return Ok(());
            }
            self.objects.insert(addr, (offset, value.clone()));
            self.stats.objects += 1;
        }

        match value {
            Value::Null => self.writer.write_byte(ValueKind::Null as u8),
            Value::Bool(v) => {
                self.writer.write_byte(ValueKind::Bool as u8);
                self.writer.write_byte(u8::from(*v));
            }
            Value::Byte(v) => {
                self.writer.write_byte(ValueKind::Byte as u8);
                self.writer.write_i8(*v);
            }
            Value::Char(v) => {
                self.writer.write_byte(ValueKind::Char as u8);
                self.writer.write_u16(*v);
            }
            Value::Short(v) => {
                self.writer.write_byte(ValueKind::Short as u8);
                self.writer.write_i16(*v);
            }
            Value::Int(v) => {
                self.writer.write_byte(ValueKind::Int as u8);
                self.writer.write_i32(*v);
            }
            Value::Long(v) => {
                self.writer.write_byte(ValueKind::Long as u8);
                self.writer.write_i64(*v);
            }
            Value::Float(v) => {
                self.writer.write_byte(ValueKind::Float as u8);
                self.writer.write_f32(*v);
            }
            Value::Double(v) => {
                self.writer.write_byte(ValueKind::Double as u8);
                self.writer.write_f64(*v);
            }
            Value::Text(s) => {
                check_len("text", s.len(), MAX_STRING_LEN)?;
                self.writer.write_byte(ValueKind::Text as u8);
                self.writer.write_string(s);
            }
            Value::Bytes(b) => {
                check_len("bytes", b.len(), MAX_BYTES_LEN)?;
                self.writer.write_byte(ValueKind::Bytes as u8);
                self.writer.write_bytes_prefixed(b);
            }
            Value::Enum(constant) => {
                check_len("enum constant", constant.name().len(), MAX_STRING_LEN)?;
                self.writer.write_byte(ValueKind::Enum as u8);
                self.write_enum_type(constant.type_name())?;
                self.writer.write_string(constant.name());
            }
            Value::Record(record) => {
                let record_type = record.record_type();
                let actual = record.try_slots().ok_or(EncodeError::ObjectBorrowed)?.len();
                if actual != record_type.fields().len() {
                    return Err(EncodeError::FieldCountMismatch {
                        type_name: record_type.name().to_string(),
                        expected: record_type.fields().len(),
                        actual,
                    });
                }
                self.writer.write_byte(ValueKind::Record as u8);
                self.write_record_type(record_type)?;
                stack.push(Frame::Record(record.clone(), 0));
            }
            Value::Array(array) => {
                let len = array.try_slots().ok_or(EncodeError::ObjectBorrowed)?.len();
                check_len("array", len, MAX_ELEMENTS)?;
                self.writer.write_byte(ValueKind::Array as u8);
                write_type_desc(&mut self.writer, array.element_type())?;
                self.writer.write_u32(len as u32);
                stack.push(Frame::Array(array.clone(), 0));
            }
            Value::Collection(collection) => {
                let len = collection.try_slots().ok_or(EncodeError::ObjectBorrowed)?.len();
                check_len("collection", len, MAX_ELEMENTS)?;
                self.writer.write_byte(ValueKind::Collection as u8);
                self.writer.write_u32(len as u32);
                stack.push(Frame::Collection(collection.clone(), 0));
            }
        }
        Ok(())
    }

    /// Declares a record schema on first use, references it afterwards.
    fn write_record_type(&mut self, record_type: &Rc<RecordType>) -> Result<(), EncodeError> {
        if let Some((offset, known)) = self.records.get(record_type.name()) {
            if !Rc::ptr_eq(known, record_type) && known != record_type {
                return Err(EncodeError::SchemaConflict {
                    type_name: record_type.name().to_string(),
                });
            }
            let offset = *offset;
            self.writer.write_byte(TAG_TYPE_REF);
            self.writer.write_u32(offset);
            return Ok(());
        }

        let offset = self.offset()?;
        write_record_decl(&mut self.writer, record_type)?;
        self.records
            .insert(record_type.name().to_string(), (offset, Rc::clone(record_type)));
        self.stats.schemas_declared += 1;
        Ok(())
    }

    /// Declares an enum type on first use, references it afterwards.
    fn write_enum_type(&mut self, type_name: &str) -> Result<(), EncodeError> {
        if let Some(&offset) = self.enums.get(type_name) {
            self.writer.write_byte(TAG_TYPE_REF);
            self.writer.write_u32(offset);
            return Ok(());
        }

        let offset = self.offset()?;
        write_enum_decl(&mut self.writer, type_name)?;
        self.enums.insert(type_name.to_string(), offset);
        self.stats.schemas_declared += 1;
        Ok(())
    }
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Encodes one value as a complete stream.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::new();
    encoder.write_value(value)?;
    Ok(encoder.finish())
}

/// Encodes several top-level values into one stream.
///
/// Later values may reference objects and types written by earlier ones.
pub fn encode_all(values: &[Value]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = Encoder::new();
    for value in values {
        encoder.write_value(value)?;
    }
    Ok(encoder.finish())
}

/// Encodes one value with options.
pub fn encode_with_options(value: &Value, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let stream = encode(value)?;
    match options.compression_level {
        Some(level) => compress(&stream, level),
        None => Ok(stream),
    }
}

/// Encodes one value and wraps the stream in a zstd envelope.
pub fn encode_compressed(value: &Value, level: i32) -> Result<Vec<u8>, EncodeError> {
    encode_with_options(value, EncodeOptions::compressed(level))
}

/// Encodes one value and writes the stream to `sink`.
///
/// Returns the number of bytes written. The sink is flushed; a sink failure is
/// reported once and not retried.
pub fn encode_to<W: Write>(value: &Value, mut sink: W) -> Result<usize, EncodeError> {
    let stream = encode(value)?;
    sink.write_all(&stream)
        .map_err(|e| EncodeError::WriteFailure(e.to_string()))?;
    sink.flush()
        .map_err(|e| EncodeError::WriteFailure(e.to_string()))?;
    Ok(stream.len())
}

/// Wraps a complete stream in the compressed envelope:
/// magic, version, u32 uncompressed length, zstd frame.
fn compress(stream: &[u8], level: i32) -> Result<Vec<u8>, EncodeError> {
    let uncompressed_len = u32::try_from(stream.len())
        .map_err(|_| EncodeError::StreamTooLarge { offset: stream.len() })?;

    let compressed = zstd::encode_all(stream, level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(HEADER_LEN + 4 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_byte(FORMAT_VERSION);
    writer.write_u32(uncompressed_len);
    writer.write_bytes(&compressed);
    Ok(writer.into_bytes())
}

/// Encodes one value, optionally printing timing and counters to stderr.
pub fn encode_profiled(value: &Value, profile: bool) -> Result<Vec<u8>, EncodeError> {
    if !profile {
        return encode(value);
    }

    use std::time::Instant;

    let t0 = Instant::now();
    let mut encoder = Encoder::new();
    let t1 = Instant::now();
    encoder.write_value(value)?;
    let t2 = Instant::now();
    let stats = encoder.stats();
    let bytes = encoder.finish();
    let t3 = Instant::now();

    let total = t3.duration_since(t0);
    let pct = |d: std::time::Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64().max(f64::EPSILON);
    eprintln!("=== Encode Profile ===");
    eprintln!("  setup: {:?} ({:.1}%)", t1.duration_since(t0), pct(t1.duration_since(t0)));
    eprintln!("  traverse: {:?} ({:.1}%)", t2.duration_since(t1), pct(t2.duration_since(t1)));
    eprintln!("  finish: {:?} ({:.1}%)", t3.duration_since(t2), pct(t3.duration_since(t2)));
    eprintln!(
        "  values: {}, objects: {}, back-references: {}, schemas: {}, bytes: {}",
        stats.values, stats.objects, stats.back_references, stats.schemas_declared, stats.bytes
    );
    eprintln!("  TOTAL: {:?}", total);

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn bar_type() -> Rc<RecordType> {
        Rc::new(RecordType::builder("fixtures.Bar").field("value", TypeDesc::Int).build())
    }

    #[test]
    fn test_header_and_int() {
        let bytes = encode(&Value::Int(456789)).unwrap();
        assert_eq!(bytes, vec![b'O', b'G', 0x01, 0x06, 0x00, 0x06, 0xF8, 0x55]);
        assert_eq!(Encoder::new().finish().len(), HEADER_LEN);
    }

    #[test]
    fn test_text_layout() {
        let bytes = encode(&Value::from("hi")).unwrap();
        assert_eq!(&bytes[3..], &[0x0A, 0x00, 0x00, 0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_shared_object_written_once() {
        let shared = Value::collection(vec![Value::Int(1)]);
        let root = Value::collection(vec![shared.clone(), shared]);

        let mut encoder = Encoder::new();
        encoder.write_value(&root).unwrap();
        let stats = encoder.stats();
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.back_references, 1);

        let bytes = encoder.finish();
        // root collection at 3, inner collection at 8, back-reference to 8 last
        assert_eq!(&bytes[bytes.len() - 5..], &[TAG_BACK_REF, 0, 0, 0, 8]);
    }

    #[test]
    fn test_self_cycle_terminates() {
        let node = CollectionRef::new(vec![]);
        node.push(Value::Collection(node.clone()));
        let bytes = encode(&Value::Collection(node)).unwrap();
        assert_eq!(&bytes[3..], &[0x0F, 0, 0, 0, 1, TAG_BACK_REF, 0, 0, 0, 3]);
    }

    #[test]
    fn test_schema_declared_once() {
        let bar = bar_type();
        let items = (0..3)
            .map(|i| Value::record(bar.clone(), vec![Value::Int(i)]))
            .collect();
        let root = Value::array(TypeDesc::record("fixtures.Bar"), items);

        let mut encoder = Encoder::new();
        encoder.write_value(&root).unwrap();
        assert_eq!(encoder.stats().schemas_declared, 1);
        assert_eq!(encoder.stats().objects, 4);
    }

    #[test]
    fn test_slot_type_enforced() {
        let record = Value::record(bar_type(), vec![Value::Long(1)]);
        let err = encode(&record).unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnsupportedValueKind {
                slot: "field fixtures.Bar.value".to_string(),
                expected: TypeDesc::Int,
                found: "long",
            }
        );
        assert_eq!(err.kind(), ErrorKind::UnsupportedValueKind);

        let array = Value::array(TypeDesc::Int, vec![Value::Int(1), Value::Null]);
        assert!(matches!(
            encode(&array),
            Err(EncodeError::UnsupportedValueKind { .. })
        ));
    }

    #[test]
    fn test_field_count_enforced() {
        let record = Value::record(bar_type(), vec![]);
        assert_eq!(
            encode(&record),
            Err(EncodeError::FieldCountMismatch {
                type_name: "fixtures.Bar".to_string(),
                expected: 1,
                actual: 0,
            })
        );
    }

    #[test]
    fn test_schema_conflict() {
        let other = Rc::new(RecordType::builder("fixtures.Bar").field("value", TypeDesc::Long).build());
        let root = Value::collection(vec![
            Value::record(bar_type(), vec![Value::Int(1)]),
            Value::record(other, vec![Value::Long(1)]),
        ]);
        assert_eq!(
            encode(&root),
            Err(EncodeError::SchemaConflict {
                type_name: "fixtures.Bar".to_string()
            })
        );
    }

    #[test]
    fn test_equal_schemas_from_distinct_rcs_share_declaration() {
        let root = Value::collection(vec![
            Value::record(bar_type(), vec![Value::Int(1)]),
            Value::record(bar_type(), vec![Value::Int(2)]),
        ]);
        let mut encoder = Encoder::new();
        encoder.write_value(&root).unwrap();
        assert_eq!(encoder.stats().schemas_declared, 1);
    }

    #[test]
    fn test_borrowed_object_rejected() {
        let collection = CollectionRef::new(vec![Value::Int(1)]);
        let _guard = collection.slots_mut();
        assert_eq!(
            encode(&Value::Collection(collection.clone())),
            Err(EncodeError::ObjectBorrowed)
        );
    }

    #[test]
    fn test_reset_forgets_objects() {
        let shared = Value::collection(vec![]);
        let mut encoder = Encoder::new();
        encoder.write_value(&shared).unwrap();
        encoder.reset();
        encoder.write_value(&shared).unwrap();
        assert_eq!(encoder.stats().objects, 2);
        assert_eq!(encoder.stats().back_references, 0);
    }

    #[test]
    fn test_encode_to_reports_write_failure() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let err = encode_to(&Value::Int(1), Broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteFailure);

        let mut sink = Vec::new();
        let written = encode_to(&Value::Int(1), &mut sink).unwrap();
        assert_eq!(written, sink.len());
    }

    #[test]
    fn test_compressed_envelope() {
        let text = Value::from("0123456789abcdef".repeat(64));
        let plain = encode(&text).unwrap();
        let compressed = encode_compressed(&text, 3).unwrap();
        assert_eq!(&compressed[0..2], MAGIC_COMPRESSED);
        assert_eq!(compressed[2], FORMAT_VERSION);
        assert_eq!(&compressed[3..7], &(plain.len() as u32).to_be_bytes());
        assert!(compressed.len() < plain.len());
    }

    #[test]
    fn test_encode_profiled_matches_encode() {
        let bar = Value::record(bar_type(), vec![Value::Int(0x1111)]);
        let root = Value::collection(vec![bar.clone(), bar]);
        let plain = encode(&root).unwrap();
        assert_eq!(encode_profiled(&root, false).unwrap(), plain);
        assert_eq!(encode_profiled(&root, true).unwrap(), plain);
    }
}
