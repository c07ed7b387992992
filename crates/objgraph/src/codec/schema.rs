//! Structural tags, type descriptors and record/enum type declarations.
//!
//! Value tags are the [`ValueKind`] discriminants (0x01..=0x0F). The tags
//! below cover everything else that can appear where a token is expected.

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_FIELDS, MAX_STRING_LEN, MAX_TYPE_DEPTH};
use crate::model::{FieldDesc, RecordType, TypeDesc, ValueKind};

/// Reference to an object written earlier: u32 offset of its tag byte.
pub const TAG_BACK_REF: u8 = 0x10;

/// Top-level only: both sides forget every object and type seen so far.
pub const TAG_RESET: u8 = 0x11;

/// Type descriptor code for slots that admit any value.
pub const TAG_ANY: u8 = 0x12;

/// Record schema declaration.
pub const TAG_TYPE_DECL: u8 = 0x20;

/// Enumeration type declaration.
pub const TAG_ENUM_DECL: u8 = 0x21;

/// Reference to a type declared earlier: u32 offset of its tag byte.
pub const TAG_TYPE_REF: u8 = 0x22;

// =============================================================================
// ENCODING
// =============================================================================

/// Writes a type descriptor.
///
/// Array descriptors are written as a run of array codes followed by the
/// element descriptor.
pub fn write_type_desc(writer: &mut Writer, ty: &TypeDesc) -> Result<(), EncodeError> {
    let depth = ty.depth();
    if depth > MAX_TYPE_DEPTH {
        return Err(EncodeError::LengthExceedsLimit {
            field: "type depth",
            len: depth,
            max: MAX_TYPE_DEPTH,
        });
    }
    let mut current = ty;
    while let TypeDesc::Array(element) = current {
        current = element;
    }
    if let TypeDesc::Enum(name) | TypeDesc::Record(name) = current {
        check_name(name)?;
    }
    put_type_desc(writer, ty);
    Ok(())
}

fn put_type_desc(writer: &mut Writer, ty: &TypeDesc) {
    let mut current = ty;
    while let TypeDesc::Array(element) = current {
        writer.write_byte(ValueKind::Array as u8);
        current = element;
    }
    match current {
        TypeDesc::Enum(name) => {
            writer.write_byte(ValueKind::Enum as u8);
            writer.write_string(name);
        }
        TypeDesc::Record(name) => {
            writer.write_byte(ValueKind::Record as u8);
            writer.write_string(name);
        }
        other => writer.write_byte(other.kind().map_or(TAG_ANY, |kind| kind as u8)),
    }
}

/// Checks that a type, field or constant name fits the string limit.
pub(crate) fn check_name(name: &str) -> Result<(), EncodeError> {
    if name.len() > MAX_STRING_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field: "name",
            len: name.len(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(())
}

/// Writes the canonical schema body: name, field count, then each field's
/// name and type descriptor.
///
/// This is the input of the schema fingerprint. Limits are not checked
/// here; [`write_record_decl`] checks them before anything reaches the wire.
pub(crate) fn write_schema_body(writer: &mut Writer, name: &str, fields: &[FieldDesc]) {
    writer.write_string(name);
    writer.write_u32(fields.len() as u32);
    for field in fields {
        writer.write_string(&field.name);
        put_type_desc(writer, &field.ty);
    }
}

/// Writes a record schema declaration, tag included.
pub fn write_record_decl(writer: &mut Writer, record_type: &RecordType) -> Result<(), EncodeError> {
    let fields = record_type.fields();
    if fields.len() > MAX_FIELDS {
        return Err(EncodeError::LengthExceedsLimit {
            field: "field count",
            len: fields.len(),
            max: MAX_FIELDS,
        });
    }
    check_name(record_type.name())?;

    writer.write_byte(TAG_TYPE_DECL);
    writer.write_string(record_type.name());
    writer.write_u64(record_type.fingerprint());
    writer.write_u32(fields.len() as u32);
    for field in fields {
        check_name(&field.name)?;
        writer.write_string(&field.name);
        write_type_desc(writer, &field.ty)?;
    }
    Ok(())
}

/// Writes an enumeration type declaration, tag included.
pub fn write_enum_decl(writer: &mut Writer, type_name: &str) -> Result<(), EncodeError> {
    check_name(type_name)?;
    writer.write_byte(TAG_ENUM_DECL);
    writer.write_string(type_name);
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

/// Reads a type descriptor.
pub fn read_type_desc(reader: &mut Reader<'_>) -> Result<TypeDesc, DecodeError> {
    let mut depth = 0;
    let base = loop {
        let at = reader.position();
        let tag = reader.read_byte("type descriptor")?;
        if tag == TAG_ANY {
            break TypeDesc::Any;
        }
        break match ValueKind::from_u8(tag) {
            Some(ValueKind::Array) => {
                depth += 1;
                if depth > MAX_TYPE_DEPTH {
                    return Err(DecodeError::LengthExceedsLimit {
                        field: "type depth",
                        len: depth,
                        max: MAX_TYPE_DEPTH,
                    });
                }
                continue;
            }
            Some(ValueKind::Bool) => TypeDesc::Bool,
            Some(ValueKind::Byte) => TypeDesc::Byte,
            Some(ValueKind::Char) => TypeDesc::Char,
            Some(ValueKind::Short) => TypeDesc::Short,
            Some(ValueKind::Int) => TypeDesc::Int,
            Some(ValueKind::Long) => TypeDesc::Long,
            Some(ValueKind::Float) => TypeDesc::Float,
            Some(ValueKind::Double) => TypeDesc::Double,
            Some(ValueKind::Text) => TypeDesc::Text,
            Some(ValueKind::Bytes) => TypeDesc::Bytes,
            Some(ValueKind::Collection) => TypeDesc::Collection,
            Some(ValueKind::Enum) => {
                TypeDesc::Enum(reader.read_string(MAX_STRING_LEN, "enum type name")?)
            }
            Some(ValueKind::Record) => {
                TypeDesc::Record(reader.read_string(MAX_STRING_LEN, "record type name")?)
            }
            Some(ValueKind::Null) | None => {
                return Err(DecodeError::MalformedTag {
                    tag,
                    context: "type descriptor",
                    at,
                });
            }
        };
    };

    Ok((0..depth).fold(base, |element, _| TypeDesc::array_of(element)))
}

/// Reads a record schema declaration after its tag and verifies its
/// fingerprint.
pub fn read_record_decl(reader: &mut Reader<'_>) -> Result<RecordType, DecodeError> {
    let name = reader.read_string(MAX_STRING_LEN, "record type name")?;
    let declared = reader.read_u64("schema fingerprint")?;
    // Every field needs at least a name length and a descriptor byte.
    let count = reader.read_len(MAX_FIELDS, 5, "field count")?;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let field_name = reader.read_string(MAX_STRING_LEN, "field name")?;
        let ty = read_type_desc(reader)?;
        fields.push(FieldDesc {
            name: field_name,
            ty,
        });
    }

    let record_type = RecordType::new(name, fields);
    if record_type.fingerprint() != declared {
        return Err(DecodeError::FingerprintMismatch {
            type_name: record_type.name().to_string(),
            declared,
            computed: record_type.fingerprint(),
        });
    }
    Ok(record_type)
}

/// Reads an enumeration type declaration after its tag.
pub fn read_enum_decl(reader: &mut Reader<'_>) -> Result<String, DecodeError> {
    reader.read_string(MAX_STRING_LEN, "enum type name")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: &TypeDesc) -> TypeDesc {
        let mut writer = Writer::new();
        write_type_desc(&mut writer, ty).unwrap();
        let mut reader = Reader::new(writer.as_bytes());
        let decoded = read_type_desc(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn test_type_desc_roundtrip() {
        let types = [
            TypeDesc::Int,
            TypeDesc::Any,
            TypeDesc::Collection,
            TypeDesc::record("fixtures.Bar"),
            TypeDesc::enumeration("fixtures.Status"),
            TypeDesc::array_of(TypeDesc::array_of(TypeDesc::Text)),
            TypeDesc::array_of(TypeDesc::record("fixtures.Bar")),
        ];
        for ty in types {
            assert_eq!(roundtrip(&ty), ty);
        }
    }

    #[test]
    fn test_array_desc_layout() {
        let mut writer = Writer::new();
        write_type_desc(&mut writer, &TypeDesc::array_of(TypeDesc::Int)).unwrap();
        assert_eq!(writer.as_bytes(), &[0x0E, 0x06]);
    }

    #[test]
    fn test_type_depth_limit() {
        let mut ty = TypeDesc::Int;
        for _ in 0..=MAX_TYPE_DEPTH {
            ty = TypeDesc::array_of(ty);
        }
        let mut writer = Writer::new();
        assert!(matches!(
            write_type_desc(&mut writer, &ty),
            Err(EncodeError::LengthExceedsLimit { field: "type depth", .. })
        ));

        let data = vec![ValueKind::Array as u8; MAX_TYPE_DEPTH + 2];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            read_type_desc(&mut reader),
            Err(DecodeError::LengthExceedsLimit { field: "type depth", .. })
        ));
    }

    #[test]
    fn test_null_is_not_a_type() {
        let mut reader = Reader::new(&[0x01]);
        assert_eq!(
            read_type_desc(&mut reader),
            Err(DecodeError::MalformedTag {
                tag: 0x01,
                context: "type descriptor",
                at: 0
            })
        );
    }

    #[test]
    fn test_record_decl_roundtrip() {
        let record_type = RecordType::builder("fixtures.Bar")
            .field("value", TypeDesc::Int)
            .build();
        let mut writer = Writer::new();
        write_record_decl(&mut writer, &record_type).unwrap();

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_byte("tag").unwrap(), TAG_TYPE_DECL);
        assert_eq!(read_record_decl(&mut reader).unwrap(), record_type);
    }

    #[test]
    fn test_record_decl_fingerprint_checked() {
        let record_type = RecordType::builder("fixtures.Bar")
            .field("value", TypeDesc::Int)
            .build();
        let mut writer = Writer::new();
        write_record_decl(&mut writer, &record_type).unwrap();
        let mut bytes = writer.into_bytes();
        // Retype the field from int to long without fixing the fingerprint.
        let last = bytes.len() - 1;
        bytes[last] = ValueKind::Long as u8;

        let mut reader = Reader::new(&bytes[1..]);
        assert!(matches!(
            read_record_decl(&mut reader),
            Err(DecodeError::FingerprintMismatch { .. })
        ));
    }
}
