//! Schema types: type descriptors, record types and enumeration types.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::codec::primitives::Writer;
use crate::codec::schema::write_schema_body;
use crate::model::{EnumConstant, Value, ValueKind};

/// Declared type of a record field or array element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
    Bytes,
    /// Constant of the named enumeration type.
    Enum(String),
    /// Record of the named type.
    Record(String),
    /// Array with the given element type.
    Array(Box<TypeDesc>),
    Collection,
    /// Any value, including null.
    Any,
}

impl TypeDesc {
    /// Shorthand for `TypeDesc::Array(Box::new(element))`.
    pub fn array_of(element: TypeDesc) -> TypeDesc {
        TypeDesc::Array(Box::new(element))
    }

    /// Shorthand for `TypeDesc::Record(name.into())`.
    pub fn record(name: impl Into<String>) -> TypeDesc {
        TypeDesc::Record(name.into())
    }

    /// Shorthand for `TypeDesc::Enum(name.into())`.
    pub fn enumeration(name: impl Into<String>) -> TypeDesc {
        TypeDesc::Enum(name.into())
    }

    /// The value kind this type describes; None for `Any`.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            TypeDesc::Bool => ValueKind::Bool,
            TypeDesc::Byte => ValueKind::Byte,
            TypeDesc::Char => ValueKind::Char,
            TypeDesc::Short => ValueKind::Short,
            TypeDesc::Int => ValueKind::Int,
            TypeDesc::Long => ValueKind::Long,
            TypeDesc::Float => ValueKind::Float,
            TypeDesc::Double => ValueKind::Double,
            TypeDesc::Text => ValueKind::Text,
            TypeDesc::Bytes => ValueKind::Bytes,
            TypeDesc::Enum(_) => ValueKind::Enum,
            TypeDesc::Record(_) => ValueKind::Record,
            TypeDesc::Array(_) => ValueKind::Array,
            TypeDesc::Collection => ValueKind::Collection,
            TypeDesc::Any => return None,
        })
    }

    /// Returns true for fixed-width types, which never admit null.
    pub fn is_primitive(&self) -> bool {
        self.kind().is_some_and(ValueKind::is_primitive)
    }

    /// Zero for primitives, null for everything else.
    pub fn default_value(&self) -> Value {
        match self {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Byte => Value::Byte(0),
            TypeDesc::Char => Value::Char(0),
            TypeDesc::Short => Value::Short(0),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Long => Value::Long(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Double => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    /// Returns true if `value` may be stored in a slot of this type.
    ///
    /// Only object headers are inspected, never slots, so this is safe to
    /// call while an object is being filled.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeDesc::Any, _) => true,
            (ty, Value::Null) => !ty.is_primitive(),
            (TypeDesc::Enum(name), Value::Enum(e)) => e.type_name() == name,
            (TypeDesc::Record(name), Value::Record(r)) => r.type_name() == name,
            (TypeDesc::Array(element), Value::Array(a)) => a.element_type() == element.as_ref(),
            (ty, value) => ty.kind() == Some(value.kind()),
        }
    }

    /// Nesting depth of array descriptors (0 for non-arrays).
    pub fn depth(&self) -> usize {
        match self {
            TypeDesc::Array(element) => 1 + element.depth(),
            _ => 0,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Enum(name) | TypeDesc::Record(name) => f.write_str(name),
            TypeDesc::Array(element) => write!(f, "{element}[]"),
            TypeDesc::Any => f.write_str("any"),
            other => match other.kind() {
                Some(kind) => f.write_str(kind.name()),
                None => f.write_str("any"),
            },
        }
    }
}

/// A named, typed field of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDesc {
    pub name: String,
    pub ty: TypeDesc,
}

/// A record type: a name plus an ordered field layout.
///
/// The fingerprint is derived from the name and layout and travels with the
/// schema declaration, so a decoder can detect a corrupted declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDesc>,
    fingerprint: u64,
}

impl RecordType {
    /// Creates a record type from its fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDesc>) -> Self {
        let name = name.into();
        let fingerprint = compute_fingerprint(&name, &fields);
        Self {
            name,
            fields,
            fingerprint,
        }
    }

    /// Starts building a record type.
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    /// 64-bit schema fingerprint (first 8 bytes of SHA-256, big-endian).
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Position of the named field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Declared type of the named field.
    pub fn field_type(&self, name: &str) -> Option<&TypeDesc> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

fn compute_fingerprint(name: &str, fields: &[FieldDesc]) -> u64 {
    let mut writer = Writer::new();
    write_schema_body(&mut writer, name, fields);
    let hash = Sha256::digest(writer.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(prefix)
}

/// Builder for [`RecordType`].
#[derive(Debug, Clone)]
pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldDesc>,
}

impl RecordTypeBuilder {
    /// Appends a field.
    pub fn field(mut self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.fields.push(FieldDesc {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn build(self) -> RecordType {
        RecordType::new(self.name, self.fields)
    }
}

/// A declared enumeration type: a closed, ordered set of constant names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    name: String,
    constants: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    /// Returns true if `name` is one of the declared constants.
    pub fn contains(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c == name)
    }

    /// Position of a constant in declaration order.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.constants.iter().position(|c| c == name)
    }

    /// Returns the named constant if it belongs to this type.
    pub fn constant(&self, name: &str) -> Option<EnumConstant> {
        self.contains(name)
            .then(|| EnumConstant::new(self.name.clone(), name))
    }

    /// Type descriptor for slots holding constants of this type.
    pub fn type_desc(&self) -> TypeDesc {
        TypeDesc::Enum(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::model::{ArrayRef, RecordRef};

    #[test]
    fn test_admits_primitives() {
        assert!(TypeDesc::Int.admits(&Value::Int(1)));
        assert!(!TypeDesc::Int.admits(&Value::Long(1)));
        assert!(!TypeDesc::Int.admits(&Value::Null));
        assert!(TypeDesc::Text.admits(&Value::Null));
        assert!(TypeDesc::Any.admits(&Value::Null));
        assert!(TypeDesc::Any.admits(&Value::Double(1.0)));
    }

    #[test]
    fn test_admits_named_types() {
        let bar = Rc::new(RecordType::builder("Bar").field("value", TypeDesc::Int).build());
        let record = Value::Record(RecordRef::new(bar, vec![Value::Int(1)]));
        assert!(TypeDesc::record("Bar").admits(&record));
        assert!(!TypeDesc::record("Baz").admits(&record));

        let status = Value::Enum(EnumConstant::new("Status", "SNAFU"));
        assert!(TypeDesc::enumeration("Status").admits(&status));
        assert!(!TypeDesc::enumeration("Prefix").admits(&status));

        let ints = Value::Array(ArrayRef::new(TypeDesc::Int, vec![]));
        assert!(TypeDesc::array_of(TypeDesc::Int).admits(&ints));
        assert!(!TypeDesc::array_of(TypeDesc::Long).admits(&ints));
    }

    #[test]
    fn test_fingerprint_depends_on_layout() {
        let a = RecordType::builder("Bar").field("value", TypeDesc::Int).build();
        let b = RecordType::builder("Bar").field("value", TypeDesc::Int).build();
        let c = RecordType::builder("Bar").field("value", TypeDesc::Long).build();
        let d = RecordType::builder("Baz").field("value", TypeDesc::Int).build();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeDesc::array_of(TypeDesc::record("Bar")).to_string(), "Bar[]");
        assert_eq!(TypeDesc::array_of(TypeDesc::array_of(TypeDesc::Int)).to_string(), "int[][]");
        assert_eq!(TypeDesc::Any.to_string(), "any");
    }

    #[test]
    fn test_enum_type_membership() {
        let status = EnumType::new("Status", ["SNAFU", "TARFU", "FUBAR"]);
        assert_eq!(status.constant("FUBAR"), Some(EnumConstant::new("Status", "FUBAR")));
        assert_eq!(status.constant("KILO"), None);
        assert_eq!(status.ordinal("TARFU"), Some(1));
    }
}
