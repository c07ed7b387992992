//! Value types for object graphs.
//!
//! A [`Value`] is either a scalar (primitives, text, byte sequences, enum
//! constants) or a handle to a shared object (record, array, collection).
//! Objects have identity: cloning a handle yields another reference to the
//! same object, which is how shared references and cycles are expressed.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::model::{RecordType, TypeDesc};

/// Value kinds with their wire tags (one byte per kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Null = 0x01,
    Bool = 0x02,
    Byte = 0x03,
    Char = 0x04,
    Short = 0x05,
    Int = 0x06,
    Long = 0x07,
    Float = 0x08,
    Double = 0x09,
    Text = 0x0A,
    Bytes = 0x0B,
    Enum = 0x0C,
    Record = 0x0D,
    Array = 0x0E,
    Collection = 0x0F,
}

impl ValueKind {
    /// Creates a ValueKind from its wire tag.
    pub fn from_u8(v: u8) -> Option<ValueKind> {
        match v {
            0x01 => Some(ValueKind::Null),
            0x02 => Some(ValueKind::Bool),
            0x03 => Some(ValueKind::Byte),
            0x04 => Some(ValueKind::Char),
            0x05 => Some(ValueKind::Short),
            0x06 => Some(ValueKind::Int),
            0x07 => Some(ValueKind::Long),
            0x08 => Some(ValueKind::Float),
            0x09 => Some(ValueKind::Double),
            0x0A => Some(ValueKind::Text),
            0x0B => Some(ValueKind::Bytes),
            0x0C => Some(ValueKind::Enum),
            0x0D => Some(ValueKind::Record),
            0x0E => Some(ValueKind::Array),
            0x0F => Some(ValueKind::Collection),
            _ => None,
        }
    }

    /// Lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Byte => "byte",
            ValueKind::Char => "char",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Enum => "enum",
            ValueKind::Record => "record",
            ValueKind::Array => "array",
            ValueKind::Collection => "collection",
        }
    }

    /// Returns true for fixed-width kinds that can never be null.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueKind::Bool
                | ValueKind::Byte
                | ValueKind::Char
                | ValueKind::Short
                | ValueKind::Int
                | ValueKind::Long
                | ValueKind::Float
                | ValueKind::Double
        )
    }

    /// Returns true for kinds with identity (records, arrays, collections).
    pub fn is_object(self) -> bool {
        matches!(
            self,
            ValueKind::Record | ValueKind::Array | ValueKind::Collection
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constant of an enumeration type, identified by type name and constant name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumConstant {
    type_name: String,
    name: String,
}

impl EnumConstant {
    /// Creates a constant without checking it against a declared [`crate::model::EnumType`].
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Name of the enumeration type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the constant.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for EnumConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.name)
    }
}

struct Object<H> {
    header: H,
    slots: RefCell<Vec<Value>>,
}

/// Frees nested objects with a loop instead of recursive `Rc` drops, so
/// dropping a deep graph uses constant stack.
impl<H> Drop for Object<H> {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        if slots.iter().all(|slot| slot.object_addr().is_none()) {
            return;
        }

        let mut pending = std::mem::take(slots);
        while let Some(value) = pending.pop() {
            match value {
                Value::Record(r) => r.release_into(&mut pending),
                Value::Array(a) => a.release_into(&mut pending),
                Value::Collection(c) => c.release_into(&mut pending),
                _ => {}
            }
        }
    }
}

/// Handle to a shared object: an immutable header plus mutable slots.
///
/// The header is fixed when the object is created (a record's type, an
/// array's element type); only the slots can change afterwards.
pub struct Shared<H> {
    inner: Rc<Object<H>>,
}

/// A record: slots are field values in schema order.
pub type RecordRef = Shared<Rc<RecordType>>;

/// An array: slots share one declared element type.
pub type ArrayRef = Shared<TypeDesc>;

/// An ordered collection of values of any kind.
pub type CollectionRef = Shared<()>;

impl<H> Clone for Shared<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H> Shared<H> {
    /// Creates a new object with the given header and slots.
    pub fn with_slots(header: H, slots: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(Object {
                header,
                slots: RefCell::new(slots),
            }),
        }
    }

    /// Returns the header.
    pub fn header(&self) -> &H {
        &self.inner.header
    }

    /// Borrows the slots.
    ///
    /// # Panics
    ///
    /// Panics if the slots are currently mutably borrowed.
    pub fn slots(&self) -> Ref<'_, Vec<Value>> {
        self.inner.slots.borrow()
    }

    /// Borrows the slots, or returns None if they are mutably borrowed.
    pub fn try_slots(&self) -> Option<Ref<'_, Vec<Value>>> {
        self.inner.slots.try_borrow().ok()
    }

    /// Mutably borrows the slots.
    ///
    /// # Panics
    ///
    /// Panics if the slots are currently borrowed.
    pub fn slots_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.inner.slots.borrow_mut()
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Returns true if the object has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Returns a clone of the slot at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slots().get(index).cloned()
    }

    /// Appends a slot.
    pub fn push(&self, value: Value) {
        self.slots_mut().push(value);
    }

    /// Removes every slot. Returns false if the slots are currently borrowed.
    pub fn clear(&self) -> bool {
        match self.inner.slots.try_borrow_mut() {
            Ok(mut slots) => {
                slots.clear();
                true
            }
            Err(_) => false,
        }
    }

    /// Moves the slots into `pending` if this is the last handle, so the
    /// object itself drops empty.
    fn release_into(mut self, pending: &mut Vec<Value>) {
        if let Some(object) = Rc::get_mut(&mut self.inner) {
            pending.append(object.slots.get_mut());
        }
    }

    /// Returns true if both handles point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the object, stable for as long as any handle is alive.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl Shared<Rc<RecordType>> {
    /// Creates a record from field values in schema order.
    ///
    /// Values are not checked here; the encoder rejects records whose values
    /// do not fit the schema.
    pub fn new(record_type: Rc<RecordType>, values: Vec<Value>) -> Self {
        Self::with_slots(record_type, values)
    }

    /// Creates a record with every field set to its type's default value.
    pub fn with_defaults(record_type: Rc<RecordType>) -> Self {
        let values = record_type
            .fields()
            .iter()
            .map(|f| f.ty.default_value())
            .collect();
        Self::with_slots(record_type, values)
    }

    /// The record's type.
    pub fn record_type(&self) -> &Rc<RecordType> {
        self.header()
    }

    /// Name of the record's type.
    pub fn type_name(&self) -> &str {
        self.header().name()
    }

    /// Returns a clone of the named field's value.
    pub fn field(&self, name: &str) -> Option<Value> {
        let index = self.header().field_index(name)?;
        self.get(index)
    }

    /// Replaces the named field's value, returning the previous one.
    ///
    /// Returns None if the schema has no such field.
    pub fn set_field(&self, name: &str, value: Value) -> Option<Value> {
        let index = self.header().field_index(name)?;
        let mut slots = self.slots_mut();
        let slot = slots.get_mut(index)?;
        Some(std::mem::replace(slot, value))
    }
}

impl Shared<TypeDesc> {
    /// Creates an array with the given element type.
    pub fn new(element_type: TypeDesc, items: Vec<Value>) -> Self {
        Self::with_slots(element_type, items)
    }

    /// The declared element type.
    pub fn element_type(&self) -> &TypeDesc {
        self.header()
    }
}

impl Shared<()> {
    /// Creates a collection.
    pub fn new(items: Vec<Value>) -> Self {
        Self::with_slots((), items)
    }
}

thread_local! {
    static FORMATTING: RefCell<FxHashSet<usize>> = RefCell::new(FxHashSet::default());
}

impl<H: fmt::Debug> fmt::Debug for Shared<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.addr();
        if !FORMATTING.with(|active| active.borrow_mut().insert(addr)) {
            return write!(f, "<cycle @{addr:#x}>");
        }
        let mut out = f.debug_struct("Shared");
        out.field("header", self.header());
        let result = match self.try_slots() {
            Some(slots) => out.field("slots", &*slots).finish(),
            None => out.field("slots", &"<borrowed>").finish(),
        };
        FORMATTING.with(|active| active.borrow_mut().remove(&addr));
        result
    }
}

/// A serializable datum.
///
/// Equality is structural and identity-aware: two values are equal when their
/// graphs are isomorphic (see [`crate::model::isomorphic`]). Floats compare by
/// bit pattern, so `NaN == NaN` when the payloads match.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    /// One UTF-16 code unit.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Enum(EnumConstant),
    Record(RecordRef),
    Array(ArrayRef),
    Collection(CollectionRef),
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Byte(_) => ValueKind::Byte,
            Value::Char(_) => ValueKind::Char,
            Value::Short(_) => ValueKind::Short,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Enum(_) => ValueKind::Enum,
            Value::Record(_) => ValueKind::Record,
            Value::Array(_) => ValueKind::Array,
            Value::Collection(_) => ValueKind::Collection,
        }
    }

    /// Lowercase kind name.
    pub fn kind_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Creates a `Char` from a character in the Basic Multilingual Plane.
    ///
    /// Returns None for characters that need a surrogate pair.
    pub fn char(c: char) -> Option<Value> {
        u16::try_from(u32::from(c)).ok().map(Value::Char)
    }

    /// Creates a record value.
    pub fn record(record_type: Rc<RecordType>, values: Vec<Value>) -> Value {
        Value::Record(RecordRef::new(record_type, values))
    }

    /// Creates an array value.
    pub fn array(element_type: TypeDesc, items: Vec<Value>) -> Value {
        Value::Array(ArrayRef::new(element_type, items))
    }

    /// Creates a collection value.
    pub fn collection(items: Vec<Value>) -> Value {
        Value::Collection(CollectionRef::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decodes a `Char` into a Rust char; None for other kinds and lone surrogates.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => char::from_u32(u32::from(*c)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumConstant> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionRef> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Object address for records, arrays and collections.
    pub fn object_addr(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(r.addr()),
            Value::Array(a) => Some(a.addr()),
            Value::Collection(c) => Some(c.addr()),
            _ => None,
        }
    }

    /// Returns true if both values are handles to the same object.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self.object_addr(), other.object_addr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::model::isomorphic(self, other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<EnumConstant> for Value {
    fn from(v: EnumConstant) -> Self {
        Value::Enum(v)
    }
}

impl From<RecordRef> for Value {
    fn from(v: RecordRef) -> Self {
        Value::Record(v)
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Value::Array(v)
    }
}

impl From<CollectionRef> for Value {
    fn from(v: CollectionRef) -> Self {
        Value::Collection(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_type() -> Rc<RecordType> {
        Rc::new(
            RecordType::builder("test.Node")
                .field("id", TypeDesc::Int)
                .field("next", TypeDesc::Record("test.Node".to_string()))
                .build(),
        )
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for tag in 0x01..=0x0F {
            let kind = ValueKind::from_u8(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
        assert_eq!(ValueKind::from_u8(0x00), None);
        assert_eq!(ValueKind::from_u8(0x10), None);
    }

    #[test]
    fn test_drop_deep_nesting() {
        let node_type = node_type();
        let mut root = Value::collection(vec![]);
        for i in 0..200_000 {
            root = match i % 3 {
                0 => Value::collection(vec![root]),
                1 => Value::array(TypeDesc::Any, vec![root]),
                _ => Value::record(node_type.clone(), vec![Value::Int(i), root]),
            };
        }
        drop(root);
    }

    #[test]
    fn test_drop_keeps_shared_children() {
        let shared = Value::collection(vec![Value::Int(7)]);
        let parent = Value::collection(vec![shared.clone(), Value::collection(vec![shared.clone()])]);
        drop(parent);
        let items = shared.as_collection().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.get(0).unwrap().kind(), ValueKind::Int);
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = Value::collection(vec![Value::Int(1)]);
        let b = a.clone();
        assert!(a.same_object(&b));

        let c = Value::collection(vec![Value::Int(1)]);
        assert!(!a.same_object(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn test_record_fields() {
        let node = RecordRef::with_defaults(node_type());
        assert_eq!(node.field("id"), Some(Value::Int(0)));
        assert_eq!(node.field("next"), Some(Value::Null));
        assert_eq!(node.field("missing"), None);

        assert_eq!(node.set_field("id", Value::Int(7)), Some(Value::Int(0)));
        assert_eq!(node.field("id"), Some(Value::Int(7)));
        assert_eq!(node.set_field("missing", Value::Int(1)), None);
    }

    #[test]
    fn test_debug_terminates_on_cycle() {
        let node = RecordRef::with_defaults(node_type());
        node.set_field("next", Value::Record(node.clone()));
        let text = format!("{:?}", Value::Record(node));
        assert!(text.contains("<cycle"));
    }

    #[test]
    fn test_char_helpers() {
        assert_eq!(Value::char('e'), Some(Value::Char(0x65)));
        assert_eq!(Value::char('\u{1F600}'), None);
        assert_eq!(Value::Char(0x61).as_char(), Some('a'));
        assert_eq!(Value::Char(0xD800).as_char(), None);
    }
}
