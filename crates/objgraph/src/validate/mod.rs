//! Semantic validation for object graphs.
//!
//! Structural validation happens during encode and decode: slot counts and
//! slot types are checked against the schema each record carries. This module
//! checks a graph against schemas the application expects, which requires
//! context the stream itself cannot provide.
//!
//! **Note:** Validation is advisory. Types that are not registered in the
//! [`SchemaContext`] are allowed; registered types must match exactly.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ValidationError;
use crate::model::{EnumType, RecordType, Value, visit};

/// Schema context for semantic validation.
///
/// Applications register the record and enum types they expect and validate
/// decoded graphs against them.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    records: HashMap<String, Rc<RecordType>>,
    enums: HashMap<String, EnumType>,
}

impl SchemaContext {
    /// Creates a new empty schema context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expected record type, replacing any previous one of the
    /// same name.
    pub fn add_record_type(&mut self, record_type: Rc<RecordType>) {
        self.records
            .insert(record_type.name().to_string(), record_type);
    }

    /// Registers an expected enumeration type.
    pub fn add_enum_type(&mut self, enum_type: EnumType) {
        self.enums.insert(enum_type.name().to_string(), enum_type);
    }

    /// Gets the expected record type, if registered.
    pub fn record_type(&self, name: &str) -> Option<&Rc<RecordType>> {
        self.records.get(name)
    }

    /// Gets the expected enumeration type, if registered.
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }
}

/// Validates every value reachable from `root` against a schema context.
///
/// Reports the first problem found:
/// - a record whose type differs from the registered type of that name
/// - a record or array slot its declared type does not admit
/// - an enum constant outside its registered type
pub fn validate_value(root: &Value, schema: &SchemaContext) -> Result<(), ValidationError> {
    let mut first_error = None;
    visit(root, |value| {
        if first_error.is_none() {
            first_error = check(value, schema).err();
        }
    });
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn check(value: &Value, schema: &SchemaContext) -> Result<(), ValidationError> {
    match value {
        Value::Record(record) => {
            let record_type = record.record_type();
            if let Some(expected) = schema.record_type(record_type.name()) {
                if expected != record_type {
                    return Err(ValidationError::SchemaMismatch {
                        type_name: record_type.name().to_string(),
                    });
                }
            }

            let slots = record.try_slots().ok_or(ValidationError::Borrowed)?;
            let fields = record_type.fields();
            if slots.len() != fields.len() {
                return Err(ValidationError::FieldCountMismatch {
                    type_name: record_type.name().to_string(),
                    expected: fields.len(),
                    actual: slots.len(),
                });
            }
            for (field, slot) in fields.iter().zip(slots.iter()) {
                if !field.ty.admits(slot) {
                    return Err(ValidationError::FieldTypeMismatch {
                        type_name: record_type.name().to_string(),
                        field: field.name.clone(),
                        found: slot.kind_name(),
                    });
                }
            }
        }
        Value::Array(array) => {
            let slots = array.try_slots().ok_or(ValidationError::Borrowed)?;
            let element_type = array.element_type();
            if let Some((index, item)) = slots
                .iter()
                .enumerate()
                .find(|(_, item)| !element_type.admits(item))
            {
                return Err(ValidationError::FieldTypeMismatch {
                    type_name: format!("{element_type}[]"),
                    field: index.to_string(),
                    found: item.kind_name(),
                });
            }
        }
        Value::Enum(constant) => {
            if let Some(enum_type) = schema.enum_type(constant.type_name()) {
                if !enum_type.contains(constant.name()) {
                    return Err(ValidationError::UnknownEnumConstant {
                        type_name: constant.type_name().to_string(),
                        constant: constant.name().to_string(),
                    });
                }
            }
        }
        _ => {}
    }
    Ok(())
}
