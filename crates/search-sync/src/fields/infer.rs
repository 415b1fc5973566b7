//! Field inference from record attribute kinds.

use crate::error::DeclarationError;
use crate::record::{AttributeKind, RecordSchema};

use super::Field;

/// Returns the default field for an attribute kind, if it has one.
///
/// Relations, JSON documents and methods have no default field.
pub fn field_for_attribute(kind: &AttributeKind) -> Option<Field> {
    let field = match kind {
        AttributeKind::Auto
        | AttributeKind::Integer
        | AttributeKind::PositiveInteger => Field::integer(),
        AttributeKind::BigAuto | AttributeKind::BigInteger | AttributeKind::Time => Field::long(),
        AttributeKind::SmallInteger | AttributeKind::PositiveSmallInteger => Field::short(),
        AttributeKind::Boolean | AttributeKind::NullBoolean => Field::boolean(),
        AttributeKind::Char | AttributeKind::Text | AttributeKind::Email | AttributeKind::Url => {
            Field::text()
        }
        AttributeKind::Slug | AttributeKind::FilePath | AttributeKind::Uuid => Field::keyword(),
        AttributeKind::Date | AttributeKind::DateTime => Field::date(),
        AttributeKind::Decimal | AttributeKind::Float => Field::double(),
        AttributeKind::File | AttributeKind::Image => Field::file(),
        AttributeKind::Json
        | AttributeKind::Method
        | AttributeKind::ForeignKey(_)
        | AttributeKind::OneToOne(_)
        | AttributeKind::ManyToMany(_)
        | AttributeKind::Reverse(_) => return None,
    };
    Some(field)
}

/// Infers the field for a named attribute of a record schema.
///
/// The inferred field's path is the attribute name.
pub fn infer_field(schema: &RecordSchema, attribute: &str) -> Result<Field, DeclarationError> {
    schema
        .attribute(attribute)
        .and_then(field_for_attribute)
        .map(|field| field.attr(attribute))
        .ok_or_else(|| DeclarationError::ModelFieldNotMapped {
            record_type: schema.record_type().clone(),
            attribute: attribute.to_string(),
        })
}
