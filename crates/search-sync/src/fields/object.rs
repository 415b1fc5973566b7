//! Object and nested field preparation.

use serde_json::{Map, Value};

use crate::error::SyncResult;
use crate::record::{FieldValue, RecordKey, ValueShape};

use super::Field;

/// Builds the indexed value of an object field from its resolved value.
///
/// Empty values become `{}`. Sequences become a list of inner objects, skipping
/// the ignored record. Anything else becomes a single inner object.
pub(super) fn prepare(
    field: &Field,
    value: FieldValue,
    ignore: Option<&RecordKey>,
) -> SyncResult<Value> {
    match value.shape() {
        ValueShape::Empty => Ok(Value::Object(Map::new())),
        ValueShape::Sequence => {
            let mut objects = Vec::new();
            for element in value.into_items() {
                if ignore.is_some_and(|key| element.is_record(key)) {
                    continue;
                }
                objects.push(inner_object(field, &element, ignore)?);
            }
            Ok(Value::Array(objects))
        }
        _ => inner_object(field, &value, ignore),
    }
}

fn inner_object(field: &Field, value: &FieldValue, ignore: Option<&RecordKey>) -> SyncResult<Value> {
    let mut data = Map::new();

    for (name, inner) in field.properties() {
        let prepared = match field.inner_preparer(name) {
            Some(preparer) => preparer(value)?,
            None => inner.extract_from(value, name, ignore)?,
        };
        data.insert(name.clone(), prepared);
    }

    // Schema-less mappings are indexed as-is.
    if data.is_empty() && value.shape() == ValueShape::Mapping {
        return Ok(value.to_json());
    }

    Ok(Value::Object(data))
}
