//! Path traversal over record values.

use serde_json::Value;

use crate::error::{FieldError, SyncResult};
use crate::record::{FieldValue, RecordKey};

/// Resolves a dotted path against an instance value.
///
/// Each segment is looked up by item, then by attribute, then by integer index;
/// the first lookup that succeeds wins. If none succeeds, a required path fails
/// with [`FieldError::VariableLookup`] and an optional one resolves to
/// [`FieldValue::Null`].
///
/// After each step, relations are materialized and callables invoked. A null
/// value, or the record identified by `ignore`, short-circuits to `Null`.
/// Deferred text is forced at the end.
pub fn resolve(
    instance: &FieldValue,
    path: &[String],
    required: bool,
    ignore: Option<&RecordKey>,
) -> SyncResult<FieldValue> {
    if instance.is_null() {
        return Ok(FieldValue::Null);
    }

    let mut current = instance.clone();

    for segment in path {
        let next = match lookup(&current, segment) {
            Some(value) => value,
            None if required => {
                return Err(FieldError::VariableLookup {
                    segment: segment.clone(),
                    instance: format!("{:?}", current),
                }
                .into());
            }
            None => return Ok(FieldValue::Null),
        };

        current = next.materialize();
        if current.is_null() || is_ignored(&current, ignore) {
            return Ok(FieldValue::Null);
        }
    }

    if is_ignored(&current, ignore) {
        return Ok(FieldValue::Null);
    }

    Ok(current.force_lazy())
}

fn is_ignored(value: &FieldValue, ignore: Option<&RecordKey>) -> bool {
    ignore.is_some_and(|key| value.is_record(key))
}

fn lookup(value: &FieldValue, segment: &str) -> Option<FieldValue> {
    item(value, segment)
        .or_else(|| attribute(value, segment))
        .or_else(|| index(value, segment))
}

fn item(value: &FieldValue, key: &str) -> Option<FieldValue> {
    match value {
        FieldValue::Mapping(map) => map.get(key).cloned(),
        FieldValue::Scalar(Value::Object(map)) => map.get(key).cloned().map(FieldValue::Scalar),
        FieldValue::Record(record) => record.item(key),
        _ => None,
    }
}

fn attribute(value: &FieldValue, name: &str) -> Option<FieldValue> {
    match value {
        FieldValue::Record(record) => record.attribute(name),
        _ => None,
    }
}

fn index(value: &FieldValue, segment: &str) -> Option<FieldValue> {
    let position: i64 = segment.parse().ok()?;
    match value {
        FieldValue::Sequence(items) => offset(items.len(), position).map(|i| items[i].clone()),
        FieldValue::Scalar(Value::Array(items)) => {
            offset(items.len(), position).map(|i| FieldValue::Scalar(items[i].clone()))
        }
        _ => None,
    }
}

/// Converts a possibly negative index into an offset.
fn offset(len: usize, position: i64) -> Option<usize> {
    let len = len as i64;
    let index = if position < 0 { len + position } else { position };
    (0..len).contains(&index).then_some(index as usize)
}
