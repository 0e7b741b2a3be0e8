//! JSON rows to Arrow conversion
//!
//! Schema inference keeps columns in first-seen order. Conflicting types fall
//! back to strings, and columns that are null everywhere become nullable
//! strings so every column has a physical Parquet type.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, StringArray, StructArray,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;

/// Infer an Arrow schema from rows
pub fn infer_schema(rows: &[JsonObject]) -> Schema {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, DataType> = HashMap::new();

    for row in rows {
        for (key, value) in row {
            let inferred = infer_type(value);
            match types.get_mut(key) {
                Some(existing) => *existing = merge_types(existing, &inferred),
                None => {
                    order.push(key.clone());
                    types.insert(key.clone(), inferred);
                }
            }
        }
    }

    let fields: Vec<Field> = order
        .into_iter()
        .map(|name| {
            let dtype = types.remove(&name).map_or(DataType::Utf8, |t| concrete(&t));
            Field::new(name, dtype, true)
        })
        .collect();

    Schema::new(fields)
}

/// Convert rows to a RecordBatch with an inferred schema
pub fn rows_to_batch(rows: &[JsonObject]) -> Result<RecordBatch> {
    let schema = Arc::new(infer_schema(rows));

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<Option<&JsonValue>> =
                rows.iter().map(|row| row.get(field.name())).collect();
            build_array(&values, field.data_type())
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn infer_type(value: &JsonValue) -> DataType {
    match value {
        JsonValue::Null => DataType::Null,
        JsonValue::Bool(_) => DataType::Boolean,
        JsonValue::Number(n) => {
            if n.is_i64() {
                DataType::Int64
            } else {
                DataType::Float64
            }
        }
        JsonValue::String(_) => DataType::Utf8,
        JsonValue::Array(items) => {
            let item_type = items
                .iter()
                .filter(|v| !v.is_null())
                .map(infer_type)
                .reduce(|a, b| merge_types(&a, &b))
                .unwrap_or(DataType::Null);
            DataType::List(Arc::new(Field::new("item", item_type, true)))
        }
        JsonValue::Object(obj) if obj.is_empty() => DataType::Utf8,
        JsonValue::Object(obj) => {
            let fields: Vec<Field> = obj
                .iter()
                .map(|(k, v)| Field::new(k, infer_type(v), true))
                .collect();
            DataType::Struct(Fields::from(fields))
        }
    }
}

fn merge_types(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        (DataType::List(x), DataType::List(y)) => DataType::List(Arc::new(Field::new(
            "item",
            merge_types(x.data_type(), y.data_type()),
            true,
        ))),
        _ => DataType::Utf8,
    }
}

/// Replace `Null` types (all values missing) with `Utf8`
fn concrete(dtype: &DataType) -> DataType {
    match dtype {
        DataType::Null => DataType::Utf8,
        DataType::List(item) => {
            DataType::List(Arc::new(Field::new("item", concrete(item.data_type()), true)))
        }
        DataType::Struct(fields) => DataType::Struct(Fields::from(
            fields
                .iter()
                .map(|f| Field::new(f.name(), concrete(f.data_type()), true))
                .collect::<Vec<_>>(),
        )),
        other => other.clone(),
    }
}

fn build_array(values: &[Option<&JsonValue>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(JsonValue::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(JsonValue::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(JsonValue::as_f64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::List(field) => build_list_array(values, field),

        DataType::Struct(fields) => build_struct_array(values, fields),

        _ => {
            let arr: StringArray = values
                .iter()
                .map(|v| match v {
                    None | Some(JsonValue::Null) => None,
                    Some(JsonValue::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect();
            Ok(Arc::new(arr))
        }
    }
}

fn build_list_array(values: &[Option<&JsonValue>], field: &Arc<Field>) -> Result<ArrayRef> {
    let mut items: Vec<Option<&JsonValue>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];

    for value in values {
        if let Some(JsonValue::Array(arr)) = value {
            items.extend(arr.iter().map(Some));
        }
        let offset = i32::try_from(items.len())
            .map_err(|_| Error::warehouse("List column too large for i32 offsets"))?;
        offsets.push(offset);
    }

    let items_array = build_array(&items, field.data_type())?;
    let list = ListArray::try_new(
        Arc::clone(field),
        OffsetBuffer::new(offsets.into()),
        items_array,
        None,
    )?;
    Ok(Arc::new(list))
}

fn build_struct_array(values: &[Option<&JsonValue>], fields: &Fields) -> Result<ArrayRef> {
    let children = fields
        .iter()
        .map(|field| {
            let child_values: Vec<Option<&JsonValue>> = values
                .iter()
                .map(|v| match v {
                    Some(JsonValue::Object(obj)) => obj.get(field.name()),
                    _ => None,
                })
                .collect();
            build_array(&child_values, field.data_type())
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    Ok(Arc::new(StructArray::try_new(fields.clone(), children, None)?))
}
