//! Field name sanitization
//!
//! Warehouse column names may not contain `$ @ # . <space> -`. Each of those
//! characters is replaced with `_` in every object key, at every depth.

use crate::types::{JsonObject, JsonValue};
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Characters that are not allowed in column names
const RESERVED: [char; 6] = ['$', '@', '#', '.', ' ', '-'];

/// Column holding the load timestamp
pub const EXTRACTED_AT: &str = "_extracted_at";

/// Replace every reserved character of a key with `_`
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

/// Return a copy of `value` with every object key sanitized
///
/// Values are untouched. Arrays are only descended into when their first
/// element is an object; non-object elements of such arrays pass through.
pub fn sanitize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(sanitize_object(map)),
        JsonValue::Array(items) if matches!(items.first(), Some(JsonValue::Object(_))) => {
            JsonValue::Array(
                items
                    .iter()
                    .map(|item| match item {
                        JsonValue::Object(map) => JsonValue::Object(sanitize_object(map)),
                        other => other.clone(),
                    })
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

/// Sanitize the keys of one object
///
/// Keys that are already clean keep their name. A key whose sanitized form is
/// taken gets the first free `_2`, `_3`, ... suffix, in key order.
pub fn sanitize_object(map: &JsonObject) -> JsonObject {
    let mut taken: HashSet<String> = map
        .keys()
        .filter(|key| sanitize_key(key) == **key)
        .cloned()
        .collect();

    let mut out = JsonObject::new();
    for (key, value) in map {
        let clean = sanitize_key(key);
        let name = if clean == *key {
            clean
        } else {
            let name = free_name(&clean, &taken);
            taken.insert(name.clone());
            name
        };
        out.insert(name, sanitize(value));
    }
    out
}

fn free_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Add the top-level `_extracted_at` column
pub fn stamp(record: &mut JsonObject, at: NaiveDateTime) {
    record.insert(
        EXTRACTED_AT.to_string(),
        JsonValue::String(at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    );
}

/// Turn one source record into a warehouse row
///
/// Records that are not objects are kept under a single `value` column.
pub fn prepare_row(record: &JsonValue, at: NaiveDateTime) -> JsonObject {
    let mut row = match sanitize(record) {
        JsonValue::Object(map) => map,
        other => {
            let mut map = JsonObject::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    stamp(&mut row, at);
    row
}
