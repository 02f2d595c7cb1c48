//! Field-path sorting over serializable view models.
//!
//! A sort field arrives in the external snake_case naming (`metadata.creation_timestamp`)
//! and is mapped segment by segment onto the serialized field names of the view model.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A name that sorts below every DNS label.
pub const LOWEST_NAME: &str = "!";

/// Maps one external path segment to the view model's field name.
pub type FieldNameMapper = dyn Fn(&str) -> Option<String> + Send + Sync;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    #[error("expect struct when accessing '{0}'")]
    NotAStruct(String),

    #[error("unsupported field type for '{field}': {kind}")]
    UnsupportedFieldType { field: String, kind: &'static str },

    #[error("failed to serialize item for sorting: {0}")]
    Serialize(String),
}

/// A comparable scalar pulled out of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Time(DateTime<Utc>),
}

impl SortValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            SortValue::Int(v) => Some(*v as f64),
            SortValue::UInt(v) => Some(*v as f64),
            SortValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numbers of any width compare with each other; other mixed kinds order by kind.
    fn rank(&self) -> u8 {
        match self {
            SortValue::Null => 0,
            SortValue::Int(_) | SortValue::UInt(_) | SortValue::Float(_) => 1,
            SortValue::Bool(_) => 2,
            SortValue::Str(_) => 3,
            SortValue::Time(_) => 4,
        }
    }

    pub fn compare(&self, other: &SortValue) -> Ordering {
        use SortValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (UInt(a), UInt(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

/// Anything that can hand out a scalar at a dot path.
pub trait SortableByPath {
    fn value_at(&self, path: &[String]) -> Result<SortValue, SortError>;
}

impl<T: Serialize> SortableByPath for T {
    fn value_at(&self, path: &[String]) -> Result<SortValue, SortError> {
        let root = serde_json::to_value(self).map_err(|e| SortError::Serialize(e.to_string()))?;
        let mut current = &root;
        for segment in path {
            match current {
                Value::Object(map) => {
                    current = map
                        .get(segment)
                        .ok_or_else(|| SortError::FieldNotFound(segment.clone()))?;
                }
                Value::Null => return Ok(SortValue::Null),
                _ => return Err(SortError::NotAStruct(segment.clone())),
            }
        }
        to_sort_value(current, path.join("."))
    }
}

fn to_sort_value(value: &Value, field: String) -> Result<SortValue, SortError> {
    match value {
        Value::Null => Ok(SortValue::Null),
        Value::Bool(b) => Ok(SortValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SortValue::Int(i))
            } else if let Some(u) = n.as_u64() {
                Ok(SortValue::UInt(u))
            } else {
                Ok(SortValue::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Ok(SortValue::Time(t.with_timezone(&Utc))),
            Err(_) => Ok(SortValue::Str(s.clone())),
        },
        Value::Array(_) => Err(SortError::UnsupportedFieldType { field, kind: "array" }),
        Value::Object(_) => Err(SortError::UnsupportedFieldType { field, kind: "object" }),
    }
}

/// `creation_timestamp` -> `creationTimestamp`.
pub fn snake_to_camel(field: &str) -> Option<String> {
    if field.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(field.len());
    for (i, part) in field.split('_').filter(|p| !p.is_empty()).enumerate() {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    Some(out)
}

pub fn parse_field_path(field_path: &str, mapper: &FieldNameMapper) -> Vec<String> {
    field_path
        .split('.')
        .map(|part| mapper(part).unwrap_or_else(|| part.to_string()))
        .collect()
}

/// Sort `items` by the value at `field_path`. An empty path leaves the order unchanged.
pub fn sort_by_path<T: SortableByPath>(
    items: Vec<T>,
    field_path: &str,
    ascending: bool,
    mapper: &FieldNameMapper,
) -> Result<Vec<T>, SortError> {
    sort_by_path_keyed(items, field_path, ascending, mapper, |_, _, value| value)
}

/// Like [`sort_by_path`], but `key_of` may replace the value an item sorts by. It receives
/// the item, the mapped path and the value read from the item. The direction still applies
/// to the replaced key.
pub fn sort_by_path_keyed<T, F>(
    items: Vec<T>,
    field_path: &str,
    ascending: bool,
    mapper: &FieldNameMapper,
    key_of: F,
) -> Result<Vec<T>, SortError>
where
    T: SortableByPath,
    F: Fn(&T, &[String], SortValue) -> SortValue,
{
    if field_path.is_empty() || items.len() < 2 {
        return Ok(items);
    }

    let path = parse_field_path(field_path, mapper);
    let mut keyed = items
        .into_iter()
        .map(|item| {
            let value = item.value_at(&path)?;
            Ok((key_of(&item, &path, value), item))
        })
        .collect::<Result<Vec<_>, SortError>>()?;

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = a.compare(b);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });

    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use chrono::Duration;
    use serde::Serialize;

    #[derive(Serialize, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        create_time: DateTime<Utc>,
        tags: Vec<String>,
    }

    #[derive(Serialize, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    struct User {
        id: i64,
        name: String,
        profile: Profile,
    }

    fn user(id: i64, name: &str, offset_hours: i64) -> User {
        User {
            id,
            name: name.to_string(),
            profile: Profile {
                create_time: Utc::now() + Duration::hours(offset_hours),
                tags: vec![],
            },
        }
    }

    #[test]
    fn test_empty_field_keeps_order() {
        let users = vec![user(3, "c", 0), user(1, "a", 0), user(2, "b", 0)];
        let sorted = sort_by_path(users, "", true, &snake_to_camel).unwrap();
        let ids: Vec<i64> = sorted.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_nested_time_sort() {
        let users = vec![user(1, "a", 5), user(2, "b", 1), user(3, "c", 3)];
        let sorted = sort_by_path(users, "profile.create_time", true, &snake_to_camel).unwrap();
        let ids: Vec<i64> = sorted.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_descending_int() {
        let users = vec![user(1, "a", 0), user(3, "c", 0), user(2, "b", 0)];
        let sorted = sort_by_path(users, "id", false, &snake_to_camel).unwrap();
        let ids: Vec<i64> = sorted.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_static_mapping() {
        let mapping = HashMap::from([("user_name".to_string(), "name".to_string())]);
        let mapper = move |field: &str| mapping.get(field).cloned().or_else(|| snake_to_camel(field));
        let users = vec![user(1, "zed", 0), user(2, "amy", 0)];
        let sorted = sort_by_path(users, "user_name", true, &mapper).unwrap();
        assert_eq!(sorted[0].name, "amy");
    }

    #[test]
    fn test_unsupported_field_type() {
        let users = vec![user(1, "a", 0), user(2, "b", 0)];
        let err = sort_by_path(users, "profile.tags", true, &snake_to_camel).unwrap_err();
        assert!(matches!(err, SortError::UnsupportedFieldType { .. }));
    }

    #[test]
    fn test_missing_field() {
        let users = vec![user(1, "a", 0), user(2, "b", 0)];
        let err = sort_by_path(users, "profile.nope", true, &snake_to_camel).unwrap_err();
        assert!(matches!(err, SortError::FieldNotFound(_)));
    }

    #[test]
    fn test_replaced_key_follows_direction() {
        let users = vec![user(1, "alpha", 0), user(2, "local", 0), user(3, "zeta", 0)];
        let lowest = |u: &User, path: &[String], value: SortValue| {
            if path == ["name"] && u.name == "local" {
                SortValue::Str("!".into())
            } else {
                value
            }
        };

        let sorted = sort_by_path_keyed(users.clone(), "name", true, &snake_to_camel, lowest).unwrap();
        let names: Vec<&str> = sorted.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["local", "alpha", "zeta"]);

        let sorted = sort_by_path_keyed(users.clone(), "name", false, &snake_to_camel, lowest).unwrap();
        let names: Vec<&str> = sorted.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "local"]);

        // other fields sort the item like any other
        let sorted = sort_by_path_keyed(users, "id", false, &snake_to_camel, lowest).unwrap();
        let ids: Vec<i64> = sorted.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_mixed_kinds_order_by_kind() {
        let now = Utc::now();
        let forward = [SortValue::Str("b".into()), SortValue::Time(now), SortValue::Null, SortValue::Int(4)];
        let mut a = forward.to_vec();
        let mut b: Vec<SortValue> = forward.iter().rev().cloned().collect();
        a.sort_by(|x, y| x.compare(y));
        b.sort_by(|x, y| x.compare(y));
        assert_eq!(a, b);
        assert_eq!(a[0], SortValue::Null);
        assert_eq!(SortValue::Str("z".into()).compare(&SortValue::Time(now)), Ordering::Less);
        assert_eq!(SortValue::Time(now).compare(&SortValue::Str("z".into())), Ordering::Greater);
        assert_eq!(SortValue::Int(2).compare(&SortValue::Float(1.5)), Ordering::Greater);
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("creation_timestamp").as_deref(), Some("creationTimestamp"));
        assert_eq!(snake_to_camel("name").as_deref(), Some("name"));
        assert_eq!(snake_to_camel("gpu_memory_total").as_deref(), Some("gpuMemoryTotal"));
        assert_eq!(snake_to_camel(""), None);
    }
}
