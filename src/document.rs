//! Flexible document values and the dotted-path setter.
//!
//! Query filters, options and write payloads are recorded as JSON documents.
//! Setters address them with dot-delimited paths such as `options.sort`.

use serde_json::{Map, Value};
use thiserror::Error;

/// String-keyed mapping of JSON values.
pub type Document = Map<String, Value>;

pub const QUERY: &str = "query";
pub const CHANGES: &str = "changes";
pub const OPTIONS: &str = "options";

pub const OPTION_SELECT: &str = "options.select";
pub const OPTION_EXPECT: &str = "options.expect";
pub const OPTION_SORT: &str = "options.sort";
pub const OPTION_SKIP: &str = "options.skip";
pub const OPTION_LIMIT: &str = "options.limit";

/// Options a fluent setter can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOption {
    Select,
    Expect,
    Sort,
    Skip,
    Limit,
}

impl QueryOption {
    pub const ALL: [QueryOption; 5] = [
        QueryOption::Select,
        QueryOption::Expect,
        QueryOption::Sort,
        QueryOption::Skip,
        QueryOption::Limit,
    ];

    /// Key inside the `options` mapping.
    pub fn key(self) -> &'static str {
        match self {
            QueryOption::Select => "select",
            QueryOption::Expect => "expect",
            QueryOption::Sort => "sort",
            QueryOption::Skip => "skip",
            QueryOption::Limit => "limit",
        }
    }

    /// Full dotted path from the descriptor root.
    pub fn path(self) -> &'static str {
        match self {
            QueryOption::Select => OPTION_SELECT,
            QueryOption::Expect => OPTION_EXPECT,
            QueryOption::Sort => OPTION_SORT,
            QueryOption::Skip => OPTION_SKIP,
            QueryOption::Limit => OPTION_LIMIT,
        }
    }
}

/// How a value lands at the end of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Shallow-merge keys into the mapping already at the path
    Merge(Document),
    /// Overwrite whatever is at the path
    Replace(Value),
}

impl SetValue {
    /// Merge a single `key: value` pair.
    pub fn entry(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut doc = Document::new();
        doc.insert(key.into(), value.into());
        SetValue::Merge(doc)
    }

    /// Merge mappings, replace everything else.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(entries) => SetValue::Merge(entries),
            other => SetValue::Replace(other),
        }
    }
}

/// Path could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPathError {
    #[error("empty segment in path {path:?}")]
    EmptySegment { path: String },

    #[error("path {path:?} crosses non-mapping value at {segment:?}")]
    NotAMapping { path: String, segment: String },

    #[error("path {path:?} does not start with query, options or changes")]
    UnknownSlot { path: String },
}

/// Split a dotted path, rejecting empty segments.
pub fn split_path(path: &str) -> Result<Vec<&str>, InvalidPathError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(InvalidPathError::EmptySegment {
            path: path.to_string(),
        });
    }
    Ok(segments)
}

/// Write `value` at `path` inside `doc`.
///
/// Missing intermediate levels are created as empty mappings. An
/// intermediate level that already holds a non-mapping is an error and
/// leaves `doc` untouched.
pub fn set_at_path(doc: &mut Document, path: &str, value: SetValue) -> Result<(), InvalidPathError> {
    let segments = split_path(path)?;
    set_segments(doc, path, &segments, value)
}

pub(crate) fn set_segments(
    doc: &mut Document,
    path: &str,
    segments: &[&str],
    value: SetValue,
) -> Result<(), InvalidPathError> {
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(InvalidPathError::EmptySegment {
            path: path.to_string(),
        });
    };

    // Check the whole walk first so a failed write has no side effects.
    let mut cursor: Option<&Document> = Some(doc);
    for segment in parents {
        cursor = match cursor.and_then(|d| d.get(*segment)) {
            None => None,
            Some(Value::Object(next)) => Some(next),
            Some(_) => {
                return Err(InvalidPathError::NotAMapping {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        };
    }

    let mut current = doc;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        current = slot
            .as_object_mut()
            .ok_or_else(|| InvalidPathError::NotAMapping {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
    }

    let slot = current.entry(leaf.to_string()).or_insert(Value::Null);
    apply(slot, value);
    Ok(())
}

/// Apply `value` to an existing slot.
///
/// Merging into anything other than a mapping replaces it with the mapping.
pub fn apply(slot: &mut Value, value: SetValue) {
    match value {
        SetValue::Merge(entries) => match slot {
            Value::Object(existing) => existing.extend(entries),
            _ => *slot = Value::Object(entries),
        },
        SetValue::Replace(v) => *slot = v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_creates_intermediate_levels() {
        let mut d = Document::new();
        set_at_path(&mut d, OPTION_SORT, SetValue::entry("_id", 1)).unwrap();
        assert_eq!(Value::Object(d), json!({"options": {"sort": {"_id": 1}}}));
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut d = doc(json!({"options": {"select": {"name": 1, "nested": {"a": 1}}}}));
        set_at_path(
            &mut d,
            OPTION_SELECT,
            SetValue::Merge(doc(json!({"email": 1, "nested": {"b": 2}}))),
        )
        .unwrap();
        assert_eq!(
            d["options"]["select"],
            json!({"name": 1, "email": 1, "nested": {"b": 2}})
        );
    }

    #[test]
    fn test_replace_overwrites() {
        let mut d = doc(json!({"options": {"skip": {"old": true}}}));
        set_at_path(&mut d, OPTION_SKIP, SetValue::Replace(json!(3))).unwrap();
        assert_eq!(d["options"]["skip"], json!(3));
    }

    #[test]
    fn test_merge_over_scalar_leaf_replaces() {
        let mut d = doc(json!({"query": 5}));
        set_at_path(&mut d, QUERY, SetValue::entry("_id", 7)).unwrap();
        assert_eq!(d["query"], json!({"_id": 7}));
    }

    #[test]
    fn test_non_mapping_intermediate_is_rejected() {
        let mut d = doc(json!({"options": {"select": 1}}));
        let before = d.clone();
        let err = set_at_path(&mut d, "options.select.name", SetValue::Replace(json!(1)))
            .unwrap_err();
        assert_eq!(
            err,
            InvalidPathError::NotAMapping {
                path: "options.select.name".to_string(),
                segment: "select".to_string(),
            }
        );
        assert_eq!(d, before);
    }

    #[test]
    fn test_failed_write_creates_nothing() {
        let mut d = doc(json!({"a": {"b": 1}}));
        let before = d.clone();
        assert!(set_at_path(&mut d, "a.b.c.d", SetValue::Replace(json!(1))).is_err());
        assert_eq!(d, before);
    }

    #[test]
    fn test_empty_segments() {
        let mut d = Document::new();
        for path in ["", "options..sort", ".sort", "options."] {
            assert!(matches!(
                set_at_path(&mut d, path, SetValue::Replace(json!(1))),
                Err(InvalidPathError::EmptySegment { .. })
            ));
        }
        assert!(d.is_empty());
    }

    #[test]
    fn test_from_value_picks_variant() {
        assert_eq!(
            SetValue::from_value(json!({"a": 1})),
            SetValue::Merge(doc(json!({"a": 1})))
        );
        assert_eq!(SetValue::from_value(json!([1])), SetValue::Replace(json!([1])));
    }

    #[test]
    fn test_option_paths_live_under_options() {
        for option in QueryOption::ALL {
            let segments = split_path(option.path()).unwrap();
            assert_eq!(segments, vec![OPTIONS, option.key()]);
        }
    }
}
