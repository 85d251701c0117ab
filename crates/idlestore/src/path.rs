//! Dot-separated key paths into the state tree.
//!
//! `counter.value`, `items[0].name` and `items.0.name` are all valid. Paths
//! are parsed once into segments so reducers never re-split strings.

use crate::error::PathError;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Largest array index a path may address. Setting past the end pads with
/// `null`, so the bound also caps how far a single set can grow an array.
pub const MAX_INDEX: usize = 65_535;

fn array_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|index| *index <= MAX_INDEX)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Whether this segment addresses an array slot when creating containers.
    fn wants_array(&self) -> bool {
        match self {
            PathSegment::Index(_) => true,
            PathSegment::Key(key) => array_index(key).is_some(),
        }
    }
}

/// A parsed location in the state tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatePath {
    raw: String,
    segments: SmallVec<[PathSegment; 4]>,
}

impl StatePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = SmallVec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(raw.to_owned()));
            }

            let (key, mut rest) = match part.find('[') {
                Some(open) => (&part[..open], &part[open..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_owned()));
            }

            while !rest.is_empty() {
                let malformed = || PathError::MalformedIndex(raw.to_owned());
                let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
                let close = inner.find(']').ok_or_else(malformed)?;
                let index = array_index(&inner[..close]).ok_or_else(malformed)?;
                segments.push(PathSegment::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Value at this path, if every step exists.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match (segment, node) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key),
                (PathSegment::Key(key), Value::Array(items)) => {
                    key.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
                _ => None,
            })
    }

    /// Replace the value at this path, creating intermediate containers.
    ///
    /// A missing or scalar intermediate becomes an object, or an array when
    /// the segment indexing into it is numeric. Arrays are padded with
    /// `null` up to the target index.
    pub fn set(&self, root: &mut Value, value: Value) {
        let mut slot = root;
        for segment in &self.segments {
            slot = child_slot(slot, segment);
        }
        *slot = value;
    }
}

fn child_slot<'a>(node: &'a mut Value, segment: &PathSegment) -> &'a mut Value {
    match segment {
        PathSegment::Index(index) => array_slot(node, *index),
        PathSegment::Key(key) => {
            if !node.is_object() && segment.wants_array() {
                if let Some(index) = array_index(key) {
                    return array_slot(node, index);
                }
            }
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            // indexing an object by key inserts null when absent
            &mut node[key.as_str()]
        }
    }
}

fn array_slot(node: &mut Value, index: usize) -> &mut Value {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    if let Value::Array(items) = node {
        if items.len() <= index {
            items.resize(index + 1, Value::Null);
        }
    }
    &mut node[index]
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for StatePath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_bracketed() {
        let path = StatePath::parse("items[2].tags[0]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("items".into()),
                PathSegment::Index(2),
                PathSegment::Key("tags".into()),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(path.to_string(), "items[2].tags[0]");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(StatePath::parse(""), Err(PathError::Empty));
        assert_eq!(
            StatePath::parse("a..b"),
            Err(PathError::EmptySegment("a..b".into()))
        );
        assert_eq!(
            StatePath::parse("a[x]"),
            Err(PathError::MalformedIndex("a[x]".into()))
        );
        assert_eq!(
            StatePath::parse("a[1"),
            Err(PathError::MalformedIndex("a[1".into()))
        );
        assert_eq!(
            StatePath::parse("a[1]b"),
            Err(PathError::MalformedIndex("a[1]b".into()))
        );
    }

    #[test]
    fn test_index_above_bound_is_malformed() {
        let huge = format!("a[{}]", usize::MAX);
        let above = format!("a[{}]", MAX_INDEX + 1);

        assert_eq!(StatePath::parse(&huge), Err(PathError::MalformedIndex(huge.clone())));
        assert_eq!(StatePath::parse(&above), Err(PathError::MalformedIndex(above.clone())));
        assert!(StatePath::parse(&format!("a[{MAX_INDEX}]")).is_ok());
    }

    #[test]
    fn test_large_numeric_key_sets_object_field() {
        let mut state = json!({});
        let raw = format!("a.{}", usize::MAX);

        StatePath::parse(&raw).unwrap().set(&mut state, json!(1));

        assert_eq!(state["a"][usize::MAX.to_string()], json!(1));
    }

    #[test]
    fn test_get_walks_objects_and_arrays() {
        let state = json!({"items": [{"name": "a"}, {"name": "b"}]});

        let by_index: StatePath = "items[1].name".parse().unwrap();
        let by_key: StatePath = "items.0.name".parse().unwrap();
        let missing: StatePath = "items[5].name".parse().unwrap();

        assert_eq!(by_index.get(&state), Some(&json!("b")));
        assert_eq!(by_key.get(&state), Some(&json!("a")));
        assert_eq!(missing.get(&state), None);
    }

    #[test]
    fn test_set_existing_leaf() {
        let mut state = json!({"counter": {"value": 1, "step": 5}});
        StatePath::parse("counter.value").unwrap().set(&mut state, json!(2));
        assert_eq!(state, json!({"counter": {"value": 2, "step": 5}}));
    }

    #[test]
    fn test_set_creates_missing_containers() {
        let mut state = json!({});
        StatePath::parse("a.b[2]").unwrap().set(&mut state, json!(true));
        StatePath::parse("list.1").unwrap().set(&mut state, json!("x"));

        assert_eq!(
            state,
            json!({"a": {"b": [null, null, true]}, "list": [null, "x"]})
        );
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut state = json!({"a": 3});
        StatePath::parse("a.b").unwrap().set(&mut state, json!(1));
        assert_eq!(state, json!({"a": {"b": 1}}));
    }
}
