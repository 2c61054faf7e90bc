//! Dotted field paths such as `"contacts[1].email"`.

use serde_json::{Map, Value};
use tracing::warn;

/// Largest array index a write may create; writes past it are dropped.
const MAX_INDEX: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                segments.push(match inner.parse() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(inner),
                });
            }
            c => key.push(c),
        }
    }
    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    segments
}

/// Read the value at `path`.
pub(crate) fn get_in<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    parse(path).iter().try_fold(root, |node, segment| match segment {
        Segment::Key(key) => node.as_object()?.get(key),
        Segment::Index(index) => node.as_array()?.get(*index),
    })
}

/// Write the value at `path`, creating containers on the way.
///
/// `None` removes an object key, or clears an array slot to `null`.
pub(crate) fn set_in(root: &mut Value, path: &str, value: Option<Value>) {
    set_at(root, &parse(path), value);
}

fn set_at(node: &mut Value, segments: &[Segment], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match head {
        Segment::Key(key) => {
            if !node.is_object() {
                if value.is_none() {
                    return;
                }
                *node = Value::Object(Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return;
            };
            if rest.is_empty() {
                match value {
                    Some(value) => {
                        map.insert(key.clone(), value);
                    }
                    None => {
                        map.remove(key);
                    }
                }
                return;
            }
            if value.is_none() && !map.contains_key(key) {
                return;
            }
            set_at(map.entry(key.clone()).or_insert(Value::Null), rest, value);
        }
        Segment::Index(index) => {
            if !node.is_array() {
                if value.is_none() {
                    return;
                }
                *node = Value::Array(Vec::new());
            }
            let Some(items) = node.as_array_mut() else {
                return;
            };
            if items.len() <= *index {
                if value.is_none() {
                    return;
                }
                if *index > MAX_INDEX {
                    warn!(index = *index, "array index out of range; write dropped");
                    return;
                }
                items.resize(index + 1, Value::Null);
            }
            if rest.is_empty() {
                items[*index] = value.unwrap_or(Value::Null);
                return;
            }
            set_at(&mut items[*index], rest, value);
        }
    }
}
