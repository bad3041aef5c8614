//! Dotted-path resolution: `$.a.b[i].c` into a JSON value (§4.1).
//!
//! Grounded on the teacher's `get_json_path` dot-split walker, extended
//! with numeric `[i]` array-index segments and "missing segment yields
//! unresolved" semantics instead of a hard error.

use serde_json::Value;

enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

fn parse_segments(path: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    for token in path.split('.') {
        if token.is_empty() {
            continue;
        }
        let mut rest = token;
        if let Some(bracket) = rest.find('[') {
            let (field, tail) = rest.split_at(bracket);
            if !field.is_empty() {
                segments.push(Segment::Field(field));
            }
            rest = tail;
            while let Some(stripped) = rest.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    if let Ok(idx) = stripped[..end].parse::<usize>() {
                        segments.push(Segment::Index(idx));
                    }
                    rest = &stripped[end + 1..];
                } else {
                    break;
                }
            }
        } else {
            segments.push(Segment::Field(rest));
        }
    }
    segments
}

/// Resolve a dotted path (without the leading `$.`) against a root JSON
/// value. Missing segments — and indexing into a non-array, or a field on a
/// non-object — yield `None` ("unresolved"), never an error (§4.1).
#[must_use]
pub fn resolve_path<'a>(path: &str, root: &'a Value) -> Option<&'a Value> {
    let mut current = root;
    for segment in parse_segments(path) {
        current = match segment {
            Segment::Field(name) => current.as_object().and_then(|m| m.get(name))?,
            Segment::Index(i) => current.as_array().and_then(|a| a.get(i))?,
        };
    }
    Some(current)
}
