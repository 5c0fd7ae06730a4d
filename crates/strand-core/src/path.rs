//! Binding path syntax: `segment(.segment)*(?key=value(&key=value)*)?`.
//!
//! A path describes how to derive a child variable's value from its parent.
//! Segments navigate either the variable tree (`..`) or the resolved object
//! graph (everything else).

use std::fmt;

use thiserror::Error;

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `name` — property lookup.
    Property(String),
    /// `name()` — zero-arg method call.
    Method(String),
    /// `N` — 1-based array index.
    Index(u64),
    /// `..` — parent traversal (navigates the variable tree).
    Parent,
    /// `@name` — standard variable; only valid as the first segment.
    Standard(String),
}

/// A fully parsed path: its segments plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    pub segments: Vec<Segment>,
    /// Preserves encounter order so `render` round-trips byte-for-byte.
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("'@' standard-variable segment only valid as the first segment: {0:?}")]
    StandardNotFirst(String),
    #[error("empty segment in path {0:?}")]
    EmptySegment(String),
    #[error("index segment has a leading zero: {0:?}")]
    LeadingZeroIndex(String),
    #[error("malformed query string: {0:?}")]
    BadQuery(String),
    #[error("malformed method segment: {0:?}")]
    BadMethod(String),
}

impl Path {
    pub fn parse(raw: &str) -> Result<Path, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let (body, query) = match raw.split_once('?') {
            Some((b, q)) => (b, Some(q)),
            None => (raw, None),
        };

        if body.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for (i, piece) in body.split('.').enumerate() {
            if piece.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            let segment = parse_segment(piece, raw)?;
            if matches!(segment, Segment::Standard(_)) && i != 0 {
                return Err(PathError::StandardNotFirst(raw.to_string()));
            }
            segments.push(segment);
        }

        let params = match query {
            Some(q) if q.is_empty() => Vec::new(),
            Some(q) => parse_query(q, raw)?,
            None => Vec::new(),
        };

        Ok(Path { segments, params })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            render_segment(seg, &mut out);
        }
        if !self.params.is_empty() {
            out.push('?');
            for (i, (k, v)) in self.params.iter().enumerate() {
                if i > 0 {
                    out.push('&');
                }
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_segment(piece: &str, raw: &str) -> Result<Segment, PathError> {
    if piece == ".." {
        return Ok(Segment::Parent);
    }
    if let Some(name) = piece.strip_prefix('@') {
        if name.is_empty() {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        return Ok(Segment::Standard(name.to_string()));
    }
    if let Some(name) = piece.strip_suffix("()") {
        if name.is_empty() || name.contains('(') || name.contains(')') {
            return Err(PathError::BadMethod(raw.to_string()));
        }
        return Ok(Segment::Method(name.to_string()));
    }
    if piece.chars().all(|c| c.is_ascii_digit()) {
        if piece.len() > 1 && piece.starts_with('0') {
            return Err(PathError::LeadingZeroIndex(raw.to_string()));
        }
        let n: u64 = piece
            .parse()
            .map_err(|_| PathError::LeadingZeroIndex(raw.to_string()))?;
        if n == 0 {
            return Err(PathError::LeadingZeroIndex(raw.to_string()));
        }
        return Ok(Segment::Index(n));
    }
    Ok(Segment::Property(piece.to_string()))
}

fn render_segment(seg: &Segment, out: &mut String) {
    match seg {
        Segment::Property(name) => out.push_str(name),
        Segment::Method(name) => {
            out.push_str(name);
            out.push_str("()");
        }
        Segment::Index(n) => out.push_str(&n.to_string()),
        Segment::Parent => out.push_str(".."),
        Segment::Standard(name) => {
            out.push('@');
            out.push_str(name);
        }
    }
}

fn parse_query(q: &str, raw: &str) -> Result<Vec<(String, String)>, PathError> {
    let mut params = Vec::new();
    for pair in q.split('&') {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| PathError::BadQuery(raw.to_string()))?;
        if k.is_empty() {
            return Err(PathError::BadQuery(raw.to_string()));
        }
        params.push((k.to_string(), v.to_string()));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_property_chain() {
        let p = Path::parse("a.b.c").unwrap();
        assert_eq!(
            p.segments,
            vec![
                Segment::Property("a".into()),
                Segment::Property("b".into()),
                Segment::Property("c".into()),
            ]
        );
    }

    #[test]
    fn parses_index_and_method_and_parent() {
        let p = Path::parse("contacts.2.name().." ).unwrap();
        assert_eq!(
            p.segments,
            vec![
                Segment::Property("contacts".into()),
                Segment::Index(2),
                Segment::Method("name".into()),
                Segment::Parent,
            ]
        );
    }

    #[test]
    fn parses_standard_variable_segment() {
        let p = Path::parse("@selected").unwrap();
        assert_eq!(p.segments, vec![Segment::Standard("selected".into())]);
    }

    #[test]
    fn standard_only_valid_first() {
        assert!(matches!(
            Path::parse("a.@selected"),
            Err(PathError::StandardNotFirst(_))
        ));
    }

    #[test]
    fn leading_zero_index_rejected() {
        assert!(matches!(
            Path::parse("a.02"),
            Err(PathError::LeadingZeroIndex(_))
        ));
    }

    #[test]
    fn parses_query_params_in_order() {
        let p = Path::parse("contacts?item=ContactPresenter&sort=name").unwrap();
        assert_eq!(
            p.params,
            vec![
                ("item".to_string(), "ContactPresenter".to_string()),
                ("sort".to_string(), "name".to_string()),
            ]
        );
    }

    #[test]
    fn round_trips_through_render() {
        for raw in [
            "a.b.2.m()?k=v",
            "contacts.1.name",
            "..",
            "@root",
            "contacts?item=X&sort=name&dir=asc",
        ] {
            let p = Path::parse(raw).unwrap();
            assert_eq!(p.render(), raw, "round trip failed for {raw:?}");
        }
    }

    #[test]
    fn empty_path_errors() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
    }
}
