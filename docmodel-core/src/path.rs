//! Field paths used to report where inside a document a value failed validation.

use std::fmt;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A keyed step, rendered as `.key`.
    Key(String),
    /// An array position, rendered as `[index]`.
    Index(usize),
}

/// The location of a value relative to the document root.
///
/// Rendered with dots between keys and brackets around array indices:
///
/// ```ignore
/// let path = FieldPath::root().key("items").index(2).key("amount");
/// assert_eq!(path.to_string(), "items[2].amount");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path, pointing at the document itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path extended by a key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Returns a new path extended by an array index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Parses the rendered form back into segments.
    ///
    /// Dots separate keys and `[n]` suffixes become index segments, so
    /// `"items[2].amount"` yields `Key("items"), Index(2), Key("amount")`.
    /// A bracket whose content is not a number is kept as part of the key.
    pub fn parse(rendered: &str) -> Self {
        let mut segments = Vec::new();

        for part in rendered.split('.').filter(|part| !part.is_empty()) {
            let (key, mut rest) = match part.find('[') {
                Some(at) => part.split_at(at),
                None => (part, ""),
            };
            let mut indices = Vec::new();

            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else { break };
                let Ok(index) = stripped[..end].parse::<usize>() else { break };
                indices.push(index);
                rest = &stripped[end + 1..];
            }

            if !rest.is_empty() {
                segments.push(PathSegment::Key(part.to_string()));
                continue;
            }
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            segments.extend(indices.into_iter().map(PathSegment::Index));
        }

        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }

        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(rendered: &str) -> Self {
        FieldPath::parse(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_keys_with_dots_and_indices_with_brackets() {
        let path = FieldPath::root().key("items").index(2).key("amount");
        assert_eq!(path.to_string(), "items[2].amount");
    }

    #[test]
    fn root_renders_empty() {
        assert_eq!(FieldPath::root().to_string(), "");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn leading_index_has_no_dot() {
        let path = FieldPath::root().index(0).key("name");
        assert_eq!(path.to_string(), "[0].name");
    }

    #[test]
    fn parse_inverts_display() {
        let path = FieldPath::parse("names.data.items[0][3].val");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("names".into()),
                PathSegment::Key("data".into()),
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Index(3),
                PathSegment::Key("val".into()),
            ]
        );
        assert_eq!(path.to_string(), "names.data.items[0][3].val");
    }

    #[test]
    fn parse_keeps_non_numeric_brackets_in_key() {
        let path = FieldPath::parse("tags[x]");
        assert_eq!(path.segments(), &[PathSegment::Key("tags[x]".into())]);
    }
}
