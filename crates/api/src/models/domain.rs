use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name of one secondary index ("class.names", "method.names", ...).
///
/// The derived ordering is lexicographic on the name and is the global lock
/// order for multi-domain writes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexDomain(Cow<'static, str>);

impl IndexDomain {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe form used for the durable per-domain file.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for IndexDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IndexDomain {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for IndexDomain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_lexicographic() {
        let mut domains = vec![
            IndexDomain::from("method.names"),
            IndexDomain::from_static("class.names"),
            IndexDomain::from("field.names"),
        ];
        domains.sort();
        let names: Vec<_> = domains.iter().map(|d| d.as_str()).collect();
        assert_eq!(names, vec!["class.names", "field.names", "method.names"]);
    }

    #[test]
    fn test_file_stem_is_sanitized() {
        assert_eq!(IndexDomain::from("java/class names").file_stem(), "java_class_names");
    }
}
