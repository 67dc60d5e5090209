use std::fmt;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::RouterError;

/// Parameters captured from a matched path, in the order they appear in
/// the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(Vec<(String, String)>);

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the parameter `name`. With repeated names the last one wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for RouteParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A route pattern compiled to an anchored regular expression.
///
/// Literal text is matched exactly; every `:name` placeholder matches one
/// or more characters other than `/`.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, RouterError> {
        let mut expr = String::from("^");
        let mut param_names = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.char_indices().peekable();

        while let Some((at, c)) = chars.next() {
            if c == ':' {
                let start = at + 1;
                let name_len = pattern[start..]
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    .count();
                if name_len > 0 {
                    param_names.push(pattern[start..start + name_len].to_string());
                    expr.push_str(&regex::escape(&literal));
                    expr.push_str("([^/]+)");
                    literal.clear();
                    while chars.peek().is_some_and(|(i, _)| *i < start + name_len) {
                        chars.next();
                    }
                    continue;
                }
            }
            literal.push(c);
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            param_names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match `path`, binding capture groups to names by position.
    pub fn captures(&self, path: &str) -> Option<RouteParams> {
        let captures = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .field("param_names", &self.param_names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn static_patterns_match_exactly() {
        let pattern = PathPattern::compile("/clients").unwrap();
        assert!(pattern.is_match("/clients"));
        assert!(!pattern.is_match("/clients/"));
        assert!(!pattern.is_match("/clients/1"));
        assert!(!pattern.is_match("/x/clients"));
        assert!(pattern.param_names().is_empty());
    }

    #[test]
    fn params_bind_in_order() {
        let pattern = PathPattern::compile("/clients/:id/edit").unwrap();
        let params = pattern.captures("/clients/42/edit").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
        assert!(pattern.captures("/clients//edit").is_none());
        assert!(pattern.captures("/clients/4/2/edit").is_none());
    }

    #[test]
    fn consecutive_params() {
        let pattern = PathPattern::compile("/clients/:client_id/:vehicle").unwrap();
        let params = pattern.captures("/clients/7/abc-123").unwrap();
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("client_id", "7"), ("vehicle", "abc-123")]
        );
    }

    #[test]
    fn literal_regex_characters_are_escaped() {
        let pattern = PathPattern::compile("/reports/q1.pdf").unwrap();
        assert!(pattern.is_match("/reports/q1.pdf"));
        assert!(!pattern.is_match("/reports/q1xpdf"));
    }

    #[test]
    fn lone_colon_is_literal() {
        let pattern = PathPattern::compile("/a:/b").unwrap();
        assert!(pattern.is_match("/a:/b"));
        assert!(pattern.param_names().is_empty());
    }

    #[test]
    fn params_serialize_as_object() {
        let params: RouteParams = [("id", "42")].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({ "id": "42" })
        );
        assert_eq!(params.to_json(), serde_json::json!({ "id": "42" }));
    }

    proptest! {
        #[test]
        fn extracted_params_equal_segments(a in "[a-zA-Z0-9_-]{1,12}", b in "[a-zA-Z0-9_.-]{1,12}") {
            let pattern = PathPattern::compile("/invoices/:invoice/lines/:line").unwrap();
            let params = pattern.captures(&format!("/invoices/{a}/lines/{b}")).unwrap();
            prop_assert_eq!(params.get("invoice"), Some(a.as_str()));
            prop_assert_eq!(params.get("line"), Some(b.as_str()));
        }
    }
}
