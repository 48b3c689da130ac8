//! Endpoint templates
//!
//! An endpoint template is an ARM path such as
//! `/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}` with
//! named placeholders. Templates match resource IDs and rebuild them from the
//! captured values.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Values captured by placeholders, keyed by placeholder name
pub type MatchValues = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Result of matching an ID against a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub is_match: bool,
    pub values: MatchValues,
}

impl MatchResult {
    fn no_match() -> Self {
        Self::default()
    }
}

/// A parsed endpoint path with an associated API version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    template: String,
    segments: Vec<Segment>,
    pub api_version: String,
}

impl EndpointTemplate {
    /// Parse a template path. Placeholder names must be unique and non-empty.
    pub fn parse(template: &str, api_version: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        for part in split_path(template) {
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    bail!("Empty placeholder in template {:?}", template);
                }
                if !seen.insert(name.to_string()) {
                    bail!("Duplicate placeholder {:?} in template {:?}", name, template);
                }
                segments.push(Segment::Placeholder(name.to_string()));
            } else if part.contains('{') || part.contains('}') {
                bail!("Malformed segment {:?} in template {:?}", part, template);
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments,
            api_version: api_version.to_string(),
        })
    }

    /// The template path as written
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in path order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a resource ID. Any query string is ignored and literal segments
    /// compare case-insensitively, as ARM IDs do.
    pub fn matches(&self, id: &str) -> MatchResult {
        let path = id.split('?').next().unwrap_or_default();
        let parts: Vec<&str> = split_path(path).collect();

        if parts.len() != self.segments.len() {
            return MatchResult::no_match();
        }

        let mut values = MatchValues::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if !literal.eq_ignore_ascii_case(part) {
                        return MatchResult::no_match();
                    }
                }
                Segment::Placeholder(name) => {
                    values.insert(name.clone(), part.to_string());
                }
            }
        }

        MatchResult {
            is_match: true,
            values,
        }
    }

    /// Rebuild an ID from captured values using the template's own casing
    pub fn build(&self, values: &MatchValues) -> Result<String> {
        let mut id = String::new();
        for segment in &self.segments {
            id.push('/');
            match segment {
                Segment::Literal(literal) => id.push_str(literal),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => id.push_str(value),
                    None => bail!("No value for {:?} building {:?}", name, self.template),
                },
            }
        }
        Ok(id)
    }
}

impl fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RG: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}";

    #[test]
    fn test_match_captures_values() {
        let template = EndpointTemplate::parse(RG, "").unwrap();
        let result = template.matches("/subscriptions/sub-1/resourceGroups/my-rg");
        assert!(result.is_match);
        assert_eq!(result.values["subscriptionId"], "sub-1");
        assert_eq!(result.values["resourceGroupName"], "my-rg");
    }

    #[test]
    fn test_match_is_case_insensitive_for_literals() {
        let template = EndpointTemplate::parse(RG, "").unwrap();
        let result = template.matches("/SUBSCRIPTIONS/sub-1/resourcegroups/My-RG");
        assert!(result.is_match);
        assert_eq!(result.values["resourceGroupName"], "My-RG");
        assert_eq!(
            template.build(&result.values).unwrap(),
            "/subscriptions/sub-1/resourceGroups/My-RG"
        );
    }

    #[test]
    fn test_segment_count_must_agree() {
        let template = EndpointTemplate::parse(RG, "").unwrap();
        assert!(!template.matches("/subscriptions/sub-1").is_match);
        assert!(!template.matches("/subscriptions/sub-1/resourceGroups/rg/extra").is_match);
    }

    #[test]
    fn test_query_string_is_ignored() {
        let template = EndpointTemplate::parse(RG, "").unwrap();
        assert!(template.matches("/subscriptions/s/resourceGroups/rg?api-version=2020-06-01").is_match);
    }

    #[test]
    fn test_parse_rejects_duplicate_placeholders() {
        assert!(EndpointTemplate::parse("/a/{x}/b/{x}", "").is_err());
        assert!(EndpointTemplate::parse("/a/{}", "").is_err());
        assert!(EndpointTemplate::parse("/a/b{x}", "").is_err());
    }

    #[test]
    fn test_build_requires_all_values() {
        let template = EndpointTemplate::parse(RG, "").unwrap();
        let mut values = MatchValues::new();
        values.insert("subscriptionId".to_string(), "s".to_string());
        assert!(template.build(&values).is_err());
    }

    #[test]
    fn test_placeholders_in_order() {
        let template = EndpointTemplate::parse(RG, "2021-04-01").unwrap();
        let names: Vec<&str> = template.placeholders().collect();
        assert_eq!(names, vec!["subscriptionId", "resourceGroupName"]);
        assert_eq!(template.api_version, "2021-04-01");
    }
}
