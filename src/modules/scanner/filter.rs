//! Field filter over decoded event values

use std::collections::BTreeMap;

use crate::core::{Error, Result};

/// Conjunction of case-insensitive equality checks, e.g. `from=0xabc,to=0xdef`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    clauses: Vec<(String, String)>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Parse `field=value` pairs separated by commas
    pub fn parse(input: &str) -> Result<Self> {
        let mut filter = Self::new();
        for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((field, value)) = pair.split_once('=') else {
                return Err(Error::InvalidInput(format!(
                    "filter clause must be field=value: {}",
                    pair
                )));
            };
            let (field, value) = (field.trim(), value.trim());
            if field.is_empty() {
                return Err(Error::InvalidInput(format!("filter clause has no field: {}", pair)));
            }
            filter = filter.with(field, value);
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Every clause must name a present field with an equal value
    pub fn matches(&self, values: &BTreeMap<String, String>) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            let actual = values.get(field).or_else(|| {
                values
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(field))
                    .map(|(_, value)| value)
            });
            actual.is_some_and(|actual| actual.eq_ignore_ascii_case(expected))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("from".to_string(), "0xAbCd000000000000000000000000000000000001".to_string()),
            ("value".to_string(), "1.5".to_string()),
        ])
    }

    #[test]
    fn test_matches_case_insensitive() {
        let filter = FieldFilter::new().with("from", "0xabcd000000000000000000000000000000000001");
        assert!(filter.matches(&values()));
        assert!(FieldFilter::new().with("FROM", "0xABCD000000000000000000000000000000000001").matches(&values()));
    }

    #[test]
    fn test_conjunction_and_missing_field() {
        let filter = FieldFilter::parse("value=1.5, from=0xabcd000000000000000000000000000000000001").unwrap();
        assert!(filter.matches(&values()));

        let filter = FieldFilter::parse("value=2").unwrap();
        assert!(!filter.matches(&values()));

        let filter = FieldFilter::parse("to=0x1").unwrap();
        assert!(!filter.matches(&values()));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FieldFilter::parse("").unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches(&BTreeMap::new()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(FieldFilter::parse("from").is_err());
        assert!(FieldFilter::parse("=0x1").is_err());
    }
}
