//! Collision-free output column naming and column descriptions.

use crate::{Error, ErrorContext, Result};
use serde_json::Map;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Highest numeric suffix tried before giving up on a name.
pub const MAX_SUFFIX: usize = 1000;

/// Returns `name` if unused, else the first free `name_1`, `name_2`, … `name_1000`.
pub fn generate_unique<'a, I>(name: &str, existing: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = existing.into_iter().collect();
    unique_against(name, |candidate| taken.contains(candidate))
}

fn unique_against(name: &str, is_taken: impl Fn(&str) -> bool) -> Result<String> {
    if !is_taken(name) {
        return Ok(name.to_string());
    }
    for suffix in 1..=MAX_SUFFIX {
        let candidate = format!("{}_{}", name, suffix);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::configuration_with_context(
        format!("Failed to generate a unique column name for '{}'", name),
        ErrorContext::new()
            .with_field_path(name)
            .with_details(format!("{} suffixes already taken", MAX_SUFFIX))
            .with_source("column_registry"),
    ))
}

/// Maps logical column roles to physical column names for one formatter or parallelizer.
///
/// Names are resolved once against the schema the registry was created with. Every
/// resolved name is reserved, so two roles never end up with the same column.
#[derive(Debug, Clone)]
pub struct ColumnNameRegistry {
    prefix: String,
    taken: HashSet<String>,
    resolved: BTreeMap<String, String>,
}

impl ColumnNameRegistry {
    pub fn new<'a, I>(prefix: impl Into<String>, existing_columns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            prefix: prefix.into(),
            taken: existing_columns.into_iter().map(str::to_string).collect(),
            resolved: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Physical name for `role`, resolving it on first use.
    pub fn resolve(&mut self, role: &str) -> Result<String> {
        if let Some(name) = self.resolved.get(role) {
            return Ok(name.clone());
        }
        let desired = if self.prefix.is_empty() {
            role.to_string()
        } else {
            format!("{}_{}", self.prefix, role)
        };
        let name = unique_against(&desired, |c| self.taken.contains(c))?;
        self.taken.insert(name.clone());
        self.resolved.insert(role.to_string(), name.clone());
        Ok(name)
    }

    /// Previously resolved name, if any.
    pub fn get(&self, role: &str) -> Option<&str> {
        self.resolved.get(role).map(String::as_str)
    }
}

/// Names of the three columns the parallelizer adds to every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiColumnNames {
    pub response: String,
    pub error_message: String,
    pub error_type: String,
}

impl ApiColumnNames {
    pub fn resolve(registry: &mut ColumnNameRegistry) -> Result<Self> {
        Ok(Self {
            response: registry.resolve("response")?,
            error_message: registry.resolve("error_message")?,
            error_type: registry.resolve("error_type")?,
        })
    }

    /// Column names in output order.
    pub fn as_vec(&self) -> Vec<String> {
        vec![
            self.response.clone(),
            self.error_message.clone(),
            self.error_type.clone(),
        ]
    }

    pub fn contains(&self, column: &str) -> bool {
        column == self.response || column == self.error_message || column == self.error_type
    }
}

/// Output column name -> human-readable description. Insert-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptions {
    entries: Map<String, Value>,
}

impl ColumnDescriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a description unless the column already has one.
    pub fn add(&mut self, column: impl Into<String>, description: impl Into<String>) {
        self.entries
            .entry(column.into())
            .or_insert_with(|| Value::String(description.into()));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries.get(column).and_then(Value::as_str)
    }

    pub fn extend(&mut self, other: &ColumnDescriptions) {
        for (column, description) in &other.entries {
            if let Some(text) = description.as_str() {
                self.add(column.clone(), text);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_free_name() {
        let name = generate_unique("object_api_response", ["path", "size"]).unwrap();
        assert_eq!(name, "object_api_response");
    }

    #[test]
    fn test_generate_unique_appends_suffix() {
        let name = generate_unique(
            "object_api_response",
            ["object_api_response", "object_api_response_1"],
        )
        .unwrap();
        assert_eq!(name, "object_api_response_2");
    }

    #[test]
    fn test_generate_unique_survives_a_thousand_collisions() {
        let mut existing = vec!["api_response".to_string()];
        existing.extend((1..MAX_SUFFIX).map(|i| format!("api_response_{}", i)));
        assert_eq!(existing.len(), 1000);

        let name = generate_unique("api_response", existing.iter().map(String::as_str)).unwrap();
        assert_eq!(name, "api_response_1000");
        assert!(!existing.contains(&name));
    }

    #[test]
    fn test_generate_unique_fails_when_exhausted() {
        let mut existing = vec!["x".to_string()];
        existing.extend((1..=MAX_SUFFIX).map(|i| format!("x_{}", i)));
        let err = generate_unique("x", existing.iter().map(String::as_str)).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_registry_never_hands_out_the_same_name_twice() {
        // A role whose prefixed name collides with another role's suffixed name.
        let mut registry = ColumnNameRegistry::new("api", ["api_a"]);
        let a = registry.resolve("a").unwrap();
        let a_1 = registry.resolve("a_1").unwrap();
        assert_eq!(a, "api_a_1");
        assert_ne!(a, a_1);
        assert_eq!(a_1, "api_a_1_1");
        // Resolution is stable
        assert_eq!(registry.resolve("a").unwrap(), a);
        assert_eq!(registry.get("a_1"), Some(a_1.as_str()));
    }

    #[test]
    fn test_api_column_names_against_augmented_schema() {
        let mut registry = ColumnNameRegistry::new(
            "text_api",
            ["path", "text_api_response", "text_api_error_message", "text_api_error_type"],
        );
        let names = ApiColumnNames::resolve(&mut registry).unwrap();
        assert_eq!(names.response, "text_api_response_1");
        assert_eq!(names.error_message, "text_api_error_message_1");
        assert_eq!(names.error_type, "text_api_error_type_1");
    }

    #[test]
    fn test_column_descriptions_are_insert_only() {
        let mut d = ColumnDescriptions::new();
        d.add("a", "first");
        d.add("a", "second");
        d.add("b", "other");
        assert_eq!(d.get("a"), Some("first"));
        assert_eq!(d.len(), 2);
    }
}
