//! Property filters applied to browsed jobs before migration.
//!
//! A filter is a set of `name=regex` rules. A job passes when, for every
//! configured name, the job carries that property and its value fully matches
//! **every** pattern registered for the name. Several patterns on the same name
//! therefore narrow the selection (AND), they are not alternatives; express
//! alternatives inside a single pattern (`type=invoice|receipt`).

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::record::ScheduledJobRecord;

#[derive(Debug, Clone)]
struct PropertyPattern {
    source: String,
    regex: Regex,
}

/// Immutable set of property rules, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    rules: BTreeMap<String, Vec<PropertyPattern>>,
}

impl PropertyFilter {
    /// Parses repeated `name=regex` entries. The first `=` separates the name
    /// from the pattern, so patterns may themselves contain `=`.
    pub fn parse<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for entry in entries {
            let entry = entry.as_ref();
            let (name, pattern) = entry
                .split_once('=')
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| ConfigError::MalformedFilter(entry.to_string()))?;
            filter.add(name, pattern)?;
        }
        Ok(filter)
    }

    /// Registers one more pattern for `name`. Matching is anchored at both ends.
    pub fn add(&mut self, name: &str, pattern: &str) -> Result<(), ConfigError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            ConfigError::InvalidPattern {
                property: name.to_string(),
                source,
            }
        })?;
        debug!(property = name, pattern, "Property filter registered");
        self.rules
            .entry(name.to_string())
            .or_default()
            .push(PropertyPattern {
                source: pattern.to_string(),
                regex,
            });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names with at least one registered pattern.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Returns true when the record satisfies every rule.
    pub fn passes(&self, record: &ScheduledJobRecord) -> bool {
        for (name, patterns) in &self.rules {
            let Some(value) = record.property(name) else {
                debug!(job_id = %record.id, property = %name, "Filtered out: property missing");
                return false;
            };
            for pattern in patterns {
                if !pattern.regex.is_match(value) {
                    debug!(
                        job_id = %record.id,
                        property = %name,
                        value,
                        pattern = %pattern.source,
                        "Filtered out: pattern mismatch"
                    );
                    return false;
                }
            }
        }
        true
    }
}
