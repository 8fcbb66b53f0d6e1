//! Per-manufacturer label tables and the resolver that maps raw labels onto
//! canonical field names.

use serde::Serialize;
use tracing::debug;

use crate::errors::KeyNotFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Numeric,
    Datetime,
    Timedelta,
    Time,
    Error,
}

/// How a table's aliases are compared against a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The label equals one alias.
    Exact,
    /// The label starts with one alias.
    Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub aliases: &'static [&'static str],
    pub value_type: ValueType,
    /// Canonical name of the companion field holding this field's unit.
    pub unit_field: Option<&'static str>,
}

impl FieldDefinition {
    pub const fn new(aliases: &'static [&'static str], value_type: ValueType) -> Self {
        Self {
            aliases,
            value_type,
            unit_field: None,
        }
    }

    pub const fn with_unit(mut self, unit_field: &'static str) -> Self {
        self.unit_field = Some(unit_field);
        self
    }

    fn matches(&self, label: &str, mode: MatchMode) -> bool {
        self.aliases.iter().any(|alias| match mode {
            MatchMode::Exact => label == *alias,
            MatchMode::Prefix => label.starts_with(alias),
        })
    }
}

/// An ordered, immutable mapping from canonical field name to its definition.
///
/// Readers take a [`working_copy`](DefinitionTable::working_copy) per file and
/// remove entries as they are consumed; the template itself is never mutated.
#[derive(Debug, Clone)]
pub struct DefinitionTable {
    mode: MatchMode,
    entries: Vec<(&'static str, FieldDefinition)>,
}

impl DefinitionTable {
    pub fn new(mode: MatchMode, entries: &[(&'static str, FieldDefinition)]) -> Self {
        Self {
            mode,
            entries: entries.to_vec(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, definition)| definition)
    }

    /// Every alias in table order, used by readers to recognise header rows.
    pub fn aliases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .flat_map(|(_, definition)| definition.aliases.iter().copied())
    }

    pub fn working_copy(&self) -> DefinitionTable {
        self.clone()
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldDefinition> {
        let position = self.entries.iter().position(|(name, _)| *name == key)?;
        Some(self.entries.remove(position).1)
    }

    /// Resolve `label` to a canonical name; the first matching entry wins.
    pub fn resolve(&self, label: &str) -> Result<&'static str, KeyNotFound> {
        let normalized = label.trim().to_lowercase();
        let found = self
            .entries
            .iter()
            .find(|(_, definition)| definition.matches(&normalized, self.mode))
            .map(|(name, _)| *name);

        match found {
            Some(name) => {
                debug!(label, canonical = name, "resolved label");
                Ok(name)
            }
            None => Err(KeyNotFound {
                label: label.to_string(),
            }),
        }
    }
}

pub fn resolve(label: &str, table: &DefinitionTable) -> Result<&'static str, KeyNotFound> {
    table.resolve(label)
}

/// Key under which an unrecognised label is stored verbatim.
pub fn sanitize_key(label: &str) -> String {
    label.trim().replace(' ', "_")
}
