use std::fmt;
use std::ops::Range;

use polars::prelude::*;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::diagnostics::{Diagnostics, ParseWarning};
use crate::errors::SchemaError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Branch {
    Adsorption = 0,
    Desorption = 1,
}

impl Branch {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Adsorption => "ads",
            Branch::Desorption => "des",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Branch {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ads" | "adsorption" | "0" => Ok(Branch::Adsorption),
            "des" | "desorption" | "1" => Ok(Branch::Desorption),
            other => Err(format!("unknown branch '{other}'")),
        }
    }
}

/// Experiment metadata in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, Value)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn extend(&mut self, other: Metadata) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Named float columns plus an optional branch tag per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<(String, Vec<f64>)>,
    branch: Option<Vec<Branch>>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = values,
            None => self.columns.push((name, values)),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert_column(name, values);
        self
    }

    pub fn with_branch(mut self, branch: Vec<Branch>) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        let position = self.columns.iter().position(|(existing, _)| existing == name)?;
        Some(self.columns.remove(position).1)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|(existing, _)| existing == from) {
            Some((name, _)) => {
                *name = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn branch(&self) -> Option<&[Branch]> {
        self.branch.as_deref()
    }

    pub fn set_branch(&mut self, branch: Vec<Branch>) {
        self.branch = Some(branch);
    }

    pub fn take_branch(&mut self) -> Option<Vec<Branch>> {
        self.branch.take()
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .first()
            .map(|(_, values)| values.len())
            .or_else(|| self.branch.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Check every column (and the branch tags) share one length.
    pub fn validate_lengths(&self) -> Result<usize, SchemaError> {
        let expected = self.row_count();
        for (name, values) in &self.columns {
            if values.len() != expected {
                return Err(SchemaError::LengthMismatch {
                    column: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
        }
        if let Some(branch) = &self.branch {
            if branch.len() != expected {
                return Err(SchemaError::LengthMismatch {
                    column: "branch".to_string(),
                    expected,
                    found: branch.len(),
                });
            }
        }
        Ok(expected)
    }

    /// Remove every column whose length differs from `reference`.
    ///
    /// Used by formats that tolerate ragged optional columns. Columns are
    /// never truncated to fit.
    pub fn drop_ragged(&mut self, reference: &str) -> Result<Vec<ParseWarning>, SchemaError> {
        let expected = self
            .column(reference)
            .map(<[f64]>::len)
            .ok_or_else(|| SchemaError::MissingColumn {
                column: reference.to_string(),
            })?;

        let mut dropped = Vec::new();
        self.columns.retain(|(name, values)| {
            if values.len() == expected {
                true
            } else {
                dropped.push(ParseWarning::DroppedColumn {
                    column: name.clone(),
                    found: values.len(),
                    expected,
                });
                false
            }
        });
        if self
            .branch
            .as_ref()
            .is_some_and(|branch| branch.len() != expected)
        {
            let found = self.branch.take().map(|branch| branch.len()).unwrap_or(0);
            dropped.push(ParseWarning::DroppedColumn {
                column: "branch".to_string(),
                found,
                expected,
            });
        }
        Ok(dropped)
    }

    pub fn slice(&self, range: Range<usize>) -> DataTable {
        DataTable {
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[range.clone()].to_vec()))
                .collect(),
            branch: self
                .branch
                .as_ref()
                .map(|branch| branch[range.clone()].to_vec()),
        }
    }

    /// Rows `[0, index)` and `[index, len)`; `index` is clamped to the row count.
    pub fn split_at(&self, index: usize) -> (DataTable, DataTable) {
        let rows = self.row_count();
        let index = index.min(rows);
        (self.slice(0..index), self.slice(index..rows))
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|(name, values)| Series::new(name.as_str().into(), values.as_slice()).into())
            .collect();
        if let Some(branch) = &self.branch {
            let tags: Vec<u8> = branch.iter().map(Branch::as_u8).collect();
            columns.push(Series::new("branch".into(), tags).into());
        }
        DataFrame::new(columns)
    }
}

impl Serialize for DataTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.columns.len() + usize::from(self.branch.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        if let Some(branch) = &self.branch {
            let tags: Vec<u8> = branch.iter().map(Branch::as_u8).collect();
            map.serialize_entry("branch", &tags)?;
        }
        map.end()
    }
}

/// What a vendor reader hands to the assembly step.
#[derive(Debug, Clone, Default)]
pub struct RawIsotherm {
    pub metadata: Metadata,
    pub data: DataTable,
    pub diagnostics: Diagnostics,
}

/// Column arrangement chosen for the output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `pressure`, `p0`, `amount`
    WithSaturation,
    /// `pressure`, `amount`
    PressureOnly,
}

impl OutputLayout {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            OutputLayout::WithSaturation => &["pressure", "p0", "amount"],
            OutputLayout::PressureOnly => &["pressure", "amount"],
        }
    }
}

/// Normalised isotherm ready for an interchange writer.
#[derive(Debug, Clone)]
pub struct IsothermRecord {
    pub metadata: Metadata,
    pub adsorption: DataTable,
    pub desorption: DataTable,
    pub layout: OutputLayout,
    pub diagnostics: Diagnostics,
}

impl Serialize for IsothermRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("IsothermRecord", 5)?;
        state.serialize_field("metadata", &self.metadata)?;
        state.serialize_field("adsorption", &self.adsorption)?;
        state.serialize_field("desorption", &self.desorption)?;
        state.serialize_field("layout", &self.layout)?;
        state.serialize_field("warnings", &self.diagnostics)?;
        state.end()
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("JSON operation failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl IsothermRecord {
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parquet bytes for the adsorption table and, when it has rows, the
    /// desorption table.
    pub fn to_parquet(&self) -> Result<(Vec<u8>, Option<Vec<u8>>), ExportError> {
        let adsorption = table_to_parquet(&self.adsorption)?;
        let desorption = if self.desorption.is_empty() {
            None
        } else {
            Some(table_to_parquet(&self.desorption)?)
        };
        Ok((adsorption, desorption))
    }
}

fn table_to_parquet(table: &DataTable) -> Result<Vec<u8>, ExportError> {
    let mut df = table.to_dataframe()?;
    let mut bytes = Vec::new();
    ParquetWriter::new(&mut bytes).finish(&mut df)?;
    Ok(bytes)
}
