use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ParserAttempt {
    pub parser: &'static str,
    pub message: String,
}

impl ParserAttempt {
    pub fn new(parser: &'static str, message: impl Into<String>) -> Self {
        Self {
            parser,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParserAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.parser, self.message)
    }
}

/// A label that no entry of a definition table recognises.
///
/// Recoverable: callers store the raw field verbatim under a sanitized key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no definition matches label '{label}'")]
pub struct KeyNotFound {
    pub label: String,
}

/// A raw value that none of the casting heuristics could type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not cast value '{raw}': {reason}")]
pub struct CastError {
    pub raw: String,
    pub reason: String,
}

impl CastError {
    pub(crate) fn new(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Which physical quantity a unit string was describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRole {
    Pressure,
    Loading,
    Material,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitRole::Pressure => "pressure",
            UnitRole::Loading => "loading",
            UnitRole::Material => "material",
        })
    }
}

/// Fatal for the file: a unit that cannot be classified makes the quantity unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("cannot understand {role} units in '{raw}'")]
    Parse { role: UnitRole, raw: String },

    #[error("unrecognized {role} unit '{unit}'")]
    Unrecognized { role: UnitRole, unit: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("required column '{column}' is missing")]
    MissingColumn { column: String },

    #[error("row {row} is tagged adsorption after desorption began at row {desorption_start}")]
    InterleavedBranch { row: usize, desorption_start: usize },
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{parser} format mismatch: {reason}")]
    FormatMismatch {
        parser: &'static str,
        reason: String,
    },

    #[error("{parser} header row {row_index} invalid: {message}")]
    InvalidHeader {
        parser: &'static str,
        row_index: usize,
        message: String,
    },

    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} data row {line_index} invalid: {message}")]
    DataRow {
        parser: &'static str,
        line_index: usize,
        message: String,
    },

    #[error("{parser} validation error: {message}")]
    Validation {
        parser: &'static str,
        message: String,
    },

    #[error("{parser} unit error: {source}")]
    Unit {
        parser: &'static str,
        #[source]
        source: UnitError,
    },

    #[error("{parser} schema error: {source}")]
    Schema {
        parser: &'static str,
        #[source]
        source: SchemaError,
    },

    #[error("{parser} file did not contain any data rows")]
    EmptyData { parser: &'static str },

    #[error("no parser named '{name}'")]
    UnknownParser { name: String },

    #[error("no parser recognized this file; attempts: {attempts:?}")]
    NoMatchingParser { attempts: Vec<ParserAttempt> },
}
