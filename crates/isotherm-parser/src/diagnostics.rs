use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// Non-fatal anomaly noticed while reading a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    AmbiguousVolumeUnit { unit: String },
    EmptyColumn { column: String },
    DroppedColumn {
        column: String,
        found: usize,
        expected: usize,
    },
    VersionMismatch {
        found: Option<String>,
        expected: String,
    },
    InstrumentErrors { messages: Vec<String> },
    UnparsedDate { raw: String },
}

impl ParseWarning {
    fn is_informational(&self) -> bool {
        matches!(self, ParseWarning::EmptyColumn { .. })
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::AmbiguousVolumeUnit { unit } => write!(
                f,
                "loading unit '{unit}' is ambiguous: it can mean gas at STP, gas at isotherm \
                 temperature or liquid volume; assumed gas at isotherm temperature"
            ),
            ParseWarning::EmptyColumn { column } => write!(f, "no data collected for {column}"),
            ParseWarning::DroppedColumn {
                column,
                found,
                expected,
            } => write!(
                f,
                "dropped column '{column}' with {found} values (expected {expected})"
            ),
            ParseWarning::VersionMismatch { found, expected } => write!(
                f,
                "file version is {} while the parser uses version {expected}; \
                 double check the data",
                found.as_deref().unwrap_or("missing")
            ),
            ParseWarning::InstrumentErrors { messages } => {
                write!(f, "file contains instrument errors: {}", messages.join("; "))
            }
            ParseWarning::UnparsedDate { raw } => write!(f, "could not parse date '{raw}'"),
        }
    }
}

/// Per-parse warning sink. Every pushed warning is also logged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    warnings: Vec<ParseWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ParseWarning) {
        if warning.is_informational() {
            info!("{warning}");
        } else {
            warn!("{warning}");
        }
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
