use once_cell::sync::Lazy;

use crate::definitions::{sanitize_key, DefinitionTable, FieldDefinition, MatchMode, ValueType};
use crate::diagnostics::{Diagnostics, ParseWarning};
use crate::errors::ParserError;
use crate::model::{Metadata, RawIsotherm};
use crate::options::ParseOptions;
use crate::registry::IsothermParser;
use crate::value::{cast, Value};

use super::common::normalize_date;
use super::TableBuilder;

/// Lowest `_parser_version` this reader understands without complaint.
pub const GENERIC_CSV_VERSION: f64 = 1.0;

const METADATA_FIELDS: &[(&str, FieldDefinition)] = &[
    (
        "adsorbate",
        FieldDefinition::new(&["_exptl_adsorptive"], ValueType::String),
    ),
    (
        "material",
        FieldDefinition::new(&["_adsnt_material_id"], ValueType::String),
    ),
    (
        "temperature",
        FieldDefinition::new(&["_exptl_temperature"], ValueType::Numeric),
    ),
    (
        "material_mass",
        FieldDefinition::new(&["_adsnt_sample_mass"], ValueType::Numeric),
    ),
    (
        "outgas_time",
        FieldDefinition::new(&["_adsnt_degas_time"], ValueType::String),
    ),
    (
        "outgas_temperature",
        FieldDefinition::new(&["_adsnt_degas_temperature"], ValueType::Numeric),
    ),
    (
        "temperature_unit",
        FieldDefinition::new(&["_units_temperature"], ValueType::String),
    ),
    (
        "pressure_unit",
        FieldDefinition::new(&["_units_pressure"], ValueType::String),
    ),
    (
        "material_unit",
        FieldDefinition::new(&["_units_mass"], ValueType::String),
    ),
    (
        "loading_unit",
        FieldDefinition::new(&["_units_loading"], ValueType::String),
    ),
    (
        "loading_basis",
        FieldDefinition::new(&["_basis_loading"], ValueType::String),
    ),
    (
        "material_basis",
        FieldDefinition::new(&["_basis_material"], ValueType::String),
    ),
    (
        "pressure_mode",
        FieldDefinition::new(&["_mode_pressure"], ValueType::String),
    ),
    (
        "date",
        FieldDefinition::new(&["_exptl_date"], ValueType::Datetime),
    ),
    (
        "operator",
        FieldDefinition::new(&["_exptl_operator"], ValueType::String),
    ),
    (
        "apparatus",
        FieldDefinition::new(&["_exptl_instrument"], ValueType::String),
    ),
];

static METADATA: Lazy<DefinitionTable> =
    Lazy::new(|| DefinitionTable::new(MatchMode::Exact, METADATA_FIELDS));

/// Plain `key,value` header followed by a `data` marker and a column table.
pub struct GenericCsvParser;

impl Default for GenericCsvParser {
    fn default() -> Self {
        Self
    }
}

impl GenericCsvParser {
    const NAME: &'static str = "generic-csv";

    fn ensure_generic_csv(content: &str, separator: char) -> Result<(), ParserError> {
        let mut lines = content.lines();
        if !lines.any(|line| line.starts_with("data")) {
            return Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "no 'data' section marker".to_string(),
            });
        }
        let header = lines.next().unwrap_or_default();
        let columns: Vec<&str> = header.split(separator).map(str::trim).collect();
        let has_pressure = columns
            .iter()
            .any(|column| *column == "pressure" || *column == "pressure_relative");
        if has_pressure && columns.contains(&"loading") {
            Ok(())
        } else {
            Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: format!("data header '{}' lacks pressure and loading", header.trim()),
            })
        }
    }

    fn metadata_value(
        key: &str,
        raw: &str,
        value_type: ValueType,
        diagnostics: &mut Diagnostics,
    ) -> Value {
        if value_type == ValueType::Datetime && !raw.trim().is_empty() {
            return normalize_date(raw, diagnostics);
        }
        cast(raw).unwrap_or_else(|err| {
            tracing::debug!(key, %err, "metadata value kept as text");
            Value::from(raw)
        })
    }

    fn check_version(metadata: &mut Metadata, diagnostics: &mut Diagnostics) {
        let found = metadata.remove("_parser_version").filter(|value| !value.is_null());
        let number = found.as_ref().and_then(|value| match value {
            Value::Str(text) => text.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        });
        if number.map_or(true, |version| version < GENERIC_CSV_VERSION) {
            diagnostics.push(ParseWarning::VersionMismatch {
                found: found.map(|value| value.to_string()),
                expected: format!("{GENERIC_CSV_VERSION:.1}"),
            });
        }
    }
}

impl IsothermParser for GenericCsvParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<RawIsotherm, ParserError> {
        let separator = options.separator_or(',');
        Self::ensure_generic_csv(content, separator)?;

        let mut metadata = Metadata::new();
        let mut diagnostics = Diagnostics::new();
        let mut working = METADATA.working_copy();
        let mut lines = content.lines().enumerate().map(|(idx, line)| (idx + 1, line));

        for (line_index, line) in lines.by_ref() {
            if line.starts_with("data") {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<&str> = line.trim().split(separator).collect();
            let [label, raw, ..] = values.as_slice() else {
                return Err(ParserError::DataRow {
                    parser: Self::NAME,
                    line_index,
                    message: format!("expected a key{separator}value pair, found '{line}'"),
                });
            };

            match working.resolve(label) {
                Ok(key) => {
                    let value_type = working
                        .remove(key)
                        .map_or(ValueType::String, |definition| definition.value_type);
                    metadata.insert(
                        key,
                        Self::metadata_value(key, raw, value_type, &mut diagnostics),
                    );
                }
                Err(_) if raw.is_empty() => {}
                Err(_) => {
                    metadata.insert(sanitize_key(label), *raw);
                }
            }
        }

        Self::check_version(&mut metadata, &mut diagnostics);

        let (header_index, header) = lines.next().ok_or(ParserError::InvalidHeader {
            parser: Self::NAME,
            row_index: 0,
            message: "missing data header row".to_string(),
        })?;
        let columns: Vec<String> = header
            .trim()
            .split(separator)
            .map(|column| column.trim().to_string())
            .collect();
        if columns.iter().any(String::is_empty) {
            return Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: header_index,
                message: format!("empty column name in '{}'", header.trim()),
            });
        }

        let mut builder = TableBuilder::new(columns);
        for (line_index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.trim().split(separator).map(str::trim).collect();
            builder.push_row(Self::NAME, line_index, &cells, None, options)?;
        }
        let data = builder.finish(Self::NAME, &mut diagnostics)?;

        Ok(RawIsotherm {
            metadata,
            data,
            diagnostics,
        })
    }
}
