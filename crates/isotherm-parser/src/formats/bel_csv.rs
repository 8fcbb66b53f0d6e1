use csv::StringRecord;

use crate::definitions::DefinitionTable;
use crate::diagnostics::Diagnostics;
use crate::errors::ParserError;
use crate::model::{Branch, Metadata, RawIsotherm};
use crate::options::ParseOptions;
use crate::registry::IsothermParser;
use crate::value::Value;

use super::bel_common::{finish_metadata, parse_data_header, METADATA_EXACT};
use super::common::{report_instrument_errors, store_unknown, typed_value, unit_value};
use super::TableBuilder;

/// Comma-separated export of BEL Japan (MicrotracBEL) instruments.
pub struct BelCsvParser;

impl Default for BelCsvParser {
    fn default() -> Self {
        Self
    }
}

impl BelCsvParser {
    const NAME: &'static str = "bel-csv";

    fn delimiter(options: &ParseOptions) -> Result<u8, ParserError> {
        let separator = options.separator_or(',');
        u8::try_from(separator)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ParserError::Validation {
                parser: Self::NAME,
                message: format!("separator '{separator}' is not a single ASCII character"),
            })
    }

    fn ensure_bel_csv(content: &str, separator: char) -> Result<(), ParserError> {
        let marker = format!("No{separator}");
        let mut lines = content.lines().map(|line| line.trim_start_matches('"'));
        let has_header = lines.any(|line| line.starts_with(&marker));
        let has_ads = lines.any(|line| line.trim().trim_matches('"').starts_with("ADS"));
        if has_header && has_ads {
            Ok(())
        } else {
            Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "no 'No' data header followed by an 'ADS' marker".to_string(),
            })
        }
    }

    fn line_of(record: &StringRecord) -> usize {
        record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or_default()
    }

    fn first_cell(record: &StringRecord) -> &str {
        record.get(0).map(str::trim).unwrap_or_default()
    }

    fn read_metadata_record(
        record: &StringRecord,
        metadata: &mut Metadata,
        working: &mut DefinitionTable,
        options: &ParseOptions,
        diagnostics: &mut Diagnostics,
    ) {
        let label = Self::first_cell(record);
        let value = record.get(1).unwrap_or_default();
        let unit = record
            .get(2)
            .map(|unit| unit.trim().trim_start_matches('[').trim_end_matches(']'));

        match working.resolve(&label.to_lowercase()) {
            Ok(key) => {
                let Some(definition) = working.remove(key) else {
                    return;
                };
                if let (Some(unit_field), Some(unit)) = (definition.unit_field, unit) {
                    if !unit.is_empty() {
                        metadata.insert(unit_field, unit_value(unit_field, unit));
                    }
                }
                metadata.insert(
                    key,
                    typed_value(value, definition.value_type, options, diagnostics),
                );
            }
            Err(_) => store_unknown(metadata, &label.to_lowercase(), value, unit),
        }
    }
}

impl IsothermParser for BelCsvParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<RawIsotherm, ParserError> {
        Self::ensure_bel_csv(content, options.separator_or(','))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(Self::delimiter(options)?)
            .from_reader(content.as_bytes());
        let mut records = reader.records();

        let mut metadata = Metadata::new();
        let mut diagnostics = Diagnostics::new();
        let mut working = METADATA_EXACT.working_copy();

        let header = loop {
            let record = records
                .next()
                .ok_or(ParserError::FormatMismatch {
                    parser: Self::NAME,
                    reason: "file missing data header row".to_string(),
                })?
                .map_err(|source| ParserError::Csv {
                    parser: Self::NAME,
                    source,
                })?;
            if Self::first_cell(&record) == "No" {
                break record;
            }
            if record.len() > 1 && !Self::first_cell(&record).is_empty() {
                Self::read_metadata_record(
                    &record,
                    &mut metadata,
                    &mut working,
                    options,
                    &mut diagnostics,
                );
            }
        };

        let cells: Vec<&str> = header.iter().collect();
        let header_info = parse_data_header(Self::NAME, &cells, &mut diagnostics)?;
        metadata.extend(header_info.units);
        let mut builder = TableBuilder::new(header_info.columns);

        let marker = records
            .next()
            .ok_or(ParserError::EmptyData { parser: Self::NAME })?
            .map_err(|source| ParserError::Csv {
                parser: Self::NAME,
                source,
            })?;
        if !Self::first_cell(&marker).starts_with("ADS") {
            return Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: Self::line_of(&marker),
                message: format!(
                    "expected 'ADS' after the data header, found '{}'",
                    Self::first_cell(&marker)
                ),
            });
        }

        let mut branch = Branch::Adsorption;
        for record in records {
            let record = record.map_err(|source| ParserError::Csv {
                parser: Self::NAME,
                source,
            })?;
            let first = Self::first_cell(&record);
            if first.starts_with("DES") {
                branch = Branch::Desorption;
                continue;
            }
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let cells: Vec<&str> = record.iter().collect();
            builder.push_row(Self::NAME, Self::line_of(&record), &cells, Some(branch), options)?;
        }

        let data = builder.finish(Self::NAME, &mut diagnostics)?;

        finish_metadata(&mut metadata);
        let material_missing = match metadata.get("material") {
            None | Some(Value::Null) => true,
            Some(Value::Str(text)) => text.is_empty(),
            Some(_) => false,
        };
        if material_missing {
            if let Some(file_name) = metadata.get("file_name").cloned() {
                metadata.insert("material", file_name);
            }
        }
        report_instrument_errors(&metadata, &mut diagnostics);

        Ok(RawIsotherm {
            metadata,
            data,
            diagnostics,
        })
    }
}
