use crate::definitions::DefinitionTable;
use crate::diagnostics::Diagnostics;
use crate::errors::ParserError;
use crate::model::{Branch, Metadata, RawIsotherm};
use crate::options::ParseOptions;
use crate::registry::IsothermParser;

use super::bel_common::{finish_metadata, parse_data_header, DataHeader, METADATA_PREFIX};
use super::common::{report_instrument_errors, store_unknown, typed_value, unit_value};
use super::TableBuilder;

/// Tab-separated `.DAT` export of BEL Japan (MicrotracBEL) instruments.
pub struct BelDatParser;

impl Default for BelDatParser {
    fn default() -> Self {
        Self
    }
}

impl BelDatParser {
    const NAME: &'static str = "bel-dat";

    fn section_title(line: &str) -> Option<Branch> {
        let title = line.trim().trim_matches('"').to_lowercase();
        if title.starts_with("adsorption data") {
            Some(Branch::Adsorption)
        } else if title.starts_with("desorption data") {
            Some(Branch::Desorption)
        } else {
            None
        }
    }

    fn ensure_bel_dat(content: &str) -> Result<(), ParserError> {
        let has_section = content
            .lines()
            .any(|line| Self::section_title(line) == Some(Branch::Adsorption));
        if has_section {
            Ok(())
        } else {
            Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "no 'Adsorption data' section".to_string(),
            })
        }
    }

    fn skip_rule<'a>(
        lines: &mut impl Iterator<Item = (usize, &'a str)>,
    ) -> Result<(), ParserError> {
        match lines.next() {
            Some((_, line)) if line.trim_start().starts_with('=') => Ok(()),
            Some((row_index, line)) => Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index,
                message: format!("expected a '====' rule, found '{}'", line.trim()),
            }),
            None => Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: 0,
                message: "file ends before the section rule".to_string(),
            }),
        }
    }

    fn read_metadata_line(
        text: &str,
        value: &str,
        metadata: &mut Metadata,
        working: &mut DefinitionTable,
        options: &ParseOptions,
        diagnostics: &mut Diagnostics,
    ) {
        let text = text.trim().trim_matches('"');
        let value = value.trim().trim_matches('"');
        let value = if options.decimal_comma {
            value.to_string()
        } else {
            value.replace(',', " ")
        };

        let label = text.to_lowercase();
        match working.resolve(&label) {
            Ok(key) => {
                let Some(definition) = working.remove(key) else {
                    return;
                };
                if let (Some(unit_field), Some((_, unit))) =
                    (definition.unit_field, text.split_once('/'))
                {
                    metadata.insert(unit_field, unit_value(unit_field, unit));
                }
                metadata.insert(
                    key,
                    typed_value(&value, definition.value_type, options, diagnostics),
                );
            }
            Err(_) => match text.split_once('/') {
                Some((name, unit)) if !unit.contains('/') => {
                    store_unknown(metadata, &name.to_lowercase(), &value, Some(unit))
                }
                _ => store_unknown(metadata, &label, &value, None),
            },
        }
    }
}

impl IsothermParser for BelDatParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<RawIsotherm, ParserError> {
        Self::ensure_bel_dat(content)?;

        let separator = options.separator_or('\t');
        let mut metadata = Metadata::new();
        let mut diagnostics = Diagnostics::new();
        let mut working = METADATA_PREFIX.working_copy();
        let mut builder: Option<TableBuilder> = None;
        let mut lines = content.lines().enumerate().map(|(idx, line)| (idx + 1, line));

        while let Some((line_index, line)) = lines.next() {
            let values: Vec<&str> = line.trim().split(separator).collect();
            match values.as_slice() {
                [text, value] => Self::read_metadata_line(
                    text,
                    value,
                    &mut metadata,
                    &mut working,
                    options,
                    &mut diagnostics,
                ),
                [title] => {
                    let Some(branch) = Self::section_title(title) else {
                        continue;
                    };
                    Self::skip_rule(&mut lines)?;
                    let (header_index, header_line) =
                        lines.next().ok_or(ParserError::InvalidHeader {
                            parser: Self::NAME,
                            row_index: line_index,
                            message: "section has no header row".to_string(),
                        })?;
                    if builder.is_none() {
                        let cells: Vec<&str> = header_line.trim_end().split(separator).collect();
                        let DataHeader { columns, units } =
                            parse_data_header(Self::NAME, &cells, &mut diagnostics)?;
                        if columns.is_empty() {
                            return Err(ParserError::InvalidHeader {
                                parser: Self::NAME,
                                row_index: header_index,
                                message: "data header names no columns".to_string(),
                            });
                        }
                        metadata.extend(units);
                        builder = Some(TableBuilder::new(columns));
                    }
                    let Some(table) = builder.as_mut() else {
                        continue;
                    };

                    for (row_index, row) in lines.by_ref() {
                        if row.starts_with('0') {
                            break;
                        }
                        let cells: Vec<&str> = row.split_whitespace().collect();
                        if cells.is_empty() {
                            continue;
                        }
                        table.push_row(Self::NAME, row_index, &cells, Some(branch), options)?;
                    }
                }
                _ => {
                    return Err(ParserError::DataRow {
                        parser: Self::NAME,
                        line_index,
                        message: format!("unknown line format: '{}'", line.trim()),
                    })
                }
            }
        }

        let data = builder
            .ok_or(ParserError::EmptyData { parser: Self::NAME })?
            .finish(Self::NAME, &mut diagnostics)?;

        finish_metadata(&mut metadata);
        report_instrument_errors(&metadata, &mut diagnostics);

        Ok(RawIsotherm {
            metadata,
            data,
            diagnostics,
        })
    }
}
