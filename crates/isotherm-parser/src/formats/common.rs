use chrono::{NaiveDate, NaiveDateTime};

use crate::definitions::{sanitize_key, ValueType};
use crate::diagnostics::{Diagnostics, ParseWarning};
use crate::errors::{ParserError, SchemaError};
use crate::model::{Branch, DataTable, Metadata};
use crate::options::ParseOptions;
use crate::units::parse_temperature_unit;
use crate::value::{cast_numeric, split_number_unit, Value};

pub(crate) fn parse_data_value(
    parser: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
    decimal_comma: bool,
) -> Result<f64, ParserError> {
    let trimmed = value.trim().trim_matches('"');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    let normalized = if decimal_comma {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized
        .parse::<f64>()
        .map_err(|err| ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        })
}

/// Accumulates numeric data rows column by column.
///
/// A blank cell is read as NaN. A row with fewer cells than the header
/// leaves the trailing columns short; such ragged columns are dropped when
/// the table is built.
pub(crate) struct TableBuilder {
    columns: Vec<(String, Vec<f64>)>,
    branch_column: Option<usize>,
    branch: Vec<Branch>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(names: Vec<String>) -> Self {
        let branch_column = names.iter().position(|name| name == "branch");
        Self {
            columns: names.into_iter().map(|name| (name, Vec::new())).collect(),
            branch_column,
            branch: Vec::new(),
            rows: 0,
        }
    }

    pub fn push_row(
        &mut self,
        parser: &'static str,
        line_index: usize,
        cells: &[&str],
        branch: Option<Branch>,
        options: &ParseOptions,
    ) -> Result<(), ParserError> {
        let width = self.columns.len();
        if let Some(extra) = cells[width.min(cells.len())..]
            .iter()
            .rposition(|cell| !cell.trim().is_empty())
        {
            return Err(ParserError::DataRow {
                parser,
                line_index,
                message: format!(
                    "row has {} values but the header names {width} columns",
                    width + extra + 1
                ),
            });
        }

        if let Some(tag) = branch {
            self.branch.push(tag);
        }
        for (idx, cell) in cells.iter().take(width).enumerate() {
            if Some(idx) == self.branch_column {
                let tag = Branch::try_from(cell.trim()).map_err(|message| ParserError::DataRow {
                    parser,
                    line_index,
                    message,
                })?;
                self.branch.push(tag);
                continue;
            }
            let (name, values) = &mut self.columns[idx];
            values.push(parse_data_value(
                parser,
                cell,
                line_index,
                name,
                options.decimal_comma,
            )?);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(
        self,
        parser: &'static str,
        diagnostics: &mut Diagnostics,
    ) -> Result<DataTable, ParserError> {
        if self.rows == 0 {
            return Err(ParserError::EmptyData { parser });
        }
        let branch_column = self.branch_column;
        let mut table = DataTable::new();
        for (idx, (name, values)) in self.columns.into_iter().enumerate() {
            if Some(idx) != branch_column {
                table.insert_column(name, values);
            }
        }
        if !self.branch.is_empty() {
            table.set_branch(self.branch);
        }

        let rows = self.rows;
        let reference = ["loading", "pressure", "pressure_relative"]
            .into_iter()
            .find(|name| table.column(name).is_some_and(|values| values.len() == rows))
            .map(str::to_string)
            .or_else(|| {
                table
                    .columns()
                    .find(|(_, values)| values.len() == rows)
                    .map(|(name, _)| name.to_string())
            })
            .ok_or_else(|| ParserError::Validation {
                parser,
                message: format!("no column holds a value for all {rows} rows"),
            })?;
        let dropped = table
            .drop_ragged(&reference)
            .map_err(|source| schema_error(parser, source))?;
        for warning in dropped {
            diagnostics.push(warning);
        }

        for (name, values) in table.columns() {
            if values.iter().all(|value| value.is_nan()) {
                diagnostics.push(ParseWarning::EmptyColumn {
                    column: name.to_string(),
                });
            }
        }
        Ok(table)
    }
}

pub(crate) fn schema_error(parser: &'static str, source: SchemaError) -> ParserError {
    ParserError::Schema { parser, source }
}

/// Type a raw metadata value according to its definition.
pub(crate) fn typed_value(
    raw: &str,
    value_type: ValueType,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    match value_type {
        ValueType::Numeric => numeric_value(raw, options.decimal_comma),
        ValueType::Datetime => normalize_date(raw, diagnostics),
        ValueType::String | ValueType::Time | ValueType::Timedelta | ValueType::Error => {
            Value::from(raw)
        }
    }
}

fn numeric_value(raw: &str, decimal_comma: bool) -> Value {
    let normalized = if decimal_comma {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };
    if let Ok(value) = cast_numeric(&normalized) {
        return value;
    }
    match split_number_unit(raw, decimal_comma) {
        Ok((number, _)) => Value::Float(number),
        Err(err) => {
            tracing::debug!(%err, "numeric field kept as text");
            Value::from(raw)
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%y/%m/%d %H:%M:%S",
    "%y/%m/%d %H:%M",
    "%Y/%m/%d %p %I:%M:%S",
    "%Y/%m/%d %I:%M:%S %p",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%y/%m/%d", "%Y.%m.%d", "%d/%m/%Y"];

const MERIDIEM_MARKERS: &[(&str, &str)] = &[
    ("午前", "AM"),
    ("午後", "PM"),
    ("上午", "AM"),
    ("下午", "PM"),
];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Normalise a free-text measurement date to ISO-8601.
///
/// An unparseable date is kept verbatim and reported.
pub(crate) fn normalize_date(raw: &str, diagnostics: &mut Diagnostics) -> Value {
    let mut text = raw.trim().to_string();
    for (marker, meridiem) in MERIDIEM_MARKERS {
        text = text.replace(marker, &format!(" {meridiem} "));
    }

    match parse_datetime(&text) {
        Some(datetime) => Value::from(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
        None => {
            diagnostics.push(ParseWarning::UnparsedDate {
                raw: raw.to_string(),
            });
            Value::from(raw)
        }
    }
}

/// Value stored in a companion unit field.
pub(crate) fn unit_value(unit_field: &str, unit: &str) -> Value {
    let unit = unit.trim().trim_start_matches('[').trim_end_matches(']').trim();
    if unit.is_empty() {
        return Value::Null;
    }
    if unit_field == "temperature_unit" {
        Value::from(parse_temperature_unit(unit))
    } else {
        Value::from(unit)
    }
}

/// Store a field no definition recognises under its sanitized label.
pub(crate) fn store_unknown(metadata: &mut Metadata, label: &str, value: &str, unit: Option<&str>) {
    let value = value.trim();
    let value = match unit.map(str::trim).filter(|unit| !unit.is_empty()) {
        Some(unit) => format!("{value} {unit}"),
        None => value.to_string(),
    };
    metadata.insert(sanitize_key(label), value);
}

pub(crate) fn report_instrument_errors(metadata: &Metadata, diagnostics: &mut Diagnostics) {
    if let Some(errors) = metadata.get_str("errors").filter(|text| !text.trim().is_empty()) {
        diagnostics.push(ParseWarning::InstrumentErrors {
            messages: errors.lines().map(str::to_string).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_normalize_to_iso() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            normalize_date("2019/05/14 13:45:21", &mut diagnostics),
            Value::from("2019-05-14T13:45:21")
        );
        assert_eq!(
            normalize_date("2017/02/13 午後 4:39:55", &mut diagnostics),
            Value::from("2017-02-13T16:39:55")
        );
        assert_eq!(
            normalize_date("2020-01-05", &mut diagnostics),
            Value::from("2020-01-05T00:00:00")
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unparsed_date_is_kept_and_reported() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            normalize_date("sometime in May", &mut diagnostics),
            Value::from("sometime in May")
        );
        assert_eq!(
            diagnostics.warnings(),
            &[ParseWarning::UnparsedDate {
                raw: "sometime in May".to_string()
            }]
        );
    }

    #[test]
    fn numeric_fields_accept_trailing_units() {
        let mut diagnostics = Diagnostics::new();
        let options = ParseOptions::default();
        assert_eq!(
            typed_value("12", ValueType::Numeric, &options, &mut diagnostics),
            Value::Int(12)
        );
        assert_eq!(
            typed_value("77.35 K", ValueType::Numeric, &options, &mut diagnostics),
            Value::Float(77.35)
        );
        assert_eq!(
            typed_value("  ", ValueType::Numeric, &options, &mut diagnostics),
            Value::Null
        );
    }

    #[test]
    fn builder_drops_short_columns() {
        let options = ParseOptions::default();
        let mut diagnostics = Diagnostics::new();
        let mut builder = TableBuilder::new(vec![
            "pressure".to_string(),
            "loading".to_string(),
            "extra".to_string(),
        ]);
        builder
            .push_row("test", 1, &["1.0", "2.0", "3.0"], Some(Branch::Adsorption), &options)
            .unwrap();
        builder
            .push_row("test", 2, &["1.5", "2.5"], Some(Branch::Adsorption), &options)
            .unwrap();
        let table = builder.finish("test", &mut diagnostics).unwrap();
        assert_eq!(table.column_names(), vec!["pressure", "loading"]);
        assert_eq!(diagnostics.warnings().len(), 1);
    }

    #[test]
    fn blank_trailing_cell_is_nan_not_a_short_column() {
        let options = ParseOptions::default();
        let mut diagnostics = Diagnostics::new();
        let mut builder = TableBuilder::new(vec!["pressure".to_string(), "loading".to_string()]);
        for (line, cells) in [["0.1", "1.0"], ["0.2", ""], ["0.3", "1.5"]].iter().enumerate() {
            builder.push_row("test", line + 1, cells, None, &options).unwrap();
        }
        let table = builder.finish("test", &mut diagnostics).unwrap();
        assert_eq!(table.column_names(), vec!["pressure", "loading"]);
        let loading = table.column("loading").unwrap();
        assert_eq!(loading[0], 1.0);
        assert!(loading[1].is_nan());
        assert_eq!(loading[2], 1.5);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn empty_cells_past_the_header_are_ignored() {
        let options = ParseOptions::default();
        let mut diagnostics = Diagnostics::new();
        let mut builder = TableBuilder::new(vec!["pressure".to_string()]);
        builder.push_row("test", 1, &["1.0", "", " "], None, &options).unwrap();
        let table = builder.finish("test", &mut diagnostics).unwrap();
        assert_eq!(table.column("pressure"), Some(&[1.0][..]));
    }

    #[test]
    fn builder_rejects_overlong_rows() {
        let options = ParseOptions::default();
        let mut builder = TableBuilder::new(vec!["pressure".to_string()]);
        let err = builder
            .push_row("test", 7, &["1.0", "2.0"], None, &options)
            .unwrap_err();
        assert!(matches!(err, ParserError::DataRow { line_index: 7, .. }));
    }
}
