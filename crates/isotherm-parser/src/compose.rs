//! Reconciliation of the quantities a file provides into one output layout.

use tracing::{debug, info};

use crate::branch::split_table;
use crate::diagnostics::Diagnostics;
use crate::errors::SchemaError;
use crate::model::{DataTable, IsothermRecord, Metadata, OutputLayout, RawIsotherm};
use crate::value::Value;

const PRESSURE: &str = "pressure";
const PRESSURE_RELATIVE: &str = "pressure_relative";
const PRESSURE_SATURATION: &str = "pressure_saturation";
const LOADING: &str = "loading";

/// Where the primary `pressure` series of a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressureSource {
    Measured,
    /// `pressure_relative * pressure_saturation`
    Derived,
    /// `pressure_relative` promoted to be the pressure series.
    RelativeOnly,
}

fn primary_pressure(table: &mut DataTable) -> Result<PressureSource, SchemaError> {
    if table.contains(PRESSURE) {
        return Ok(PressureSource::Measured);
    }
    match (table.column(PRESSURE_RELATIVE), table.column(PRESSURE_SATURATION)) {
        (Some(relative), Some(saturation)) => {
            let pressure = relative
                .iter()
                .zip(saturation)
                .map(|(rel, sat)| rel * sat)
                .collect();
            table.insert_column(PRESSURE, pressure);
            Ok(PressureSource::Derived)
        }
        (Some(_), None) => {
            table.rename_column(PRESSURE_RELATIVE, PRESSURE);
            Ok(PressureSource::RelativeOnly)
        }
        _ => Err(SchemaError::MissingColumn {
            column: PRESSURE.to_string(),
        }),
    }
}

fn has_complete_saturation(table: &DataTable) -> bool {
    table
        .column(PRESSURE_SATURATION)
        .is_some_and(|values| values.iter().all(|value| !value.is_nan()))
}

fn choose_layout(table: &DataTable) -> OutputLayout {
    if has_complete_saturation(table) || table.contains(PRESSURE_RELATIVE) {
        OutputLayout::WithSaturation
    } else {
        OutputLayout::PressureOnly
    }
}

fn required<'a>(table: &'a DataTable, column: &str) -> Result<&'a [f64], SchemaError> {
    table.column(column).ok_or_else(|| SchemaError::MissingColumn {
        column: column.to_string(),
    })
}

/// Saturation pressure per row: the measured value where present, else
/// `pressure / pressure_relative`, else NaN.
fn saturation_series(table: &DataTable, pressure: &[f64]) -> Result<Vec<f64>, SchemaError> {
    let saturation = table.column(PRESSURE_SATURATION);
    let relative = table.column(PRESSURE_RELATIVE);
    if saturation.is_none() && relative.is_none() {
        return Err(SchemaError::MissingColumn {
            column: PRESSURE_SATURATION.to_string(),
        });
    }
    Ok((0..pressure.len())
        .map(|row| {
            let p0 = saturation.and_then(|values| values.get(row).copied());
            let rel = relative.and_then(|values| values.get(row).copied());
            match (p0, rel) {
                (Some(p0), _) if !p0.is_nan() => p0,
                (_, Some(rel)) => pressure[row] / rel,
                _ => f64::NAN,
            }
        })
        .collect())
}

/// Project one branch table onto the output columns of `layout`.
fn emit(table: &DataTable, layout: OutputLayout) -> Result<DataTable, SchemaError> {
    let pressure = required(table, PRESSURE)?;
    let amount = required(table, LOADING)?;
    let mut out = DataTable::new().with_column("pressure", pressure.to_vec());

    if layout == OutputLayout::WithSaturation {
        out.insert_column("p0", saturation_series(table, pressure)?);
    }

    out.insert_column("amount", amount.to_vec());
    out.validate_lengths()?;
    Ok(out)
}

fn take_raw_string(metadata: &mut Metadata, key: &str) -> Option<Value> {
    match metadata.get(key) {
        Some(Value::Str(text)) if !text.is_empty() => metadata.remove(key),
        _ => None,
    }
}

/// Build the output record from normalised metadata and the two branch tables.
///
/// Rules, in order:
/// 1. no `pressure` but relative and saturation pressure: their product
///    becomes the pressure and the saturation unit becomes the pressure unit;
/// 2. no `pressure` and only relative pressure: it becomes the pressure series;
/// 3. raw `original_pressure_string`/`original_loading_string` replace the
///    decomposed unit fields verbatim;
/// 4. a missing or null `pressure_unit` defaults to `"relative"`;
/// 5. the layout is `pressure, p0, amount` when saturation pressure is known
///    for every row or can be synthesised from relative pressure, else
///    `pressure, amount`.
///
/// An empty desorption table stays empty.
pub fn compose(
    mut metadata: Metadata,
    mut adsorption: DataTable,
    mut desorption: DataTable,
) -> Result<IsothermRecord, SchemaError> {
    let source = primary_pressure(&mut adsorption)?;
    if !desorption.is_empty() {
        primary_pressure(&mut desorption)?;
    }

    match source {
        PressureSource::Measured => {}
        PressureSource::Derived => {
            let unit = metadata
                .get("pressure_saturation_unit")
                .cloned()
                .unwrap_or(Value::Null);
            metadata.insert("pressure_mode", "relative");
            metadata.insert("pressure_unit", unit);
        }
        PressureSource::RelativeOnly => {
            metadata.insert("pressure_mode", "relative");
            metadata.insert("pressure_unit", Value::Null);
        }
    }
    debug!(?source, "primary pressure series");

    if let Some(raw) = take_raw_string(&mut metadata, "original_pressure_string") {
        metadata.insert("pressure_unit", raw);
    }
    if let Some(raw) = take_raw_string(&mut metadata, "original_loading_string") {
        metadata.insert("loading_unit", raw);
    }

    if matches!(metadata.get("pressure_unit"), None | Some(Value::Null)) {
        metadata.insert("pressure_unit", "relative");
    }

    let layout = choose_layout(&adsorption);
    let adsorption = emit(&adsorption, layout)?;
    let desorption = if desorption.is_empty() {
        DataTable::new()
    } else {
        emit(&desorption, layout)?
    };

    Ok(IsothermRecord {
        metadata,
        adsorption,
        desorption,
        layout,
        diagnostics: Diagnostics::new(),
    })
}

/// Split a reader's output into branches and compose the output record.
pub fn assemble(raw: RawIsotherm) -> Result<IsothermRecord, SchemaError> {
    let RawIsotherm {
        metadata,
        data,
        diagnostics,
    } = raw;

    data.validate_lengths()?;
    let series = if data.contains(PRESSURE) || !data.contains(PRESSURE_RELATIVE) {
        PRESSURE
    } else {
        PRESSURE_RELATIVE
    };
    let (mut adsorption, mut desorption) = split_table(&data, series)?;
    adsorption.take_branch();
    desorption.take_branch();

    let mut record = compose(metadata, adsorption, desorption)?;
    record.diagnostics = diagnostics;
    info!(
        adsorption = record.adsorption.row_count(),
        desorption = record.desorption.row_count(),
        layout = ?record.layout,
        "assembled isotherm"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Branch;

    fn base_metadata() -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("material", "MOF-5");
        meta.insert("pressure_mode", "absolute");
        meta.insert("pressure_unit", "kPa");
        meta.insert("loading_unit", "mmol");
        meta
    }

    #[test]
    fn saturation_for_every_row_gives_three_columns() {
        let ads = DataTable::new()
            .with_column("pressure", vec![1.0, 2.0])
            .with_column("pressure_saturation", vec![100.0, 101.0])
            .with_column("loading", vec![0.1, 0.2]);
        let record = compose(base_metadata(), ads, DataTable::new()).unwrap();
        assert_eq!(record.layout, OutputLayout::WithSaturation);
        assert_eq!(record.adsorption.column_names(), vec!["pressure", "p0", "amount"]);
        assert_eq!(record.adsorption.column("p0"), Some(&[100.0, 101.0][..]));
        assert!(record.desorption.is_empty());
        assert!(record.desorption.column_names().is_empty());
    }

    #[test]
    fn incomplete_saturation_falls_back_to_relative() {
        let ads = DataTable::new()
            .with_column("pressure", vec![10.0, 20.0])
            .with_column("pressure_saturation", vec![100.0, f64::NAN])
            .with_column("pressure_relative", vec![0.1, 0.25])
            .with_column("loading", vec![0.1, 0.2]);
        let record = compose(base_metadata(), ads, DataTable::new()).unwrap();
        assert_eq!(record.layout, OutputLayout::WithSaturation);
        assert_eq!(record.adsorption.column("p0"), Some(&[100.0, 80.0][..]));
    }

    #[test]
    fn desorption_gap_in_saturation_stays_nan() {
        let ads = DataTable::new()
            .with_column("pressure", vec![1.0, 2.0])
            .with_column("pressure_saturation", vec![100.0, 100.0])
            .with_column("loading", vec![0.1, 0.2]);
        let des = DataTable::new()
            .with_column("pressure", vec![1.5, 0.5])
            .with_column("pressure_saturation", vec![100.0, f64::NAN])
            .with_column("loading", vec![0.15, 0.05]);
        let record = compose(base_metadata(), ads, des).unwrap();
        assert_eq!(record.layout, OutputLayout::WithSaturation);
        let p0 = record.desorption.column("p0").unwrap();
        assert_eq!(p0[0], 100.0);
        assert!(p0[1].is_nan());
    }

    #[test]
    fn pressure_only_without_saturation_or_relative() {
        let ads = DataTable::new()
            .with_column("pressure", vec![1.0, 2.0])
            .with_column("loading", vec![0.1, 0.2]);
        let des = DataTable::new()
            .with_column("pressure", vec![1.5])
            .with_column("loading", vec![0.15]);
        let record = compose(base_metadata(), ads, des).unwrap();
        assert_eq!(record.layout, OutputLayout::PressureOnly);
        assert_eq!(record.desorption.column_names(), vec!["pressure", "amount"]);
        assert_eq!(record.metadata.get_str("pressure_unit"), Some("kPa"));
    }

    #[test]
    fn pressure_derived_from_relative_and_saturation() {
        let mut meta = base_metadata();
        meta.insert("pressure_saturation_unit", "torr");
        let ads = DataTable::new()
            .with_column("pressure_relative", vec![0.25, 0.5])
            .with_column("pressure_saturation", vec![760.0, 760.0])
            .with_column("loading", vec![1.0, 2.0]);
        let record = compose(meta, ads, DataTable::new()).unwrap();
        assert_eq!(record.adsorption.column("pressure"), Some(&[190.0, 380.0][..]));
        assert_eq!(record.metadata.get_str("pressure_mode"), Some("relative"));
        assert_eq!(record.metadata.get_str("pressure_unit"), Some("torr"));
    }

    #[test]
    fn relative_pressure_alone_becomes_primary_series() {
        let mut meta = Metadata::new();
        meta.insert("pressure_mode", "relative");
        let ads = DataTable::new()
            .with_column("pressure_relative", vec![0.05, 0.2])
            .with_column("loading", vec![1.0, 2.0]);
        let record = compose(meta, ads, DataTable::new()).unwrap();
        assert_eq!(record.layout, OutputLayout::PressureOnly);
        assert_eq!(record.adsorption.column("pressure"), Some(&[0.05, 0.2][..]));
        assert_eq!(record.metadata.get_str("pressure_unit"), Some("relative"));
    }

    #[test]
    fn null_pressure_unit_defaults_to_relative() {
        let mut meta = Metadata::new();
        meta.insert("pressure_unit", Value::Null);
        let ads = DataTable::new()
            .with_column("pressure", vec![0.1])
            .with_column("loading", vec![1.0]);
        let record = compose(meta, ads, DataTable::new()).unwrap();
        assert_eq!(record.metadata.get_str("pressure_unit"), Some("relative"));
    }

    #[test]
    fn raw_unit_strings_take_priority() {
        let mut meta = base_metadata();
        meta.insert("original_pressure_string", "Pe/kPa");
        meta.insert("original_loading_string", "cm3(STP) g-1");
        let ads = DataTable::new()
            .with_column("pressure", vec![1.0])
            .with_column("loading", vec![1.0]);
        let record = compose(meta, ads, DataTable::new()).unwrap();
        assert_eq!(record.metadata.get_str("pressure_unit"), Some("Pe/kPa"));
        assert_eq!(record.metadata.get_str("loading_unit"), Some("cm3(STP) g-1"));
        assert!(!record.metadata.contains_key("original_pressure_string"));
    }

    #[test]
    fn missing_loading_is_a_schema_error() {
        let ads = DataTable::new().with_column("pressure", vec![1.0]);
        assert_eq!(
            compose(base_metadata(), ads, DataTable::new()).unwrap_err(),
            SchemaError::MissingColumn {
                column: "loading".to_string()
            }
        );
    }

    #[test]
    fn assemble_splits_on_explicit_branch() {
        let data = DataTable::new()
            .with_column("pressure", vec![1.0, 5.0, 9.0, 4.0])
            .with_column("loading", vec![0.1, 0.5, 0.9, 0.6])
            .with_branch(vec![
                Branch::Adsorption,
                Branch::Adsorption,
                Branch::Desorption,
                Branch::Desorption,
            ]);
        let record = assemble(RawIsotherm {
            metadata: base_metadata(),
            data,
            diagnostics: Diagnostics::new(),
        })
        .unwrap();
        assert_eq!(record.adsorption.row_count(), 2);
        assert_eq!(record.desorption.row_count(), 2);
        assert!(record.adsorption.branch().is_none());
    }

    #[test]
    fn assemble_splits_relative_only_data_on_maximum() {
        let data = DataTable::new()
            .with_column("pressure_relative", vec![0.1, 0.9, 0.5])
            .with_column("loading", vec![1.0, 3.0, 2.5]);
        let record = assemble(RawIsotherm {
            data,
            ..RawIsotherm::default()
        })
        .unwrap();
        assert_eq!(record.adsorption.column("pressure"), Some(&[0.1, 0.9][..]));
        assert_eq!(record.desorption.column("pressure"), Some(&[0.5][..]));
    }
}
