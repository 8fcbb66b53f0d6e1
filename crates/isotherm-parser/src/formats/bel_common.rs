//! Label tables and header handling shared by the BEL Japan readers.

use once_cell::sync::Lazy;

use crate::definitions::{DefinitionTable, FieldDefinition, MatchMode, ValueType};
use crate::diagnostics::Diagnostics;
use crate::errors::{ParserError, UnitError, UnitRole};
use crate::model::Metadata;
use crate::units::{parse_loading, parse_pressure};
use crate::value::Value;

const METADATA_FIELDS: &[(&str, FieldDefinition)] = &[
    (
        "material",
        FieldDefinition::new(&["comment1", "コメント１"], ValueType::String),
    ),
    (
        "adsorbate",
        FieldDefinition::new(&["adsorptive", "吸着質名称"], ValueType::String),
    ),
    (
        "temperature",
        FieldDefinition::new(
            &["adsorption temperature", "meas. temp.", "吸着温度"],
            ValueType::Numeric,
        )
        .with_unit("temperature_unit"),
    ),
    (
        "operator",
        FieldDefinition::new(&["comment2", "コメント２"], ValueType::String),
    ),
    (
        "date",
        FieldDefinition::new(&["date of measurement", "測定日"], ValueType::Datetime),
    ),
    (
        "material_mass",
        FieldDefinition::new(&["sample weight", "サンプル質量"], ValueType::Numeric)
            .with_unit("material_mass_unit"),
    ),
    (
        "measurement_duration",
        FieldDefinition::new(&["time of measurement", "測定時間"], ValueType::Timedelta),
    ),
    (
        "serialnumber",
        FieldDefinition::new(
            &["serial number", "s/n", "instrument", "シリアルナンバー", "装置ｓ／ｎ"],
            ValueType::String,
        ),
    ),
    (
        "errors",
        FieldDefinition::new(&["primary data"], ValueType::Error),
    ),
    (
        "comment3",
        FieldDefinition::new(&["comment3", "コメント３"], ValueType::String),
    ),
    (
        "comment4",
        FieldDefinition::new(&["comment4", "コメント４"], ValueType::String),
    ),
    (
        "cell_volume",
        FieldDefinition::new(&["vs/", "standard volume"], ValueType::Numeric)
            .with_unit("cell_volume_unit"),
    ),
    (
        "dead_volume",
        FieldDefinition::new(&["dead volume"], ValueType::Numeric),
    ),
    (
        "equilibration_time",
        FieldDefinition::new(&["equilibrium time", "平衡時間"], ValueType::Numeric)
            .with_unit("equilibration_time_unit"),
    ),
];

const DATA_COLUMNS: &[(&str, FieldDefinition)] = &[
    ("measurement", FieldDefinition::new(&["no"], ValueType::Numeric)),
    (
        "pressure_internal",
        FieldDefinition::new(&["pi/"], ValueType::Numeric),
    ),
    ("pressure", FieldDefinition::new(&["pe/"], ValueType::Numeric)),
    ("pressure2", FieldDefinition::new(&["pe2/"], ValueType::Numeric)),
    (
        "pressure_saturation",
        FieldDefinition::new(&["p0/"], ValueType::Numeric),
    ),
    (
        "pressure_relative",
        FieldDefinition::new(&["p/p0"], ValueType::Numeric),
    ),
    ("dead_volume", FieldDefinition::new(&["vd/"], ValueType::Numeric)),
    (
        "loading",
        FieldDefinition::new(&["v/", "va/", "n/", "na/"], ValueType::Numeric),
    ),
];

/// Metadata labels matched whole, as in BEL CSV exports.
pub(crate) static METADATA_EXACT: Lazy<DefinitionTable> =
    Lazy::new(|| DefinitionTable::new(MatchMode::Exact, METADATA_FIELDS));

/// Metadata labels matched by prefix, as in BEL DAT exports where the unit
/// trails the label.
pub(crate) static METADATA_PREFIX: Lazy<DefinitionTable> =
    Lazy::new(|| DefinitionTable::new(MatchMode::Prefix, METADATA_FIELDS));

static DATA_HEADERS: Lazy<DefinitionTable> =
    Lazy::new(|| DefinitionTable::new(MatchMode::Prefix, DATA_COLUMNS));

#[derive(Debug)]
pub(crate) struct DataHeader {
    pub columns: Vec<String>,
    pub units: Metadata,
}

fn unit_text(cell: &str, role: UnitRole) -> Result<&str, UnitError> {
    cell.split_once('/')
        .map(|(_, unit)| unit.trim())
        .filter(|unit| !unit.is_empty())
        .ok_or_else(|| UnitError::Parse {
            role,
            raw: cell.to_string(),
        })
}

fn header_units(
    name: &str,
    cell: &str,
    units: &mut Metadata,
    diagnostics: &mut Diagnostics,
) -> Result<(), UnitError> {
    match name {
        "loading" => {
            let raw = unit_text(cell, UnitRole::Loading)?;
            let parsed = parse_loading(raw)?;
            if let Some(warning) = parsed.ambiguity_warning() {
                diagnostics.push(warning);
            }
            units.insert("loading_basis", parsed.loading_basis.as_str());
            units.insert("loading_unit", parsed.loading_unit);
            units.insert("material_basis", parsed.material_basis.as_str());
            units.insert("material_unit", parsed.material_unit);
            units.insert("original_loading_string", raw);
        }
        "pressure" => {
            let raw = unit_text(cell, UnitRole::Pressure)?;
            let parsed = parse_pressure(raw)?;
            units.insert("pressure_mode", parsed.mode.as_str());
            units.insert("pressure_unit", parsed.unit.map(|unit| unit.symbol()));
            units.insert("original_pressure_string", raw);
        }
        "pressure_saturation" => {
            if let Ok(raw) = unit_text(cell, UnitRole::Pressure) {
                let unit = match parse_pressure(raw) {
                    Ok(parsed) => Value::from(parsed.unit.map(|unit| unit.symbol())),
                    Err(_) => Value::from(raw),
                };
                units.insert("pressure_saturation_unit", unit);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve the column names of a BEL data header and decompose the units
/// it carries.
///
/// Unknown columns keep their raw label. A pressure or loading unit that
/// cannot be classified fails the whole file.
pub(crate) fn parse_data_header(
    parser: &'static str,
    cells: &[&str],
    diagnostics: &mut Diagnostics,
) -> Result<DataHeader, ParserError> {
    let mut columns = Vec::with_capacity(cells.len());
    let mut units = Metadata::new();

    for cell in cells {
        let cell = cell.trim().trim_matches('"');
        if cell.is_empty() {
            continue;
        }
        let label = cell.replace(' ', "").to_lowercase();
        let name = match DATA_HEADERS.resolve(&label) {
            Ok(name) => name.to_string(),
            Err(_) => cell.to_string(),
        };
        header_units(&name, cell, &mut units, diagnostics)
            .map_err(|source| ParserError::Unit { parser, source })?;
        columns.push(name);
    }

    Ok(DataHeader { columns, units })
}

/// Fill in fields every BEL reader derives after the metadata section.
pub(crate) fn finish_metadata(metadata: &mut Metadata) {
    if let Some(serial) = metadata
        .get("serialnumber")
        .filter(|value| !value.is_null())
        .map(ToString::to_string)
    {
        metadata.insert("apparatus", format!("BEL {serial}"));
    }
}
