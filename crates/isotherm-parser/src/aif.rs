//! Rendering of an [`IsothermRecord`] as an AIF (adsorption information file)
//! block.

use crate::model::{DataTable, IsothermRecord, Metadata};
use crate::value::Value;

pub const AIF_VERSION: &str = "0.01";

const UNKNOWN: &str = "?";

fn quoted(text: &str) -> String {
    format!("'{text}'")
}

/// A metadata value as it appears in the block: text single-quoted,
/// numbers bare, missing or null as `?`.
fn quoted_value(metadata: &Metadata, key: &str) -> String {
    match metadata.get(key) {
        None | Some(Value::Null) => UNKNOWN.to_string(),
        Some(Value::Str(text)) => quoted(text),
        Some(other) => other.to_string(),
    }
}

fn bare_value(metadata: &Metadata, key: &str) -> String {
    match metadata.get(key) {
        None | Some(Value::Null) => UNKNOWN.to_string(),
        Some(Value::Str(text)) if text.contains(char::is_whitespace) || text.is_empty() => {
            quoted(text)
        }
        Some(other) => other.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        UNKNOWN.to_string()
    } else if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn write_loop(out: &mut String, prefix: &str, table: &DataTable) {
    let columns: Vec<(&str, &[f64])> = table.columns().collect();
    out.push_str("\nloop_\n");
    for (name, _) in &columns {
        out.push_str(&format!("{prefix}{name}\n"));
    }
    for row in 0..table.row_count() {
        let cells: Vec<String> = columns
            .iter()
            .map(|(_, values)| format_number(values[row]))
            .collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
}

/// Render `record` as an AIF block.
///
/// The desorption loop is written only when the record has desorption rows.
pub fn write_aif(record: &IsothermRecord) -> String {
    let meta = &record.metadata;
    let mut out = String::from("data_raw2aif\n\n");
    let mut pair = |key: &str, value: String| {
        out.push_str(&format!("{key} {value}\n"));
    };

    let operator = match meta.get("operator") {
        Some(Value::Str(text)) if !text.trim().is_empty() => quoted(text),
        _ => quoted("unknown"),
    };
    pair("_exptl_operator", operator);
    pair("_exptl_date", bare_value(meta, "date"));
    let instrument = match meta.get("apparatus") {
        Some(value) if !value.is_null() => quoted(&value.to_string()),
        _ => "unknown".to_string(),
    };
    pair("_exptl_instrument", instrument);
    pair("_exptl_adsorptive", quoted_value(meta, "adsorbate"));
    pair("_exptl_temperature", bare_value(meta, "temperature"));
    pair("_adsnt_sample_mass", bare_value(meta, "material_mass"));
    pair("_adsnt_sample_id", quoted_value(meta, "material"));
    pair("_units_temperature", quoted_value(meta, "temperature_unit"));
    pair("_units_pressure", quoted_value(meta, "pressure_unit"));
    pair("_units_mass", quoted_value(meta, "material_unit"));
    pair("_units_loading", quoted_value(meta, "loading_unit"));
    pair("_audit_aif_version", AIF_VERSION.to_string());

    write_loop(&mut out, "_adsorp_", &record.adsorption);
    if !record.desorption.is_empty() {
        write_loop(&mut out, "_desorp_", &record.desorption);
    }
    out
}
