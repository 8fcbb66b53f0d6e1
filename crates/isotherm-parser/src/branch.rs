//! Location of the turning point between the adsorption and desorption legs.

use tracing::debug;

use crate::errors::SchemaError;
use crate::model::{Branch, DataTable};

/// Index of the first desorption row.
///
/// With explicit tags this is the first row tagged [`Branch::Desorption`],
/// or the row count when there is none. Without tags the adsorption leg is
/// taken to end at the pressure maximum: the first occurrence of the
/// largest value, skipping NaN, plus one. A series with no comparable
/// value is treated as pure adsorption.
///
/// Only a single adsorption/desorption cycle is supported.
pub fn split(pressure: &[f64], explicit_branch: Option<&[Branch]>) -> usize {
    match explicit_branch {
        Some(tags) => tags
            .iter()
            .position(|tag| *tag == Branch::Desorption)
            .unwrap_or(tags.len()),
        None => argmax(pressure).map_or(pressure.len(), |idx| idx + 1),
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.iter().copied().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Split `table` into adsorption and desorption sub-tables.
///
/// `series` names the column used when the table carries no branch tags.
/// Column lengths are validated first; a ragged table is an error here,
/// never truncated. Branch tags must not return to adsorption once
/// desorption has started.
pub fn split_table(
    table: &DataTable,
    series: &str,
) -> Result<(DataTable, DataTable), SchemaError> {
    let rows = table.validate_lengths()?;
    let index = match table.branch() {
        Some(tags) => {
            let index = split(&[], Some(tags));
            if let Some(offset) = tags[index..]
                .iter()
                .position(|tag| *tag == Branch::Adsorption)
            {
                return Err(SchemaError::InterleavedBranch {
                    row: index + offset,
                    desorption_start: index,
                });
            }
            index
        }
        None => {
            let pressure = table
                .column(series)
                .ok_or_else(|| SchemaError::MissingColumn {
                    column: series.to_string(),
                })?;
            split(pressure, None)
        }
    };
    debug!(rows, index, series, "split isotherm branches");
    Ok(table.split_at(index))
}
