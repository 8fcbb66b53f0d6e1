use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use isotherm_parser::{
    read_isotherm, write_aif, DataTable, IsothermRecord, Metadata, OutputLayout, ParseWarning,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CliConfig, OutputFormat};

/// Expand each argument as a glob pattern. A pattern that matches nothing is
/// an error so typos do not silently skip inputs.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad pattern '{pattern}'"))? {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(err) => warn!(%err, "could not read path from pattern"),
            }
        }
        if paths.len() == before {
            bail!("no input files match '{pattern}'");
        }
    }
    Ok(paths)
}

pub fn load_record(path: &Path, config: &CliConfig) -> Result<IsothermRecord> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let content = config.parse.decode(&bytes);
    let record = read_isotherm(&content, &config.parse, config.output.parser.as_deref())
        .with_context(|| format!("failed to parse {}", path.display()))?;
    for warning in record.diagnostics.warnings() {
        warn!(path = %path.display(), %warning, "parse warning");
    }
    Ok(record)
}

fn output_path(input: &Path, directory: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "isotherm".to_string());
    let dir = directory
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}"))
}

fn write_output(path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Parse one input and write its converted form, returning the files written.
pub fn convert_file(input: &Path, config: &CliConfig) -> Result<Vec<PathBuf>> {
    let record = load_record(input, config)?;
    let directory = config.output.directory.as_deref();

    let written = match config.output.format {
        OutputFormat::Aif => {
            let text = write_aif(&record);
            vec![write_output(output_path(input, directory, ".aif"), text.as_bytes())?]
        }
        OutputFormat::Json => {
            let text = record.to_json()?;
            vec![write_output(output_path(input, directory, ".json"), text.as_bytes())?]
        }
        OutputFormat::Parquet => {
            let (adsorption, desorption) = record.to_parquet()?;
            let mut written = vec![write_output(
                output_path(input, directory, "_ads.parquet"),
                &adsorption,
            )?];
            if let Some(desorption) = desorption {
                written.push(write_output(
                    output_path(input, directory, "_des.parquet"),
                    &desorption,
                )?);
            }
            written
        }
    };
    info!(input = %input.display(), outputs = written.len(), "converted");
    Ok(written)
}

/// Convert every input in parallel. Each failure is reported with its path;
/// the count of failed inputs is returned.
pub fn convert_all(inputs: &[PathBuf], config: &CliConfig) -> Result<usize> {
    if let Some(directory) = &config.output.directory {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;
    }

    let results: Vec<(&PathBuf, Result<Vec<PathBuf>>)> = inputs
        .par_iter()
        .map(|input| (input, convert_file(input, config)))
        .collect();

    let mut failures = 0;
    for (input, result) in results {
        match result {
            Ok(outputs) => {
                for output in outputs {
                    println!("{} -> {}", input.display(), output.display());
                }
            }
            Err(err) => {
                eprintln!("ERROR {}: {err:#}", input.display());
                failures += 1;
            }
        }
    }
    Ok(failures)
}

#[derive(Debug, Serialize)]
struct TableSummary {
    rows: usize,
    columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Inspection<'a> {
    path: String,
    layout: OutputLayout,
    metadata: &'a Metadata,
    adsorption: TableSummary,
    desorption: TableSummary,
    warnings: &'a [ParseWarning],
}

impl<'a> Inspection<'a> {
    pub fn new(path: &Path, record: &'a IsothermRecord) -> Self {
        let summary = |table: &DataTable| TableSummary {
            rows: table.row_count(),
            columns: table.column_names().into_iter().map(str::to_string).collect(),
        };
        Self {
            path: path.display().to_string(),
            layout: record.layout,
            metadata: &record.metadata,
            adsorption: summary(&record.adsorption),
            desorption: summary(&record.desorption),
            warnings: record.diagnostics.warnings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputOptions;

    const GENERIC: &str = "_exptl_adsorptive,argon\n_adsnt_material_id,ZIF-8\n\
        _units_pressure,bar\n_parser_version,1.0\ndata\n\
        pressure,loading,branch\n0.1,1.0,ads\n0.5,2.0,ads\n0.3,1.5,des\n";

    fn config(format: OutputFormat, directory: Option<PathBuf>) -> CliConfig {
        CliConfig {
            output: OutputOptions {
                format,
                directory,
                parser: None,
            },
            ..CliConfig::default()
        }
    }

    #[test]
    fn converts_to_aif_next_to_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("argon.csv");
        fs::write(&input, GENERIC).expect("write input");

        let written = convert_file(&input, &config(OutputFormat::Aif, None)).expect("convert");
        assert_eq!(written, vec![dir.path().join("argon.aif")]);
        let text = fs::read_to_string(&written[0]).expect("read output");
        assert!(text.contains("_exptl_adsorptive 'argon'\n"));
        assert!(text.contains("_desorp_amount\n"));
    }

    #[test]
    fn parquet_writes_both_branches_into_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("argon.csv");
        fs::write(&input, GENERIC).expect("write input");
        let out = dir.path().join("out");

        let failures = convert_all(
            &[input],
            &config(OutputFormat::Parquet, Some(out.clone())),
        )
        .expect("convert_all");
        assert_eq!(failures, 0);
        assert!(out.join("argon_ads.parquet").is_file());
        assert!(out.join("argon_des.parquet").is_file());
    }

    #[test]
    fn failures_are_counted_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.csv");
        let bad = dir.path().join("bad.txt");
        fs::write(&good, GENERIC).expect("write input");
        fs::write(&bad, "nothing to see\n").expect("write input");

        let failures =
            convert_all(&[good, bad], &config(OutputFormat::Json, None)).expect("convert_all");
        assert_eq!(failures, 1);
        assert!(dir.path().join("good.json").is_file());
    }

    #[test]
    fn unmatched_pattern_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pattern = dir.path().join("*.DAT").to_string_lossy().into_owned();
        assert!(expand_inputs(&[pattern]).is_err());
    }

    #[test]
    fn inspection_summarises_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("argon.csv");
        fs::write(&input, GENERIC).expect("write input");
        let record = load_record(&input, &CliConfig::default()).expect("load");

        let json = serde_json::to_value(Inspection::new(&input, &record)).expect("serialize");
        assert_eq!(json["adsorption"]["rows"], 2);
        assert_eq!(json["desorption"]["rows"], 1);
        assert_eq!(json["layout"], "pressure_only");
        assert_eq!(json["metadata"]["material"], "ZIF-8");
    }
}
