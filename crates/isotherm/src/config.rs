use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use isotherm_parser::ParseOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Aif,
    Json,
    Parquet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Output directory. Files land next to their input when unset.
    pub directory: Option<PathBuf>,
    /// Reader to use for every file instead of auto-detection.
    pub parser: Option<String>,
}

/// Settings read from `--config`; command-line flags win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub parse: ParseOptions,
    pub output: OutputOptions,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: CliConfig = toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn with_overrides(
        mut self,
        parser: Option<String>,
        format: Option<OutputFormat>,
        directory: Option<PathBuf>,
    ) -> Self {
        if parser.is_some() {
            self.output.parser = parser;
        }
        if let Some(format) = format {
            self.output.format = format;
        }
        if directory.is_some() {
            self.output.directory = directory;
        }
        self
    }
}
