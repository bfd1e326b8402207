//! Pipeline configuration file.
//!
//! The file is optional. An explicit `--config` path must exist; otherwise
//! `ecg-omop.toml` in the working directory is read when present. Flags
//! given on the command line win over file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use omop_load::LoadOptions;
use omop_transform::AssemblyOptions;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "ecg-omop.toml";
pub const DEFAULT_VOCABULARY_DIR: &str = "vocabulary";
pub const DEFAULT_DATABASE: &str = "omop.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub vocabulary_dir: PathBuf,
    pub database: PathBuf,
    pub strict: bool,
    pub dry_run: bool,
    /// Where `assemble` writes; `<INPUT_DIR>/omop` when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vocabulary_dir: PathBuf::from(DEFAULT_VOCABULARY_DIR),
            database: PathBuf::from(DEFAULT_DATABASE),
            strict: false,
            dry_run: false,
            output_dir: None,
        }
    }
}

/// Values given on the command line.
///
/// Switches only ever turn a setting on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub vocabulary_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub strict: bool,
    pub dry_run: bool,
    pub output_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Reads the configuration file, or returns defaults when there is none.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    tracing::debug!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parse configuration {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(dir) = &overrides.vocabulary_dir {
            self.vocabulary_dir = dir.clone();
        }
        if let Some(database) = &overrides.database {
            self.database = database.clone();
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = Some(dir.clone());
        }
        self.strict |= overrides.strict;
        self.dry_run |= overrides.dry_run;
        self
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions::default().with_strict(self.strict)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default().with_dry_run(self.dry_run)
    }

    pub fn output_dir_for(&self, input_dir: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| input_dir.join("omop"))
    }
}
