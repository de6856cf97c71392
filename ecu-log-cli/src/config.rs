//! Configuration loading and parsing
//!
//! The optional `config.toml` names the inputs and carries the analyzer
//! settings under `[analysis]`. Environment variables override the file,
//! command line arguments override both.

use anyhow::{Context, Result};
use ecu_log_core::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analysis: AnalyzerConfig,
    /// Parse directory batches on the worker pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            analysis: AnalyzerConfig::default(),
            parallel: default_parallel(),
            verbose: false,
        }
    }
}

fn default_parallel() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Directory scanned recursively for log files
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_files: Vec<PathBuf>,
    /// Linker map file for TRAP symbol names
    pub map_file: Option<PathBuf>,
    /// SOA channel manifest (`Summary_Report.json`)
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pretty: default_pretty(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_pretty() -> bool {
    true
}

impl AppConfig {
    /// Apply `ECU_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup
    ///
    /// Recognized keys: `ECU_MAX_FILE_SIZE_MB`, `ECU_OUTPUT_DIR`, `ECU_VERBOSE`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("ECU_MAX_FILE_SIZE_MB") {
            let megabytes: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid ECU_MAX_FILE_SIZE_MB: {:?}", value))?;
            self.analysis = self.analysis.clone().with_max_file_size_mb(megabytes);
        }

        if let Some(value) = lookup("ECU_OUTPUT_DIR") {
            self.output.output_dir = PathBuf::from(value);
        }

        if let Some(value) = lookup("ECU_VERBOSE") {
            self.verbose = matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            parallel = false

            [input]
            log_dir = "logs"
            map_file = "build/app.map"

            [analysis.symbols]
            cache_max_size = 500

            [analysis.parser]
            max_workers = 2
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.input.map_file, Some(PathBuf::from("build/app.map")));
        assert!(config.input.manifest.is_none());
        assert!(!config.parallel);
        assert_eq!(config.analysis.symbols.cache_max_size, 500);
        assert_eq!(config.analysis.symbols.range_search_limit, 0x1000);
        assert_eq!(config.analysis.parser.max_workers, 2);
        assert_eq!(config.output.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.parallel);
        assert!(config.output.pretty);
        assert_eq!(config.analysis.parser.max_file_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ECU_MAX_FILE_SIZE_MB", "20"),
            ("ECU_OUTPUT_DIR", "/tmp/ecu"),
            ("ECU_VERBOSE", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.analysis.parser.max_file_size, 20 * 1024 * 1024);
        assert_eq!(config.output.output_dir, PathBuf::from("/tmp/ecu"));
        assert!(config.verbose);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "ECU_MAX_FILE_SIZE_MB").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\noutput_dir = \"out\"\npretty = false").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.output.output_dir, PathBuf::from("out"));
        assert!(!config.output.pretty);

        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }
}
