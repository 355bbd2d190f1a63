//! Job file deserialisation (TOML or JSON).

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use gaussbench_core::document::BenchDocument;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub bench: BenchDocument,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Placement search to run before reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimize {
    MagicWaist,
    LocalOptimum,
}

/// What to compute and report.
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub optimize: Option<Optimize>,
    /// Report the cavity stability and eigenmode (default: true).
    #[serde(default = "default_true")]
    pub cavity: bool,
    /// Report the waist fits (default: true).
    #[serde(default = "default_true")]
    pub fits: bool,
    /// Number of axial samples in the beam profile (default: 200).
    #[serde(default = "default_samples")]
    pub samples: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            optimize: None,
            cavity: true,
            fits: true,
            samples: default_samples(),
        }
    }
}

fn default_samples() -> usize {
    200
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the beam radius profile as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_profile: bool,
    /// Whether to save the resulting bench as a JSON document (default: false).
    #[serde(default)]
    pub save_document: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_profile: true,
            save_document: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_true() -> bool {
    true
}

/// Parse a job from `content`. JSON when `json` is set, TOML otherwise.
pub fn parse_config(content: &str, json: bool) -> anyhow::Result<JobConfig> {
    let config = if json {
        serde_json::from_str(content).context("Invalid JSON job file")?
    } else {
        toml::from_str(content).context("Invalid TOML job file")?
    };
    Ok(config)
}

/// Load a job file. Files ending in `.json` are read as JSON, anything else
/// as TOML.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    parse_config(&content, json).with_context(|| format!("In {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TELESCOPE: &str = include_str!("../../../demos/telescope.toml");

    #[test]
    fn test_demo_job_parses() {
        let job = parse_config(TELESCOPE, false).unwrap();
        assert_eq!(job.bench.optics.len(), 3);
        assert_eq!(job.tasks.optimize, Some(Optimize::MagicWaist));
        assert!(job.output.save_profile);
    }

    #[test]
    fn test_json_job_with_defaults() {
        let job = parse_config(
            r#"{ "bench": { "version": 1, "wavelength": 1064e-9, "optics": [
                { "id": 0, "type": "create_beam", "waist": [1e-4, 1e-4], "position": 0.0 }
            ] } }"#,
            true,
        )
        .unwrap();
        assert_eq!(job.tasks.samples, 200);
        assert_eq!(job.output.directory, "./output");
        assert!(job.tasks.optimize.is_none());
    }
}
