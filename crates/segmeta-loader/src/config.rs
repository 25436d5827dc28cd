//! Loader configuration

use segmeta_common::{Result, SegmetaError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::format::DEFAULT_SPLIT_BYTES;

// ============================================================================
// Defaults
// ============================================================================

/// Default number of splits read at the same time.
pub const DEFAULT_MAX_CONCURRENT_SPLITS: usize = 4;

/// Default failure policy: abort the run on the first failed split.
pub const DEFAULT_FAIL_FAST: bool = true;

/// Tuple output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated values, one tuple per row
    #[default]
    Tsv,
    /// One JSON object per line
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = SegmetaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "jsonl" | "json" => Ok(OutputFormat::Jsonl),
            _ => Err(SegmetaError::Parse(format!("Invalid output format: {s}"))),
        }
    }
}

/// Settings of the local driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub max_concurrent_splits: usize,
    pub fail_fast: bool,
    pub split_bytes: u64,
    pub output_format: OutputFormat,
    pub include_header: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_splits: DEFAULT_MAX_CONCURRENT_SPLITS,
            fail_fast: DEFAULT_FAIL_FAST,
            split_bytes: DEFAULT_SPLIT_BYTES,
            output_format: OutputFormat::default(),
            include_header: false,
        }
    }
}

impl LoaderConfig {
    /// Load from `.env` and the environment on top of the defaults
    ///
    /// Environment variables:
    /// - `SEGMETA_MAX_CONCURRENT_SPLITS`: positive integer
    /// - `SEGMETA_FAIL_FAST`: true/false
    /// - `SEGMETA_SPLIT_BYTES`: positive integer
    /// - `SEGMETA_OUTPUT_FORMAT`: tsv, jsonl
    /// - `SEGMETA_INCLUDE_HEADER`: true/false
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("SEGMETA_MAX_CONCURRENT_SPLITS") {
            config.max_concurrent_splits = parse_positive("SEGMETA_MAX_CONCURRENT_SPLITS", &v)?;
        }

        if let Some(v) = lookup("SEGMETA_FAIL_FAST") {
            config.fail_fast = v
                .parse()
                .map_err(|_| SegmetaError::invalid_env("SEGMETA_FAIL_FAST", &v, "boolean"))?;
        }

        if let Some(v) = lookup("SEGMETA_SPLIT_BYTES") {
            config.split_bytes = parse_positive::<u64>("SEGMETA_SPLIT_BYTES", &v)?;
        }

        if let Some(v) = lookup("SEGMETA_OUTPUT_FORMAT") {
            config.output_format = v.parse()?;
        }

        if let Some(v) = lookup("SEGMETA_INCLUDE_HEADER") {
            config.include_header = v
                .parse()
                .map_err(|_| SegmetaError::invalid_env("SEGMETA_INCLUDE_HEADER", &v, "boolean"))?;
        }

        Ok(config)
    }
}

fn parse_positive<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(SegmetaError::invalid_env(name, value, "positive integer")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = LoaderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.max_concurrent_splits, 4);
        assert!(config.fail_fast);
        assert_eq!(config.output_format, OutputFormat::Tsv);
    }

    #[test]
    fn test_env_overrides() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("SEGMETA_MAX_CONCURRENT_SPLITS", "16"),
            ("SEGMETA_FAIL_FAST", "false"),
            ("SEGMETA_SPLIT_BYTES", "1024"),
            ("SEGMETA_OUTPUT_FORMAT", "JSONL"),
            ("SEGMETA_INCLUDE_HEADER", "true"),
        ]))
        .unwrap();

        assert_eq!(config.max_concurrent_splits, 16);
        assert!(!config.fail_fast);
        assert_eq!(config.split_bytes, 1024);
        assert_eq!(config.output_format, OutputFormat::Jsonl);
        assert!(config.include_header);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("SEGMETA_MAX_CONCURRENT_SPLITS", "0")],
            [("SEGMETA_MAX_CONCURRENT_SPLITS", "many")],
            [("SEGMETA_FAIL_FAST", "yes")],
            [("SEGMETA_SPLIT_BYTES", "-1")],
        ] {
            let err = LoaderConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, SegmetaError::Config(_)), "{vars:?}");
        }

        let err = LoaderConfig::from_lookup(lookup(&[("SEGMETA_OUTPUT_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, SegmetaError::Parse(_)));
    }
}
