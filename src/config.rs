//! Configuration for oracle synthesis and variant execution.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: fields set directly on [`OracleConfig`]
//! 2. **Environment variables**: values from `MUTORACLE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: [`OracleConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `MUTORACLE_COMPARE_RETURN_VALUES` | `bool` | `synthesis.compare_return_values` |
//! | `MUTORACLE_COMPARE_GLOBALS` | `bool` | `synthesis.compare_globals` |
//! | `MUTORACLE_COMPARE_FRAGMENTS` | `bool` | `synthesis.compare_fragments` |
//! | `MUTORACLE_COALESCE_VALUE_ASSERTIONS` | `bool` | `synthesis.coalesce_value_assertions` |
//! | `MUTORACLE_MAX_MUTANTS` | `usize` | `driver.max_mutants` |
//! | `MUTORACLE_ISOLATE_PANICS` | `bool` | `driver.isolate_panics` |

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Environment variable name for return-value comparison.
pub const ENV_COMPARE_RETURN_VALUES: &str = "MUTORACLE_COMPARE_RETURN_VALUES";
/// Environment variable name for module-global comparison.
pub const ENV_COMPARE_GLOBALS: &str = "MUTORACLE_COMPARE_GLOBALS";
/// Environment variable name for object/class fragment comparison.
pub const ENV_COMPARE_FRAGMENTS: &str = "MUTORACLE_COMPARE_FRAGMENTS";
/// Environment variable name for consecutive value-assertion coalescing.
pub const ENV_COALESCE_VALUE_ASSERTIONS: &str = "MUTORACLE_COALESCE_VALUE_ASSERTIONS";
/// Environment variable name for the mutant cap.
pub const ENV_MAX_MUTANTS: &str = "MUTORACLE_MAX_MUTANTS";
/// Environment variable name for panic isolation.
pub const ENV_ISOLATE_PANICS: &str = "MUTORACLE_ISOLATE_PANICS";

/// Which parts of the captured state the synthesizer diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SynthesisConfig {
    /// Diff statement return values.
    pub compare_return_values: bool,
    /// Diff module globals.
    pub compare_globals: bool,
    /// Diff class-field and object-attribute fragments.
    pub compare_fragments: bool,
    /// Suppress a value assertion equal to the one emitted just before it
    /// at the same position.
    pub coalesce_value_assertions: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            compare_return_values: true,
            compare_globals: true,
            compare_fragments: true,
            coalesce_value_assertions: true,
        }
    }
}

/// Execution driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Run at most this many mutants, in the order given.
    pub max_mutants: Option<usize>,
    /// Catch executor panics per test case instead of unwinding through the driver.
    ///
    /// Debugging only: with `false` the first executor panic aborts the whole
    /// run, which keeps the original backtrace. Crash isolation per
    /// `(variant, test)` pair only holds with the default `true`.
    pub isolate_panics: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_mutants: None,
            isolate_panics: true,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Driver settings.
    pub driver: DriverConfig,
}

impl OracleConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

/// Apply environment variable overrides to an [`OracleConfig`].
///
/// Only variables that are set are applied. A set but unparseable variable
/// is an [`ErrorKind::Config`] error.
pub fn apply_env_overrides(config: &mut OracleConfig) -> Result<()> {
    apply_env_overrides_from(config, |name| std::env::var(name).ok())
}

/// Like [`apply_env_overrides`], reading variables through `lookup`.
pub fn apply_env_overrides_from<F>(config: &mut OracleConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_COMPARE_RETURN_VALUES) {
        config.synthesis.compare_return_values = parse_bool(ENV_COMPARE_RETURN_VALUES, &val)?;
    }
    if let Some(val) = lookup(ENV_COMPARE_GLOBALS) {
        config.synthesis.compare_globals = parse_bool(ENV_COMPARE_GLOBALS, &val)?;
    }
    if let Some(val) = lookup(ENV_COMPARE_FRAGMENTS) {
        config.synthesis.compare_fragments = parse_bool(ENV_COMPARE_FRAGMENTS, &val)?;
    }
    if let Some(val) = lookup(ENV_COALESCE_VALUE_ASSERTIONS) {
        config.synthesis.coalesce_value_assertions =
            parse_bool(ENV_COALESCE_VALUE_ASSERTIONS, &val)?;
    }
    if let Some(val) = lookup(ENV_MAX_MUTANTS) {
        config.driver.max_mutants = Some(parse_usize(ENV_MAX_MUTANTS, &val)?);
    }
    if let Some(val) = lookup(ENV_ISOLATE_PANICS) {
        config.driver.isolate_panics = parse_bool(ENV_ISOLATE_PANICS, &val)?;
    }
    Ok(())
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize> {
    val.trim().parse::<usize>().map_err(|e| {
        Error::new(ErrorKind::Config).with_context(format!(
            "invalid value for {var_name}: expected unsigned integer, got {val:?} ({e})"
        ))
    })
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::new(ErrorKind::Config).with_context(format!(
            "invalid value for {var_name}: expected bool (true/false/1/0/yes/no), got {val:?}"
        ))),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable configuration.
///
/// ```toml
/// [synthesis]
/// compare_globals = false
/// coalesce_value_assertions = true
///
/// [driver]
/// max_mutants = 50
/// ```
#[cfg(feature = "config-file")]
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct OracleTomlConfig {
    /// Synthesis settings.
    #[serde(default)]
    pub synthesis: SynthesisToml,
    /// Driver settings.
    #[serde(default)]
    pub driver: DriverToml,
}

/// Synthesis section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct SynthesisToml {
    /// Diff statement return values.
    pub compare_return_values: Option<bool>,
    /// Diff module globals.
    pub compare_globals: Option<bool>,
    /// Diff fragments.
    pub compare_fragments: Option<bool>,
    /// Coalesce consecutive equal value assertions.
    pub coalesce_value_assertions: Option<bool>,
}

/// Driver section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct DriverToml {
    /// Mutant cap.
    pub max_mutants: Option<usize>,
    /// Catch executor panics.
    pub isolate_panics: Option<bool>,
}

/// Apply a parsed TOML config. Only `Some` fields override.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut OracleConfig, toml: &OracleTomlConfig) {
    if let Some(v) = toml.synthesis.compare_return_values {
        config.synthesis.compare_return_values = v;
    }
    if let Some(v) = toml.synthesis.compare_globals {
        config.synthesis.compare_globals = v;
    }
    if let Some(v) = toml.synthesis.compare_fragments {
        config.synthesis.compare_fragments = v;
    }
    if let Some(v) = toml.synthesis.coalesce_value_assertions {
        config.synthesis.coalesce_value_assertions = v;
    }
    if let Some(v) = toml.driver.max_mutants {
        config.driver.max_mutants = Some(v);
    }
    if let Some(v) = toml.driver.isolate_panics {
        config.driver.isolate_panics = v;
    }
}

/// Parse a TOML string into an [`OracleTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<OracleTomlConfig> {
    toml::from_str(toml_str).map_err(|e| {
        Error::new(ErrorKind::Config).with_context(format!("failed to parse TOML config: {e}"))
    })
}

/// Read and parse a TOML file into an [`OracleTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<OracleTomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::new(ErrorKind::Io).with_context(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_toml_str(&content)
}

/// Resolves the full precedence chain: defaults, then `file` (if any), then env.
#[cfg(feature = "config-file")]
pub fn load(file: Option<&std::path::Path>) -> Result<OracleConfig> {
    let mut config = OracleConfig::default();
    if let Some(path) = file {
        apply_toml_config(&mut config, &parse_toml_file(path)?);
    }
    apply_env_overrides(&mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_compare_everything() {
        let config = OracleConfig::default();
        assert!(config.synthesis.compare_return_values);
        assert!(config.synthesis.compare_globals);
        assert!(config.synthesis.compare_fragments);
        assert!(config.synthesis.coalesce_value_assertions);
        assert_eq!(config.driver.max_mutants, None);
        assert!(config.driver.isolate_panics);
    }

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "yes", "ON", " True "] {
            assert!(parse_bool("TEST", v).unwrap(), "{v}");
        }
        for v in ["false", "0", "no", "off"] {
            assert!(!parse_bool("TEST", v).unwrap(), "{v}");
        }
        assert!(parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn env_overrides_apply_only_set_vars() {
        let mut config = OracleConfig::default();
        apply_env_overrides_from(
            &mut config,
            env(&[(ENV_COMPARE_GLOBALS, "no"), (ENV_MAX_MUTANTS, "12")]),
        )
        .unwrap();
        assert!(!config.synthesis.compare_globals);
        assert!(config.synthesis.compare_fragments);
        assert_eq!(config.driver.max_mutants, Some(12));
    }

    #[test]
    fn env_override_rejects_garbage() {
        let mut config = OracleConfig::default();
        let err = apply_env_overrides_from(&mut config, env(&[(ENV_MAX_MUTANTS, "lots")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains(ENV_MAX_MUTANTS));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: OracleConfig =
            serde_json::from_str(r#"{"synthesis": {"compare_fragments": false}}"#).unwrap();
        assert!(!config.synthesis.compare_fragments);
        assert!(config.synthesis.compare_globals);
        assert!(config.driver.isolate_panics);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_file_overrides_defaults() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[synthesis]\ncoalesce_value_assertions = false\n\n[driver]\nmax_mutants = 3"
        )
        .unwrap();

        let parsed = parse_toml_file(file.path()).unwrap();
        let mut config = OracleConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert!(!config.synthesis.coalesce_value_assertions);
        assert_eq!(config.driver.max_mutants, Some(3));
        assert!(config.synthesis.compare_return_values);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_rejects_unknown_keys() {
        let err = parse_toml_str("[driver]\nthreads = 4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
