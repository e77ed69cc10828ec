//! Verifier configuration with TOML file support and environment overrides.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::universe::CodeUniverse;
use crate::verifier::{Policy, Verifier};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "ticket-verifier.toml";

/// Widest code that still fits a u64 range end
const MAX_CODE_WIDTH: usize = 18;

/// Most codes a generated universe may hold
pub const MAX_RANGE_SIZE: u64 = 10_000_000;

const ENV_PREFIX: &str = "VERIFIER_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Validation policy: "ticket" or "lookup".
    #[serde(default)]
    pub policy: Policy,

    /// First number of the generated universe.
    #[serde(default = "default_range_start")]
    pub range_start: u64,

    /// Last number of the generated universe (inclusive).
    #[serde(default = "default_range_end")]
    pub range_end: u64,

    /// Zero-padded width of generated codes.
    #[serde(default = "default_code_width")]
    pub code_width: usize,

    /// Load the universe from this file instead of generating it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe_file: Option<PathBuf>,

    /// Maximum number of history entries kept for display.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Log level filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where the interactive UI writes its logs.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File of codes replayed as scanner detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_file: Option<PathBuf>,

    /// Delay between replayed detections.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Close the scanner after the first forwarded detection.
    #[serde(default)]
    pub close_on_detect: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_range_start() -> u64 {
    1
}

fn default_range_end() -> u64 {
    20000
}

fn default_code_width() -> usize {
    5
}

fn default_history_limit() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("ticket-verifier.log")
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            replay_file: None,
            interval_ms: default_interval_ms(),
            close_on_detect: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            policy: Policy::default(),
            range_start: default_range_start(),
            range_end: default_range_end(),
            code_width: default_code_width(),
            universe_file: None,
            history_limit: default_history_limit(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            scanner: ScannerConfig::default(),
        }
    }
}

impl Config {
    /// Explicit path, else `ticket-verifier.toml` if present, else defaults;
    /// then environment overrides and validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `VERIFIER_*` variables win over file values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(policy) = env_parse::<Policy>("VERIFIER_POLICY")? {
            self.policy = policy;
        }
        if let Some(start) = env_parse("VERIFIER_RANGE_START")? {
            self.range_start = start;
        }
        if let Some(end) = env_parse("VERIFIER_RANGE_END")? {
            self.range_end = end;
        }
        if let Some(width) = env_parse("VERIFIER_CODE_WIDTH")? {
            self.code_width = width;
        }
        if let Some(limit) = env_parse("VERIFIER_HISTORY_LIMIT")? {
            self.history_limit = limit;
        }
        if let Ok(path) = env::var("VERIFIER_UNIVERSE_FILE") {
            self.universe_file = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("VERIFIER_LOG_FILE") {
            self.log_file = PathBuf::from(path);
        }
        if let Ok(path) = env::var("VERIFIER_REPLAY_FILE") {
            self.scanner.replay_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.range_start > self.range_end {
            bail!(
                "range_start ({}) must not exceed range_end ({})",
                self.range_start,
                self.range_end
            );
        }
        if self.code_width == 0 || self.code_width > MAX_CODE_WIDTH {
            bail!("code_width must be between 1 and {}", MAX_CODE_WIDTH);
        }
        if self.range_end.to_string().len() > self.code_width {
            bail!(
                "range_end {} does not fit in {} digits",
                self.range_end,
                self.code_width
            );
        }
        if self.range_end - self.range_start >= MAX_RANGE_SIZE {
            bail!(
                "range {}..={} holds more than {} codes",
                self.range_start,
                self.range_end,
                MAX_RANGE_SIZE
            );
        }
        if self.history_limit == 0 {
            bail!("history_limit must be at least 1");
        }
        Ok(())
    }

    /// Settings that are accepted but have no effect
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.policy == Policy::Ticket && self.universe_file.is_some() {
            warnings.push("universe_file is ignored by the ticket policy".to_string());
        }
        warnings
    }

    /// Log environment overrides and warnings; call once logging is up
    pub fn log_startup(&self) {
        for (key, value) in env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)) {
            info!("{key} set from environment: {value}");
        }
        for warning in self.warnings() {
            warn!("{warning}");
        }
        info!(policy = %self.policy, history_limit = self.history_limit, "configuration loaded");
    }

    pub fn build_universe(&self) -> Result<CodeUniverse> {
        match &self.universe_file {
            Some(path) => {
                let universe = CodeUniverse::from_file(path)?;
                info!(path = %path.display(), codes = universe.len(), "universe loaded from file");
                Ok(universe)
            }
            None => Ok(CodeUniverse::from_range(
                self.range_start,
                self.range_end,
                self.code_width,
            )),
        }
    }

    /// The ticket policy never consults the universe, so none is built
    pub fn build_verifier(&self) -> Result<Verifier> {
        let universe = match self.policy {
            Policy::Ticket => CodeUniverse::from_codes(Vec::<String>::new()),
            Policy::Lookup => self.build_universe()?,
        };
        Ok(Verifier::new(self.policy, universe))
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(e) => bail!("Invalid {key} value '{raw}': {e}"),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = Config::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = Config::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.policy, Policy::Ticket);
        assert_eq!(config.range_end, 20000);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.scanner.interval_ms, 1000);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            policy = "lookup"
            range_end = 500

            [scanner]
            close_on_detect = true
        "#;
        let config = Config::from_toml_str(toml).expect("should parse");
        assert_eq!(config.policy, Policy::Lookup);
        assert_eq!(config.range_end, 500);
        assert_eq!(config.range_start, 1);
        assert!(config.scanner.close_on_detect);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Config::from_toml_str(r#"policy = "serial""#).is_err());
    }

    #[test]
    fn missing_file_is_error() {
        assert!(Config::from_toml_file(Path::new("/nonexistent/verifier.toml")).is_err());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let config = Config {
            range_start: 10,
            range_end: 5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_narrow_width() {
        let config = Config {
            range_end: 123456,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_history() {
        let config = Config {
            history_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_range() {
        let config = Config {
            range_start: 0,
            range_end: 999_999_999_999_999_999,
            code_width: 18,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            range_start: 1,
            range_end: MAX_RANGE_SIZE,
            code_width: 8,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ticket_policy_builds_no_universe() {
        let config = Config {
            universe_file: Some(PathBuf::from("/nonexistent/codes.csv")),
            ..Config::default()
        };
        let verifier = config.build_verifier().expect("ticket policy skips the universe");
        assert!(verifier.universe().is_empty());

        let config = Config {
            policy: Policy::Lookup,
            ..config
        };
        assert!(config.build_verifier().is_err());
    }

    #[test]
    fn ignored_universe_file_is_warned() {
        let config = Config {
            universe_file: Some(PathBuf::from("codes.csv")),
            ..Config::default()
        };
        assert_eq!(config.warnings().len(), 1);

        let config = Config {
            policy: Policy::Lookup,
            ..config
        };
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn universe_file_takes_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A-1").unwrap();
        writeln!(file, "A-2").unwrap();

        let config = Config {
            policy: Policy::Lookup,
            universe_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };

        let universe = config.build_universe().unwrap();
        assert_eq!(universe.len(), 2);
        assert!(universe.contains("A-2"));
    }

    #[test]
    fn generated_universe_follows_range() {
        let config = Config {
            range_start: 5,
            range_end: 9,
            code_width: 3,
            ..Config::default()
        };
        let universe = config.build_universe().unwrap();
        let codes: Vec<&str> = universe.iter().collect();
        assert_eq!(codes, vec!["005", "006", "007", "008", "009"]);
    }
}
