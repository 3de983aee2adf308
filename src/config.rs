use std::fmt;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "triplet_fix";
const ENV_PREFIX: &str = "TRIPLET_FIX";

/// How strictly title lines are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TitleMode {
    /// `<n>.<opinion>_<source>：<title>`: needs `.`, `_` and `：`
    #[default]
    #[serde(alias = "1")]
    #[value(alias = "1")]
    Standard,
    /// `<n>.<title>`: only the numbered prefix
    #[serde(alias = "2")]
    #[value(alias = "2")]
    Simple,
}

impl fmt::Display for TitleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleMode::Standard => f.write_str("standard"),
            TitleMode::Simple => f.write_str("simple"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("output_suffix must not be empty, repaired copies would overwrite their input")]
    EmptySuffix,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub title_mode: TitleMode,
    /// Rule switch; a disabled rule reports nothing and repairs nothing.
    pub enabled: bool,
    pub skip_corrupted: bool,
    /// Appended to the file stem of repaired copies.
    pub output_suffix: String,
    /// Findings printed per file before collapsing to a count.
    pub max_listed: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            title_mode: TitleMode::Standard,
            enabled: true,
            skip_corrupted: false,
            output_suffix: "_fixed".to_string(),
            max_listed: 10,
        }
    }
}

impl Settings {
    /// Defaults, then `triplet_fix.toml` if present, then `TRIPLET_FIX_*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = with_defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        Ok(())
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Settings::default();
    Ok(Config::builder()
        .set_default("title_mode", defaults.title_mode.to_string())?
        .set_default("enabled", defaults.enabled)?
        .set_default("skip_corrupted", defaults.skip_corrupted)?
        .set_default("output_suffix", defaults.output_suffix)?
        .set_default("max_listed", defaults.max_listed as u64)?)
}
