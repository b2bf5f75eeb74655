use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pokeiv_core::core_api::{
    CoreError, DEFAULT_EVOLVE_DELAY, DEFAULT_MAX_EVOLUTIONS, DEFAULT_QUALITY_THRESHOLD,
    DEFAULT_TRANSFER_DELAY, ExecutionConfig, SelectionConfig, SpeciesFilter,
};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Filter(#[from] CoreError),
}

/// Settings read from `config.json`. Every key is optional and values may be
/// written as JSON numbers, booleans or strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(
        rename = "minimumIV",
        alias = "minimum_iv",
        deserialize_with = "lenient_f64"
    )]
    pub minimum_iv: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub hard_minimum: Option<bool>,
    #[serde(deserialize_with = "lenient_u32")]
    pub cp_override: Option<u32>,
    #[serde(deserialize_with = "species_list")]
    pub white_list: Option<Vec<String>>,
    #[serde(deserialize_with = "species_list")]
    pub black_list: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_bool")]
    pub force: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub evolve: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub transfer: Option<bool>,
    #[serde(deserialize_with = "lenient_u32")]
    pub max_evolutions: Option<u32>,
    #[serde(deserialize_with = "lenient_f64")]
    pub evolution_delay: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub transfer_delay: Option<f64>,
}

impl FileConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = FileConfig::from_json_str(&contents)?;
        Ok(config)
    }
}

/// Loads `explicit` when given, else `config.json` from the working directory
/// when one exists.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    if let Some(path) = explicit {
        return FileConfig::from_file(path);
    }
    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        tracing::debug!(path = %fallback.display(), "config.discovered");
        return FileConfig::from_file(fallback);
    }
    Ok(FileConfig::default())
}

/// Values taken from the command line. `None`, `false` and empty lists defer
/// to the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagValues {
    pub minimum_iv: Option<f64>,
    pub hard_minimum: bool,
    pub cp_override: Option<u32>,
    pub white_list: Vec<String>,
    pub black_list: Vec<String>,
    pub force: bool,
    pub evolve: bool,
    pub transfer: bool,
    pub max_evolutions: Option<u32>,
    pub evolution_delay: Option<f64>,
    pub transfer_delay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub selection: SelectionConfig,
    pub execution: ExecutionConfig,
}

pub fn resolve(flags: &FlagValues, file: &FileConfig) -> Result<RunSettings, ConfigError> {
    let quality_threshold = match flags.minimum_iv.or(file.minimum_iv) {
        Some(percent) if percent.is_finite() && percent >= 0.0 => percent / 100.0,
        Some(percent) => {
            return Err(ConfigError::Invalid(format!(
                "minimum IV must be a non-negative percentage, got {percent}"
            )));
        }
        None => DEFAULT_QUALITY_THRESHOLD,
    };

    let pick_list = |flag: &[String], file: &Option<Vec<String>>| {
        if flag.is_empty() {
            file.clone()
        } else {
            Some(flag.to_vec())
        }
    };
    let filter = SpeciesFilter::new(
        pick_list(&flags.white_list, &file.white_list),
        pick_list(&flags.black_list, &file.black_list),
    )?;

    let force = flags.force || file.force.unwrap_or(false);
    let selection = SelectionConfig {
        quality_threshold,
        hard_minimum: flags.hard_minimum || file.hard_minimum.unwrap_or(false),
        power_override: flags.cp_override.or(file.cp_override),
        force,
        filter: filter.clone(),
    };

    let execution = ExecutionConfig {
        evolve: flags.evolve || file.evolve.unwrap_or(false),
        transfer: flags.transfer || file.transfer.unwrap_or(false),
        max_evolutions: flags
            .max_evolutions
            .or(file.max_evolutions)
            .unwrap_or(DEFAULT_MAX_EVOLUTIONS),
        evolve_delay: delay(
            "evolution delay",
            flags.evolution_delay.or(file.evolution_delay),
            DEFAULT_EVOLVE_DELAY,
        )?,
        transfer_delay: delay(
            "transfer delay",
            flags.transfer_delay.or(file.transfer_delay),
            DEFAULT_TRANSFER_DELAY,
        )?,
        force,
        filter,
    };

    Ok(RunSettings {
        selection,
        execution,
    })
}

fn delay(label: &str, seconds: Option<f64>, default: Duration) -> Result<Duration, ConfigError> {
    match seconds {
        None => Ok(default),
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Ok(Duration::from_secs_f64(seconds))
        }
        Some(seconds) => Err(ConfigError::Invalid(format!(
            "{label} must be a non-negative number of seconds, got {seconds}"
        ))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarInput {
    Bool(bool),
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ScalarInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ScalarInput::Number(value)) => Ok(Some(value)),
        Some(ScalarInput::Text(raw)) if raw.trim().is_empty() => Ok(None),
        Some(ScalarInput::Text(raw)) => raw.trim().parse::<f64>().map(Some).map_err(D::Error::custom),
        Some(ScalarInput::Bool(value)) => Err(D::Error::custom(format!(
            "expected a number, got {value}"
        ))),
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = lenient_f64(deserializer)? else {
        return Ok(None);
    };
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(D::Error::custom(format!(
            "expected a whole non-negative number, got {value}"
        )));
    }
    Ok(Some(value as u32))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ScalarInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ScalarInput::Bool(value)) => Ok(Some(value)),
        Some(ScalarInput::Number(value)) => Ok(Some(value != 0.0)),
        Some(ScalarInput::Text(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" | "" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("expected a boolean, got {other:?}"))),
        },
    }
}

fn species_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Number(u32),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListInput {
        List(Vec<Token>),
        Text(String),
    }

    let tokens: Vec<String> = match Option::<ListInput>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(ListInput::Text(raw)) => raw.split(',').map(str::to_string).collect(),
        Some(ListInput::List(items)) => items
            .into_iter()
            .map(|token| match token {
                Token::Number(id) => id.to_string(),
                Token::Text(raw) => raw,
            })
            .collect(),
    };
    let tokens: Vec<String> = tokens
        .into_iter()
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    Ok(if tokens.is_empty() { None } else { Some(tokens) })
}
