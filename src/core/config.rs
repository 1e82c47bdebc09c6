use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::core::conversation::DEFAULT_REGENERATE_DEBOUNCE;
use crate::core::prompt::{parse_attribute_list, ComparisonAttribute, Language, PromptSettings};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Environment variables checked, in order, for the endpoint API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Gemini model id
    pub model: Option<String>,
    /// API base URL, without the `models/...` suffix
    pub base_url: Option<String>,
    /// Answer language (VN, EN or KR)
    pub language: Option<Language>,
    /// Columns requested for comparison tables
    pub comparison_attributes: Option<Vec<ComparisonAttribute>>,
    /// Let the model use web search grounding
    pub search: Option<bool>,
    /// Delay before regenerating after a settings change
    pub regenerate_debounce_ms: Option<u64>,
    /// Directory for table exports; defaults to the working directory
    pub export_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn StdError>> {
        Self::load_from_path(&Self::get_config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn StdError>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.to_path_buf(),
                source,
            })?;
            let config: Config =
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn StdError>> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf, Box<dyn StdError>> {
        let proj_dirs = ProjectDirs::from("org", "sweetscout", "sweetscout")
            .ok_or("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn search_enabled(&self) -> bool {
        self.search.unwrap_or(true)
    }

    pub fn regenerate_debounce(&self) -> Duration {
        self.regenerate_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REGENERATE_DEBOUNCE)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn prompt_settings(&self) -> PromptSettings {
        PromptSettings {
            language: self.language.unwrap_or_default(),
            attributes: self
                .comparison_attributes
                .clone()
                .unwrap_or_else(ComparisonAttribute::defaults),
        }
    }

    /// Reads the API key from the environment.
    pub fn api_key_from_env() -> Option<String> {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    /// Applies `sweetscout set <key> <value>`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            "model" => self.model = Some(value.to_string()),
            "base-url" => self.base_url = Some(value.to_string()),
            "language" => self.language = Some(value.parse()?),
            "attributes" => self.comparison_attributes = Some(parse_attribute_list(value)?),
            "search" => self.search = Some(parse_bool(value)?),
            "regenerate-debounce-ms" => {
                let ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid number of milliseconds: {value}"))?;
                self.regenerate_debounce_ms = Some(ms);
            }
            "export-dir" => self.export_dir = Some(PathBuf::from(value)),
            _ => return Err(format!("unknown config key: {key}")),
        }
        Ok(())
    }

    /// Applies `sweetscout unset <key>`.
    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        match key {
            "model" => self.model = None,
            "base-url" => self.base_url = None,
            "language" => self.language = None,
            "attributes" => self.comparison_attributes = None,
            "search" => self.search = None,
            "regenerate-debounce-ms" => self.regenerate_debounce_ms = None,
            "export-dir" => self.export_dir = None,
            _ => return Err(format!("unknown config key: {key}")),
        }
        Ok(())
    }

    pub fn print_all(&self) {
        let settings = self.prompt_settings();
        println!("Current configuration:");
        println!("  model: {}", self.model());
        println!("  base-url: {}", self.base_url());
        println!("  language: {}", settings.language);
        let attributes: Vec<&str> = settings.attributes.iter().map(|a| a.key()).collect();
        println!("  attributes: {}", attributes.join(","));
        println!(
            "  search: {}",
            if self.search_enabled() { "on" } else { "off" }
        );
        println!(
            "  regenerate-debounce-ms: {}",
            self.regenerate_debounce().as_millis()
        );
        println!("  export-dir: {}", self.export_dir().display());
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on/off, got: {value}")),
    }
}
