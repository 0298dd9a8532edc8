use crate::history::DEFAULT_MAX_ENTRIES;
use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_MODEL: &str = "command-r-plus";
pub const DEFAULT_QUESTION_SIGIL: &str = ".question";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cohere_api_key: Option<String>,
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_question_sigil")]
    pub question_sigil: String,
    /// Keep actioning directives after a READ-FILE instead of stopping.
    #[serde(default)]
    pub continue_after_read: bool,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_history_size() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_question_sigil() -> String {
    DEFAULT_QUESTION_SIGIL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cohere_api_key: None,
            use_mock: false,
            model: default_model(),
            history_size: default_history_size(),
            question_sigil: default_question_sigil(),
            continue_after_read: false,
            aliases: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or create default
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override config file
        if let Ok(api_key) = std::env::var("COHERE_API_KEY").or_else(|_| std::env::var("CO_API_KEY")) {
            config.cohere_api_key = Some(api_key);
        }

        if std::env::var("CRUST_USE_MOCK").is_ok() {
            config.use_mock = true;
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config = Self::from_toml(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".crust"))
    }

    /// Location of the persisted command history.
    pub fn history_path() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".crust_history"))
    }

    /// Set API key and save config
    pub fn set_api_key(&mut self, api_key: String) -> Result<()> {
        self.cohere_api_key = Some(api_key);
        self.save()?;
        info!("API key saved to config file");
        Ok(())
    }

    pub fn get_api_key(&self) -> Option<&String> {
        self.cohere_api_key.as_ref()
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    /// Replaces the first word of `line` with its alias, if it has one.
    pub fn expand_alias(&self, line: &str) -> String {
        let trimmed = line.trim_start();
        let (first, rest) = match trimmed.find(char::is_whitespace) {
            Some(idx) => trimmed.split_at(idx),
            None => (trimmed, ""),
        };
        match self.aliases.get(first) {
            Some(expansion) => format!("{expansion}{rest}"),
            None => line.to_string(),
        }
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
            let config = Self::load_from_file()?;
            println!("API Key: {}", if config.cohere_api_key.is_some() { "Set" } else { "Not set" });
            println!("Mock mode: {}", config.use_mock);
            println!("Model: {}", config.model);
            println!("History size: {}", config.history_size);
            println!("Aliases: {}", config.aliases.len());
        } else {
            println!("Status: Not found (using defaults)");
        }

        println!("\nTo set API key:");
        println!("  crust --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export COHERE_API_KEY=<your-key>");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.history_size, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.question_sigil, ".question");
        assert!(!config.continue_after_read);
        assert!(config.cohere_api_key.is_none());
    }

    #[test]
    fn test_parses_aliases_and_overrides() {
        let config = Config::from_toml(
            r#"
            cohere_api_key = "abc"
            history_size = 50
            continue_after_read = true

            [aliases]
            ll = "ls -l"
            py = "python3"
            "#,
        )
        .unwrap();

        assert_eq!(config.get_api_key().map(String::as_str), Some("abc"));
        assert_eq!(config.history_size, 50);
        assert!(config.continue_after_read);
        assert_eq!(config.aliases.get("ll").map(String::as_str), Some("ls -l"));
    }

    #[test]
    fn test_expand_alias_replaces_first_word_only() {
        let mut config = Config::default();
        config.aliases.insert("ll".to_string(), "ls -l".to_string());
        config.aliases.insert("py".to_string(), "python3".to_string());

        assert_eq!(config.expand_alias("ll"), "ls -l");
        assert_eq!(config.expand_alias("py -c 'print(1)'"), "python3 -c 'print(1)'");
        assert_eq!(config.expand_alias("echo ll"), "echo ll");
        assert_eq!(config.expand_alias("lll"), "lll");
    }

    #[test]
    fn test_toml_roundtrip_keeps_aliases() {
        let mut config = Config::default();
        config.aliases.insert("md".to_string(), "mkdir".to_string());

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&text).unwrap();

        assert_eq!(parsed.aliases, config.aliases);
    }
}
