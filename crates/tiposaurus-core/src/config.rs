//! Configuration schema (tiposaurus.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::query::ValueCategory;

/// Database connection settings, consumed by the schema introspection collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,

    #[serde(default)]
    pub password: String,

    pub database: String,

    #[serde(default = "DatabaseConfig::default_port")]
    pub port: u16,
}

impl DatabaseConfig {
    fn default_port() -> u16 {
        3306
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: String::new(),
            database: String::new(),
            port: Self::default_port(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directories searched recursively for `.sql` files
    pub query_dirs: Vec<String>,

    /// Directory generated output is written to
    pub output_dir: String,

    /// Template directory for the external renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,

    /// Line comment prefix that introduces annotations
    #[serde(default = "Config::default_comment_prefix")]
    pub comment_prefix: String,

    /// Database type -> generated type overrides
    #[serde(default)]
    pub custom_types: HashMap<String, String>,

    /// Extra SQL functions for type inference, FUNCTION -> category
    #[serde(default)]
    pub custom_functions: HashMap<String, ValueCategory>,

    /// Connection for schema introspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_dirs: vec!["queries".to_string()],
            output_dir: "generated".to_string(),
            template_dir: None,
            comment_prefix: Self::default_comment_prefix(),
            custom_types: HashMap::new(),
            custom_functions: HashMap::new(),
            database: None,
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Default config file name
    pub const FILE_NAME: &'static str = "tiposaurus.toml";

    fn default_comment_prefix() -> String {
        "--".to_string()
    }

    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject configurations the generator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_dirs.iter().all(|d| d.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "query_dirs must name at least one directory".to_string(),
            ));
        }
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("output_dir must not be empty".to_string()));
        }
        if self.comment_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("comment_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.comment_prefix, "--");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            query_dirs = ["sql/users", "sql/orders"]
            output_dir = "src/generated"
            template_dir = "templates"

            [custom_types]
            json = "Record<string, unknown>"

            [custom_functions]
            SOUNDEX = "string"
            JSON_PRETTY = "json-any"

            [database]
            host = "db.local"
            user = "app"
            database = "shop"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.query_dirs.len(), 2);
        assert_eq!(config.template_dir.as_deref(), Some("templates"));
        assert_eq!(config.comment_prefix, "--");
        assert_eq!(config.custom_functions.get("SOUNDEX"), Some(&ValueCategory::String));
        assert_eq!(config.custom_functions.get("JSON_PRETTY"), Some(&ValueCategory::JsonAny));

        let db = config.database.unwrap();
        assert_eq!(db.port, 3306);
        assert_eq!(db.password, "");
    }

    #[test]
    fn missing_required_fields() {
        let result = Config::from_toml("output_dir = \"out\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn empty_query_dirs_rejected() {
        let result = Config::from_toml("query_dirs = []\noutput_dir = \"out\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_category_rejected() {
        let toml =
            "query_dirs = [\"q\"]\noutput_dir = \"o\"\n[custom_functions]\nFOO = \"decimal\"";
        assert!(matches!(Config::from_toml(toml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Config::FILE_NAME);

        let mut config = Config::default();
        config.custom_functions.insert("SOUNDEX".to_string(), ValueCategory::String);
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.query_dirs, config.query_dirs);
        assert_eq!(loaded.custom_functions, config.custom_functions);
        assert_eq!(loaded.project_root, dir.path());
        assert_eq!(loaded.resolve("queries"), dir.path().join("queries"));
    }
}
