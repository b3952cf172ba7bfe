use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::pr::diff::ExclusionSet;

/// Optional TOML file read from the working directory.
pub const CONFIG_FILE: &str = ".patch-generator.toml";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONVERTER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("Invalid value for {name}: expected a number of seconds, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Shape of `.patch-generator.toml`. Every field is optional; environment
/// variables and `.env` files take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub jira: JiraSection,
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub converter: ConverterSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Custom field holding the linked pull request URLs, e.g. `customfield_12345`.
    pub pull_request_field: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubSection {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConverterSection {
    pub command: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSection {
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSection {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub pull_request_field: String,
}

/// Resolved, validated configuration. Built once at startup and passed to
/// the clients and the pipeline by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub jira: JiraConfig,
    pub github_token: String,
    pub converter_command: String,
    pub excluded_paths: ExclusionSet,
    pub http_timeout: Duration,
    pub converter_timeout: Duration,
}

impl Config {
    /// Load configuration from the working directory and the environment.
    ///
    /// Precedence, lowest first: `.patch-generator.toml`, process environment,
    /// `./.env`, `$HOME/.env`.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        let file = if path.exists() {
            Self::load_file(path)?
        } else {
            FileConfig::default()
        };

        let mut vars: HashMap<String, String> = std::env::vars().collect();
        let mut env_files = vec![PathBuf::from(".env")];
        if let Some(home) = std::env::var_os("HOME") {
            env_files.push(PathBuf::from(home).join(".env"));
        }
        for env_file in env_files {
            if env_file.exists() {
                vars.extend(read_env_file(&env_file)?);
            }
        }

        Self::resolve(file, &vars)
    }

    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Merge the file config with a variable map and validate the result.
    pub fn resolve(file: FileConfig, vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let var = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut require = |name: &str, fallback: Option<String>| {
            let value = var(name).or(fallback.filter(|v| !v.trim().is_empty()));
            if value.is_none() {
                missing.push(name.to_string());
            }
            value.unwrap_or_default()
        };

        let host = require("JIRA_HOST", file.jira.host);
        let user = require("JIRA_USER", file.jira.user);
        let password = require("JIRA_PASS", file.jira.password);
        let github_token = require("GIT_TOKEN", file.github.token);
        let pull_request_field = require("JIRA_FIELD_PULL_REQUEST", file.jira.pull_request_field);
        let converter_command = require("CONVERTER", file.converter.command);

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let excluded_paths = match var("EXCLUDED_PATHS") {
            Some(csv) => ExclusionSet::parse(&csv),
            None => ExclusionSet::new(file.filter.excluded_paths),
        };

        let http_timeout = seconds(
            "HTTP_TIMEOUT_SECS",
            var("HTTP_TIMEOUT_SECS"),
            file.http.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        )?;
        let converter_timeout = seconds(
            "CONVERTER_TIMEOUT_SECS",
            var("CONVERTER_TIMEOUT_SECS"),
            file.converter.timeout_secs.unwrap_or(DEFAULT_CONVERTER_TIMEOUT_SECS),
        )?;

        debug!(
            jira_host = %host,
            excluded_paths = excluded_paths.len(),
            "configuration resolved"
        );

        Ok(Config {
            jira: JiraConfig {
                host: host.trim_end_matches('/').to_string(),
                user,
                password,
                pull_request_field,
            },
            github_token,
            converter_command,
            excluded_paths,
            http_timeout,
            converter_timeout,
        })
    }
}

fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let env_error = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(env_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(env_error)
}

fn seconds(name: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match value {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidNumber { name, value: raw })?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vars() -> HashMap<String, String> {
        [
            ("JIRA_HOST", "https://jira.example.com/"),
            ("JIRA_USER", "test"),
            ("JIRA_PASS", "secret"),
            ("GIT_TOKEN", "ghp_test"),
            ("JIRA_FIELD_PULL_REQUEST", "customfield_12345"),
            ("CONVERTER", "vendor/bin/convert-patch"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_resolve_from_vars() {
        let config = Config::resolve(FileConfig::default(), &full_vars()).unwrap();
        assert_eq!(config.jira.host, "https://jira.example.com");
        assert_eq!(config.jira.pull_request_field, "customfield_12345");
        assert_eq!(config.github_token, "ghp_test");
        assert!(config.excluded_paths.is_empty());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.converter_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_vars_are_all_reported() {
        let mut vars = full_vars();
        vars.remove("GIT_TOKEN");
        vars.insert("CONVERTER".to_string(), "   ".to_string());

        match Config::resolve(FileConfig::default(), &vars) {
            Err(ConfigError::MissingVars(names)) => {
                assert_eq!(names, vec!["GIT_TOKEN".to_string(), "CONVERTER".to_string()]);
            }
            other => panic!("expected MissingVars, got {:?}", other),
        }
    }

    #[test]
    fn test_vars_override_file() {
        let toml_str = r#"
[jira]
host = "https://old-jira.example.com"
user = "file-user"

[converter]
timeout_secs = 10

[filter]
excluded_paths = ["Test/"]
"#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();
        let mut vars = full_vars();
        vars.remove("JIRA_USER");
        vars.insert("EXCLUDED_PATHS".to_string(), "tests/, Test/ ,,".to_string());

        let config = Config::resolve(file, &vars).unwrap();
        assert_eq!(config.jira.host, "https://jira.example.com");
        assert_eq!(config.jira.user, "file-user");
        assert_eq!(config.converter_timeout, Duration::from_secs(10));
        assert_eq!(config.excluded_paths.as_slice(), ["tests/", "Test/"]);
    }

    #[test]
    fn test_invalid_timeout() {
        let mut vars = full_vars();
        vars.insert("HTTP_TIMEOUT_SECS".to_string(), "soon".to_string());
        assert!(matches!(
            Config::resolve(FileConfig::default(), &vars),
            Err(ConfigError::InvalidNumber { name: "HTTP_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_read_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "JIRA_USER=alice\nGIT_TOKEN=\"quoted token\"\n").unwrap();

        let vars: HashMap<_, _> = read_env_file(&path).unwrap().into_iter().collect();
        assert_eq!(vars["JIRA_USER"], "alice");
        assert_eq!(vars["GIT_TOKEN"], "quoted token");
    }
}
