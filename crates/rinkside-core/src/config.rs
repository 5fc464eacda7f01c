// Configuration loading and parsing (league.toml, server.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pool::Tier;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub credentials: CredentialsConfig,
    pub ws_port: u16,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// Copied onto each new draft at creation.
    #[serde(default = "default_rounds_per_draft")]
    pub rounds_per_draft: u32,
    /// Tier assigned to registered players without a rating row.
    #[serde(default = "default_baseline_tier")]
    pub baseline_tier: Tier,
    #[serde(default = "default_min_teams")]
    pub min_teams: usize,
}

fn default_rounds_per_draft() -> u32 {
    10
}

fn default_baseline_tier() -> Tier {
    Tier::C
}

fn default_min_teams() -> usize {
    2
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    websocket: WebsocketSection,
    database: DatabaseSection,
    #[serde(default)]
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPaths {
    /// CSV snapshot read by the rating refresher. No refresh when absent.
    pub ratings: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub notify_webhook_url: Option<String>,
    pub notify_webhook_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml`,
/// `config/server.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    let server_path = config_dir.join("server.toml");
    let server_text = read_file(&server_path)?;
    let server_file: ServerFile =
        toml::from_str(&server_text).map_err(|e| ConfigError::ParseError {
            path: server_path.clone(),
            source: e,
        })?;

    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: league_file.league,
        credentials,
        ws_port: server_file.websocket.port,
        db_path: server_file.database.path,
        data_paths: server_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.name".into(),
            message: "must not be empty".into(),
        });
    }

    if config.league.rounds_per_draft == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.rounds_per_draft".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.league.min_teams < 2 {
        return Err(ConfigError::ValidationError {
            field: "league.min_teams".into(),
            message: format!("must be at least 2, got {}", config.league.min_teams),
        });
    }

    if config.ws_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "websocket.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if let Some(url) = &config.credentials.notify_webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                field: "credentials.notify_webhook_url".into(),
                message: format!("must be an http(s) URL, got {url}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The repository root, where `defaults/` lives.
    fn project_root() -> PathBuf {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(
            root.join("defaults").exists(),
            "Cannot locate defaults/ directory from {root:?}"
        );
        root
    }

    /// Fresh temp dir with a `config/` holding the default server.toml.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/server.toml"),
            tmp.join("config/server.toml"),
        )
        .unwrap();
        tmp
    }

    #[test]
    fn load_valid_config_from_default_files() {
        let tmp = std::env::temp_dir().join("rinkside_config_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        let root = project_root();
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        for file in ["league.toml", "server.toml"] {
            fs::copy(root.join("defaults").join(file), tmp.join("defaults").join(file)).unwrap();
        }

        let copied = ensure_config_files(&tmp).expect("should copy default configs");
        assert_eq!(copied.len(), 2);
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.league.name, "Thursday Night Rec Hockey");
        assert_eq!(config.league.rounds_per_draft, 10);
        assert_eq!(config.league.baseline_tier, Tier::C);
        assert_eq!(config.league.min_teams, 2);
        assert_eq!(config.ws_port, 9100);
        assert_eq!(config.db_path, "rinkside.db");
        assert_eq!(
            config.data_paths.ratings.as_deref(),
            Some("data/ratings.csv")
        );
        assert!(config.credentials.notify_webhook_url.is_none());

        // Second run copies nothing and keeps edits.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn league_defaults_fill_missing_fields() {
        let tmp = scratch("rinkside_config_league_defaults");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nname = \"Minimal\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.league.rounds_per_draft, 10);
        assert_eq!(config.league.baseline_tier, Tier::C);
        assert_eq!(config.league.min_teams, 2);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_webhook() {
        let tmp = scratch("rinkside_config_with_creds");
        fs::copy(
            project_root().join("defaults/league.toml"),
            tmp.join("config/league.toml"),
        )
        .unwrap();
        fs::write(
            tmp.join("config/credentials.toml"),
            "notify_webhook_url = \"https://hooks.example.com/draft\"\nnotify_webhook_token = \"t0k\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load with credentials.toml");
        assert_eq!(
            config.credentials.notify_webhook_url.as_deref(),
            Some("https://hooks.example.com/draft")
        );
        assert_eq!(config.credentials.notify_webhook_token.as_deref(), Some("t0k"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_rounds() {
        let tmp = scratch("rinkside_config_zero_rounds");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nname = \"Test\"\nrounds_per_draft = 0\n",
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "league.rounds_per_draft");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_single_team_league() {
        let tmp = scratch("rinkside_config_one_team");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nname = \"Test\"\nmin_teams = 1\n",
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "league.min_teams"
        ));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_baseline_tier() {
        let tmp = scratch("rinkside_config_bad_tier");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nname = \"Test\"\nbaseline_tier = \"Z\"\n",
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_http_webhook() {
        let tmp = scratch("rinkside_config_bad_webhook");
        fs::copy(
            project_root().join("defaults/league.toml"),
            tmp.join("config/league.toml"),
        )
        .unwrap();
        fs::write(
            tmp.join("config/credentials.toml"),
            "notify_webhook_url = \"ftp://nope\"\n",
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "credentials.notify_webhook_url"
        ));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_league_file_is_reported() {
        let tmp = scratch("rinkside_config_missing_league");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_without_defaults_or_config_fails() {
        let tmp = std::env::temp_dir().join("rinkside_config_empty_dir");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        let err = ensure_config_files(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }
}
