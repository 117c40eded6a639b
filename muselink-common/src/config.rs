//! Configuration loading and root folder resolution
//!
//! Every value resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Tiers 1 and 2 are merged by the binary's argument parser before they
//! reach [`ServerConfig::resolve`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "muselink.db";

/// On-disk TOML configuration
///
/// ```toml
/// root_folder = "/srv/muselink"
/// host = "0.0.0.0"
/// port = 8080
///
/// [logging]
/// level = "debug"
///
/// [admin]
/// email = "admin@muselink.com"
/// password = "change-me"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: Option<String>,
}

/// Admin account created at startup if missing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: Option<String>,
    pub admin: Option<AdminConfig>,
}

impl ServerConfig {
    /// Merge CLI/env overrides over the TOML file over compiled defaults
    pub fn resolve(cli: CliOverrides, toml_config: TomlConfig) -> Result<Self> {
        let root_folder = cli
            .root_folder
            .or(toml_config.root_folder)
            .unwrap_or_else(get_default_root_folder);

        let host = cli
            .host
            .or(toml_config.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }

        // Admin credentials only count when both halves come from the same tier
        let admin = match (cli.admin_email, cli.admin_password) {
            (Some(email), Some(password)) => Some(AdminConfig {
                email,
                password,
                name: toml_config
                    .admin
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or_else(default_admin_name),
            }),
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Config(
                    "admin email and admin password must be given together".to_string(),
                ))
            }
            (None, None) => toml_config.admin,
        };

        Ok(Self {
            root_folder,
            host,
            port,
            log_level: toml_config.logging.level,
            admin,
        })
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_root_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}

/// Load a TOML config file
///
/// An explicitly requested file must exist. When no file is requested the
/// platform default location is tried, and a missing file yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_file() {
            Some(path) => path,
            None => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate the platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("muselink").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/muselink/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/muselink (or /var/lib/muselink for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("muselink"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/muselink"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("muselink"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/muselink"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("muselink"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\muselink"))
    } else {
        PathBuf::from("./muselink_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            ..Default::default()
        };
        let cli = CliOverrides {
            root_folder: Some(PathBuf::from("/from/cli")),
            port: Some(9100),
            ..Default::default()
        };

        let config = ServerConfig::resolve(cli, toml_config).unwrap();
        assert_eq!(config.root_folder, PathBuf::from("/from/cli"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = ServerConfig::resolve(CliOverrides::default(), TomlConfig::default()).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.admin.is_none());
        assert!(config.database_path().ends_with(DATABASE_FILE_NAME));
    }

    #[test]
    fn test_half_admin_credentials_rejected() {
        let cli = CliOverrides {
            admin_email: Some("admin@muselink.com".to_string()),
            ..Default::default()
        };
        let result = ServerConfig::resolve(cli, TomlConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_parsing() {
        let content = r#"
            root_folder = "/srv/muselink"
            port = 8080

            [logging]
            level = "debug"

            [admin]
            email = "admin@muselink.com"
            password = "secret"
        "#;
        let parsed: TomlConfig = toml::from_str(content).unwrap();
        assert_eq!(parsed.port, Some(8080));
        assert_eq!(parsed.logging.level.as_deref(), Some("debug"));
        let admin = parsed.admin.unwrap();
        assert_eq!(admin.name, "Administrator");
        assert_eq!(admin.password, "secret");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = load_toml_config(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
