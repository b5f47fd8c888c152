use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncReadExt};
use tracing::debug;

pub const CONFIG_ENV_VAR: &str = "REQ_INSPECT_CONFIG";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub concurrency_limit: usize,
    pub behind_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            concurrency_limit: 1,
            behind_proxy: false,
        }
    }
}

/// `file = true` logs to the default path, `file = "some/path.log"` to that path.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FileEnum {
    Boolean(bool),
    Path(String),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub stderr: bool,
    pub file: FileEnum,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            stderr: true,
            file: FileEnum::Boolean(false),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: Default::default(),
            logging: Default::default(),
            max_body_size: 10_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum FindConfigError {
    #[error("No configuration file found")]
    NoneFoundError,
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub fn parse(source: &str) -> Result<Config> {
    Ok(toml::from_str(source)?)
}

pub async fn load_from(config_file: &Path) -> Result<Config> {
    let mut file = OpenOptions::new()
        .read(true)
        .open(config_file)
        .await
        .with_context(|| format!("opening {}", config_file.display()))?;
    let metadata = file.metadata().await?;
    let mut buf = String::with_capacity(metadata.len() as usize);
    file.read_to_string(&mut buf).await?;
    parse(&buf).with_context(|| format!("parsing {}", config_file.display()))
}

pub async fn load() -> Result<(Config, PathBuf)> {
    let config_file = find_config()?;
    Ok((load_from(&config_file).await?, config_file))
}

pub fn find_config() -> Result<PathBuf, FindConfigError> {
    if let Ok(env_var) = env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(&env_var));
    }

    let config_dir = if cfg!(target_os = "windows") {
        PathBuf::from(&env::var("APPDATA").unwrap_or_default())
    } else {
        match env::var("XDG_CONFIG_HOME") {
            Ok(config_home) => PathBuf::from(&config_home),
            Err(_) => PathBuf::from(&env::var("HOME").unwrap_or_default()).join(".config"),
        }
    };

    let locations = [
        PathBuf::from("config.toml"),
        config_dir.join("req-inspect").join("config.toml"),
        #[cfg(not(target_os = "windows"))]
        PathBuf::from("/")
            .join("etc")
            .join("req-inspect")
            .join("config.toml"),
    ];
    for path in locations {
        debug!("checking if configuration exists at: {}", path.display());
        if fs::metadata(&path).is_ok_and(|metadata| metadata.is_file()) {
            return Ok(path);
        }
    }

    Err(FindConfigError::NoneFoundError)
}
