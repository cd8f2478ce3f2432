//! Server configuration
//!
//! Values are layered: command line, then environment, then the TOML file,
//! then built-in defaults. The result is resolved once at startup and handed
//! to the server; nothing reads the environment afterwards.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hyos_docker::{DockerError, DockerHost};
use hyos_logs::{DEFAULT_LOG_SUFFIX, DEFAULT_TAIL};

const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
const DEFAULT_CONTAINER: &str = "hyos";
const DEFAULT_STATE_DIR: &str = "/data/.state";

pub const ENV_CONTAINER: &str = "HYTALE_CONTAINER_NAME";
pub const ENV_STATE_DIR: &str = "HYTALE_STATE_DIR";
pub const ENV_LOG_DIR: &str = "HYOS_LOG_DIR";
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid listen address '{0}'")]
    Listen(String),

    #[error(transparent)]
    DockerHost(#[from] DockerError),
}

/// Contents of the TOML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<String>,
    pub container_name: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_suffix: Option<String>,
    pub docker_host: Option<String>,
    pub default_tail: Option<usize>,
}

impl FileConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub container_name: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub container_name: String,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_suffix: String,
    pub docker_host: DockerHost,
    pub default_tail: usize,
}

impl ServerConfig {
    /// Layer the sources; `env` looks up an environment variable
    pub fn resolve<E>(file: FileConfig, cli: Overrides, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let listen = cli
            .listen
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen: SocketAddr = listen
            .parse()
            .map_err(|_| ConfigError::Listen(listen.clone()))?;

        let container_name = cli
            .container_name
            .or_else(|| env(ENV_CONTAINER))
            .or(file.container_name)
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

        let state_dir = env(ENV_STATE_DIR)
            .map(PathBuf::from)
            .or(file.state_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

        let log_dir = cli
            .log_dir
            .or_else(|| env(ENV_LOG_DIR).map(PathBuf::from))
            .or(file.log_dir)
            .unwrap_or_else(|| default_log_dir(&state_dir));

        let docker_host = match env(ENV_DOCKER_HOST).or(file.docker_host) {
            Some(value) => DockerHost::parse(&value)?,
            None => DockerHost::default(),
        };

        Ok(Self {
            listen,
            container_name,
            state_dir,
            log_dir,
            log_suffix: file
                .log_suffix
                .unwrap_or_else(|| DEFAULT_LOG_SUFFIX.to_string()),
            docker_host,
            default_tail: file.default_tail.unwrap_or(DEFAULT_TAIL),
        })
    }
}

/// The server writes its logs next to the state directory
fn default_log_dir(state_dir: &Path) -> PathBuf {
    state_dir
        .parent()
        .unwrap_or(state_dir)
        .join("Server")
        .join("logs")
}
