use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use taskpilot::agents::factory::AgentConfig;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceSettings {
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            archive_path: default_archive_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_bridge_filter")]
    pub bridge_filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            bridge_filter: default_bridge_filter(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("workspace.dir", default_workspace_dir().to_string_lossy().to_string())?
            .set_default(
                "workspace.archive_path",
                default_archive_path().to_string_lossy().to_string(),
            )?
            .set_default("logging.bridge_filter", default_bridge_filter())?
            .add_source(
                Environment::with_prefix("TASKPILOT")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("agent.args")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(field) = missing_field(&error_str) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

// Extract `type` from "missing field `type`"
fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.split('`').next()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("workspace_backup.zip")
}

fn default_bridge_filter() -> String {
    "info,taskpilot=off,taskpilot_server=off,tower_http=off,hyper=off,axum=off".to_string()
}
