use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

const ENV_PREFIX: &str = "TASKPILOT";

// Serde only reports the leaf name of a missing field
fn qualify(field: &str) -> &str {
    match field {
        "agent" | "type" => "agent.type",
        "program" => "agent.program",
        other => other,
    }
}

/// Map a configuration field to the environment variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        qualify(field).to_uppercase().replace('.', "__")
    )
}
