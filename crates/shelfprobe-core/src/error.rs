use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid run target: {0}")]
    InvalidTarget(String),

    #[error("unknown unit token: {0}")]
    UnknownUnit(String),
}
