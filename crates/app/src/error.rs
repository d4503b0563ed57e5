//! Application error type

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] pairup_core::Error),

    #[error(transparent)]
    Net(#[from] pairup_net::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Onboarding failed: {0}")]
    Onboarding(String),
}
