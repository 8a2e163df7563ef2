use thiserror::Error;

use crate::config::ConfigValidationError;

/// Errors raised while bootstrapping or running an application.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    CommandLine(#[from] clap::Error),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigValidationError),

    #[error(transparent)]
    App(anyhow::Error),
}

impl BootstrapError {
    /// Wrap an error returned while building the app, keeping configuration
    /// problems distinguishable from other failures.
    pub fn from_app(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigValidationError>() {
            Ok(invalid) => BootstrapError::InvalidConfig(invalid),
            Err(err) => match err.downcast::<BootstrapError>() {
                Ok(bootstrap) => bootstrap,
                Err(err) => BootstrapError::App(err),
            },
        }
    }
}
