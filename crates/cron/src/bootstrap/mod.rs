//! Application bootstrap.
//!
//! Every process entry point implements [`App`]. Calling [`App::run`]
//! resolves the layered configuration, installs logging and signal handling,
//! builds the application from the resolved configuration and awaits its
//! [`App::main`] inside the configuration manager's scoped context. The
//! context is released exactly once however `main` finishes.

mod context;
mod error;
mod sources;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::logging;
use crate::signals::{self, Shutdown};

pub use context::{
    AppConfig, ConfigScope, ConfigurationManager, LayeredConfigManager, ManagerRequest,
};
pub use error::BootstrapError;
pub use sources::{CommandLineArgs, CommandLineDefinition, NoArgs, ValueSource, ENV_PREFIX};

/// Directory searched for the config file when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "./config";

#[async_trait::async_trait]
pub trait App: Sized + Send + 'static {
    const NAME: &'static str;
    const VERSION: &'static str;
    const DESCRIPTION: &'static str;
    /// Built-in defaults as TOML, the lowest configuration layer.
    const DEFAULTS: &'static str = "";

    /// Flags the application adds to the command line.
    type Args: CommandLineArgs;

    /// Build the application from its resolved configuration.
    fn new(config: AppConfig, shutdown: Shutdown) -> anyhow::Result<Self>;

    /// The application's work. The returned value is the process exit code.
    async fn main(&mut self) -> anyhow::Result<i32>;

    /// The configuration manager used by [`do_run`](Self::do_run).
    fn configuration_manager(request: ManagerRequest) -> Box<dyn ConfigurationManager> {
        Box::new(LayeredConfigManager::new(request))
    }

    fn install_logging(config: &AppConfig) {
        logging::init_logging(&config.logging);
    }

    fn install_signal_handlers() -> Shutdown {
        signals::install()
    }

    /// The request handed to the configuration manager.
    fn manager_request(
        config_path: Option<PathBuf>,
        values_source_list: Option<Vec<ValueSource>>,
    ) -> ManagerRequest {
        ManagerRequest {
            app_name: Self::NAME,
            app_version: Self::VERSION,
            app_description: Self::DESCRIPTION,
            defaults: Self::DEFAULTS,
            config_pathname: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            values_source_list: values_source_list.unwrap_or_else(ValueSource::conventional),
            command_line: CommandLineDefinition::of::<Self::Args>(),
        }
    }

    /// Entry point. Returns whatever [`do_run`](Self::do_run) returns.
    async fn run(
        config_path: Option<PathBuf>,
        values_source_list: Option<Vec<ValueSource>>,
    ) -> Result<i32, BootstrapError> {
        Self::do_run(config_path, values_source_list).await
    }

    async fn do_run(
        config_path: Option<PathBuf>,
        values_source_list: Option<Vec<ValueSource>>,
    ) -> Result<i32, BootstrapError> {
        let request = Self::manager_request(config_path, values_source_list);
        let mut manager = Self::configuration_manager(request);

        let scope = ConfigScope::enter(manager.as_mut())?;
        Self::install_logging(scope.config());
        let shutdown = Self::install_signal_handlers();
        debug!(app = Self::NAME, "Configured");

        let mut app =
            Self::new(scope.config().clone(), shutdown).map_err(BootstrapError::from_app)?;

        info!(
            app = Self::NAME,
            version = Self::VERSION,
            config_pathname = %scope.config().config_pathname().display(),
            "Running"
        );
        let exit_code = app.main().await.map_err(BootstrapError::App)?;

        drop(scope);
        debug!(app = Self::NAME, exit_code, "Terminated");
        Ok(exit_code)
    }
}
