//! Configuration resolution and the scoped configuration context.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ::config::{ConfigError, Environment, File, FileFormat, Map, Source, Value};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::BootstrapError;
use super::sources::{CommandLineDefinition, ValueSource};
use crate::config::LoggingConfig;

/// Everything a configuration manager needs to resolve one application's
/// configuration.
#[derive(Debug, Clone)]
pub struct ManagerRequest {
    pub app_name: &'static str,
    pub app_version: &'static str,
    pub app_description: &'static str,
    /// Built-in defaults as TOML
    pub defaults: &'static str,
    pub config_pathname: PathBuf,
    pub values_source_list: Vec<ValueSource>,
    pub command_line: CommandLineDefinition,
}

/// Resolved configuration for one process invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    config_pathname: PathBuf,
    pub logging: LoggingConfig,
    settings: ::config::Config,
}

impl AppConfig {
    pub fn new(
        app_name: impl Into<String>,
        config_pathname: impl Into<PathBuf>,
        settings: ::config::Config,
    ) -> Result<Self, BootstrapError> {
        let logging = match settings.get::<LoggingConfig>("logging") {
            Ok(logging) => logging,
            Err(ConfigError::NotFound(_)) => LoggingConfig::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            app_name: app_name.into(),
            config_pathname: config_pathname.into(),
            logging,
            settings,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn config_pathname(&self) -> &Path {
        &self.config_pathname
    }

    /// Read one value or section by dotted key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, BootstrapError> {
        Ok(self.settings.get::<T>(key)?)
    }

    /// Deserialize the whole configuration.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BootstrapError> {
        Ok(self.settings.clone().try_deserialize::<T>()?)
    }
}

/// Resolves configuration sources and owns whatever the resolved
/// configuration holds on to while the application runs.
pub trait ConfigurationManager: Send {
    /// Resolve the sources and hand out the configuration.
    fn enter(&mut self) -> Result<AppConfig, BootstrapError>;

    /// Release the context acquired by [`enter`](Self::enter).
    fn exit(&mut self);
}

/// An entered configuration context.
///
/// Dropping the scope exits the manager's context, once, on every path out
/// of the code holding it.
pub struct ConfigScope<'m, M: ConfigurationManager + ?Sized> {
    manager: &'m mut M,
    config: AppConfig,
}

impl<'m, M: ConfigurationManager + ?Sized> ConfigScope<'m, M> {
    pub fn enter(manager: &'m mut M) -> Result<Self, BootstrapError> {
        let config = manager.enter()?;
        Ok(Self { manager, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl<M: ConfigurationManager + ?Sized> Drop for ConfigScope<'_, M> {
    fn drop(&mut self) {
        self.manager.exit();
    }
}

/// Configuration manager backed by the `config` crate.
///
/// Sources are layered strictly in list order, so a dictionary placed
/// before the command line cannot override it.
pub struct LayeredConfigManager {
    request: ManagerRequest,
    argv: Vec<OsString>,
    entered: bool,
}

impl LayeredConfigManager {
    /// Create a manager that reads the process arguments.
    pub fn new(request: ManagerRequest) -> Self {
        Self {
            request,
            argv: std::env::args_os().collect(),
            entered: false,
        }
    }

    /// Use `argv` (program name first) instead of the process arguments.
    pub fn with_args<I, T>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    pub fn request(&self) -> &ManagerRequest {
        &self.request
    }

    /// Path of the config file without extension; any format the `config`
    /// crate knows is accepted.
    pub fn config_file(&self) -> PathBuf {
        self.request.config_pathname.join(self.request.app_name)
    }

    /// Build the layered configuration.
    pub fn resolve(&self) -> Result<::config::Config, BootstrapError> {
        let mut builder = ::config::Config::builder();

        for source in &self.request.values_source_list {
            builder = match source {
                ValueSource::Defaults => builder.add_source(File::from_str(
                    self.request.defaults,
                    FileFormat::Toml,
                )),
                ValueSource::Environment { prefix } => builder.add_source(
                    Environment::with_prefix(prefix)
                        .separator("__")
                        .try_parsing(true),
                ),
                ValueSource::ConfigFile => {
                    builder.add_source(File::from(self.config_file()).required(false))
                }
                ValueSource::Overrides(values) => {
                    builder.add_source(OverrideLayer::new("overrides", values.clone()))
                }
                ValueSource::CommandLine => {
                    let values = self.parse_command_line()?;
                    builder.add_source(OverrideLayer::new("command line", values))
                }
            };
        }

        Ok(builder.build()?)
    }

    fn parse_command_line(&self) -> Result<BTreeMap<String, String>, BootstrapError> {
        let parsed = self.request.command_line.parse(
            self.request.app_name,
            self.request.app_version,
            self.request.app_description,
            self.argv.iter().cloned(),
        );

        match parsed {
            Ok(values) => Ok(values),
            // --help and --version
            Err(err) if !err.use_stderr() => err.exit(),
            Err(err) => Err(err.into()),
        }
    }
}

impl ConfigurationManager for LayeredConfigManager {
    fn enter(&mut self) -> Result<AppConfig, BootstrapError> {
        let settings = self.resolve()?;
        let config = AppConfig::new(
            self.request.app_name,
            self.request.config_pathname.clone(),
            settings,
        )?;
        self.entered = true;
        debug!(
            app = self.request.app_name,
            config_pathname = %self.request.config_pathname.display(),
            "Configuration context entered"
        );
        Ok(config)
    }

    fn exit(&mut self) {
        if self.entered {
            self.entered = false;
            debug!(app = self.request.app_name, "Configuration context released");
        }
    }
}

/// A dictionary layer that keeps its place in the source order.
///
/// `ConfigBuilder::set_override` would always win over every source.
#[derive(Debug, Clone)]
struct OverrideLayer {
    origin: String,
    values: BTreeMap<String, String>,
}

impl OverrideLayer {
    fn new(origin: &str, values: BTreeMap<String, String>) -> Self {
        Self {
            origin: origin.to_string(),
            values,
        }
    }
}

impl Source for OverrideLayer {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), Value::new(Some(&self.origin), value.clone())))
            .collect())
    }
}
