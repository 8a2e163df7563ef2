//! Configuration value sources and the command-line layer.

use std::collections::BTreeMap;
use std::ffi::OsString;

use clap::{Arg, ArgAction, ArgMatches, Command, FromArgMatches};

/// Prefix of environment variables read by the conventional source list.
pub const ENV_PREFIX: &str = "MATVIEW";

/// One layer of configuration. Later layers override earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// The application's built-in TOML defaults.
    Defaults,
    /// `PREFIX__SECTION__KEY` environment variables.
    Environment { prefix: String },
    /// `<config path>/<app name>.<ext>`, resolved when the context is entered.
    ConfigFile,
    /// A dictionary of dotted keys.
    Overrides(BTreeMap<String, String>),
    /// The process arguments.
    CommandLine,
}

impl ValueSource {
    pub fn environment(prefix: impl Into<String>) -> Self {
        ValueSource::Environment {
            prefix: prefix.into(),
        }
    }

    pub fn overrides<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ValueSource::Overrides(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The source list used when the caller supplies none.
    ///
    /// Always ends with the config file, an empty dictionary and the command
    /// line, in that order.
    pub fn conventional() -> Vec<ValueSource> {
        vec![
            ValueSource::Defaults,
            ValueSource::environment(ENV_PREFIX),
            ValueSource::ConfigFile,
            ValueSource::Overrides(BTreeMap::new()),
            ValueSource::CommandLine,
        ]
    }
}

/// Application-specific flags that map onto configuration keys.
pub trait CommandLineArgs: clap::Args {
    /// The `(dotted key, value)` pairs these flags set.
    fn into_overrides(self) -> Vec<(String, String)>;
}

/// For applications without flags of their own.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct NoArgs {}

impl CommandLineArgs for NoArgs {
    fn into_overrides(self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// How to build and read an application's command line.
///
/// Every application also accepts `--set KEY=VALUE`.
#[derive(Clone, Copy)]
pub struct CommandLineDefinition {
    augment: fn(Command) -> Command,
    extract: fn(&ArgMatches) -> Result<Vec<(String, String)>, clap::Error>,
}

impl std::fmt::Debug for CommandLineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLineDefinition").finish_non_exhaustive()
    }
}

impl CommandLineDefinition {
    pub fn of<A: CommandLineArgs>() -> Self {
        Self {
            augment: A::augment_args,
            extract: extract_overrides::<A>,
        }
    }

    pub fn command(&self, name: &'static str, version: &'static str, about: &'static str) -> Command {
        (self.augment)(Command::new(name).version(version).about(about)).arg(
            Arg::new("set")
                .long("set")
                .short('s')
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .value_parser(parse_key_value)
                .help("Override a configuration value, e.g. --set database.max_connections=4"),
        )
    }

    /// Parse `argv` (program name first) into dotted-key overrides.
    pub fn parse<I, T>(
        &self,
        name: &'static str,
        version: &'static str,
        about: &'static str,
        argv: I,
    ) -> Result<BTreeMap<String, String>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command(name, version, about).try_get_matches_from(argv)?;

        let mut values = BTreeMap::new();
        values.extend((self.extract)(&matches)?);
        if let Some(pairs) = matches.get_many::<(String, String)>("set") {
            values.extend(pairs.cloned());
        }
        Ok(values)
    }
}

fn extract_overrides<A: CommandLineArgs>(
    matches: &ArgMatches,
) -> Result<Vec<(String, String)>, clap::Error> {
    Ok(A::from_arg_matches(matches)?.into_overrides())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}
