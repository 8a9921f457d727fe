use std::io;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory holding configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for each configuration layer.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Environment variables overriding file settings start with `APP_`, nested keys are joined
/// with `__` (`APP_BRIDGE__BUFFER_CAPACITY`).
const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";
const LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structures loadable through [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are split into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];

    /// Checks the loaded values, run once every layer was merged.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Errors raised while loading layered configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    WorkingDirectory(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    #[error("no {layer} configuration in `{directory}`, tried {tried}")]
    MissingFile {
        layer: String,
        directory: PathBuf,
        tried: String,
    },

    #[error("{layer} configuration `{path}` is malformed: {source}")]
    MalformedFile {
        layer: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to merge configuration layers: {0}")]
    Merge(#[source] config::ConfigError),

    #[error("configuration does not match the expected shape: {0}")]
    Shape(#[source] config::ConfigError),

    #[error("configuration is invalid: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Loads configuration from `./configuration` for the environment named by `APP_ENVIRONMENT`.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let working_directory = std::env::current_dir().map_err(LoadConfigError::WorkingDirectory)?;
    let environment = Environment::load()?;

    load_config_from(&working_directory.join(CONFIGURATION_DIR), environment)
}

/// Loads configuration from `directory` for `environment`.
///
/// The layers are, from lowest to highest precedence: `base.<ext>`, `<environment>.<ext>` and
/// `APP_` environment variables. Both files must exist. The merged result is deserialized and
/// then checked with [`Config::validate`].
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let mut builder = config::Config::builder();
    for stem in ["base", environment.as_str()] {
        let path = locate_layer(directory, stem)?;
        builder = builder.add_source(config::File::from(path.clone()));
        // Building after each file pins a parse error on the file that caused it.
        check_layer(&builder, stem, &path)?;
    }

    let loaded: T = builder
        .add_source(environment_overrides::<T>())
        .build()
        .map_err(LoadConfigError::Merge)?
        .try_deserialize()
        .map_err(LoadConfigError::Shape)?;

    loaded.validate()?;

    Ok(loaded)
}

fn environment_overrides<T: Config>() -> config::Environment {
    let overrides = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    if T::LIST_PARSE_KEYS.is_empty() {
        return overrides;
    }

    T::LIST_PARSE_KEYS.iter().fold(
        overrides.list_separator(LIST_SEPARATOR),
        |overrides, key| overrides.with_list_parse_key(key),
    )
}

fn locate_layer(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .collect();

    if let Some(path) = candidates.iter().find(|path| path.is_file()) {
        return Ok(path.clone());
    }

    let tried = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::MissingFile {
        layer: stem.to_string(),
        directory: directory.to_path_buf(),
        tried,
    })
}

fn check_layer(
    builder: &ConfigBuilder<DefaultState>,
    stem: &str,
    path: &Path,
) -> Result<(), LoadConfigError> {
    match builder.clone().build() {
        Ok(_) => Ok(()),
        Err(source) => Err(LoadConfigError::MalformedFile {
            layer: stem.to_string(),
            path: path.to_path_buf(),
            source,
        }),
    }
}
