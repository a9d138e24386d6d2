use anyhow::{anyhow, bail, Context, Result};
use cold_start_cli_types::{parse_delay, MAX_ROUNDS};
use config::{Config, ConfigError, File, FileFormat};
use log::debug;
use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    catalog::{AppDescriptor, Catalog, CatalogEntry},
    defaults,
    load::LoadSettings,
};

/// File name of the per-directory configuration, searched upward from the
/// current directory.
pub const LOCAL_CONFIG_FILE: &str = ".coldstartconfig";

const APP_CONFIG_DIR: &str = "cold-start";

/// User-wide config (XDG_CONFIG_HOME or ~/.config/cold-start/config.toml)
pub fn system_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(
            Path::new(&xdg_config_home)
                .join(APP_CONFIG_DIR)
                .join("config.toml"),
        );
    }
    dirs_next::home_dir().map(|home| home.join(".config").join(APP_CONFIG_DIR).join("config.toml"))
}

/// Nearest `.coldstartconfig` in the current directory or one of its parents.
pub fn find_config_path() -> Option<PathBuf> {
    let mut current_dir = env::current_dir().ok()?;
    loop {
        let candidate = current_dir.join(LOCAL_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}

/// Read hierarchical configuration (user -> local override)
pub fn read_hierarchical_config() -> Result<Config, ConfigError> {
    let mut builder = Config::builder();

    if let Some(system_config_path) = system_config_path() {
        builder = builder.add_source(
            File::from(system_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    if let Some(local_path) = find_config_path() {
        builder = builder.add_source(
            File::from(local_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    builder.build()
}

fn optional<T: serde::de::DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>> {
    match config.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(anyhow!(e)).with_context(|| format!("Invalid value for '{key}'")),
    }
}

fn optional_int<T: TryFrom<i64>>(config: &Config, key: &str) -> Result<Option<T>> {
    optional::<i64>(config, key)?
        .map(|value| {
            T::try_from(value).map_err(|_| anyhow!("Value {value} for '{key}' is out of range"))
        })
        .transpose()
}

fn optional_count<T: TryFrom<i64>>(config: &Config, key: &str) -> Result<Option<T>> {
    match optional::<i64>(config, key)? {
        Some(value) if value < 1 => Err(anyhow!("Value for '{key}' must be at least 1")),
        _ => optional_int(config, key),
    }
}

/// Durations are written like on the command line: "3", "500ms", "2s".
fn optional_duration(config: &Config, key: &str) -> Result<Option<Duration>> {
    optional::<String>(config, key)?
        .map(|value| parse_delay(&value).with_context(|| format!("Invalid value for '{key}'")))
        .transpose()
}

/// Settings of all commands, with configuration values applied over the
/// built-in defaults. Command line options are applied on top by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub rounds: u16,
    pub output: PathBuf,
    pub delay: Duration,
    pub adb: PathBuf,
    pub serial: Option<String>,
    pub cache_drop_attempts: u32,
    pub cache_drop_settle: Duration,
    pub home_timeout: Duration,
    pub extra_force_stop: Vec<String>,
    pub load: LoadSettings,
    pub capture_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rounds: defaults::DEFAULT_ROUNDS,
            output: PathBuf::from(defaults::DEFAULT_OUTPUT),
            delay: defaults::DEFAULT_INTER_LAUNCH_DELAY,
            adb: PathBuf::from(defaults::DEFAULT_ADB),
            serial: None,
            cache_drop_attempts: defaults::DEFAULT_CACHE_DROP_ATTEMPTS,
            cache_drop_settle: defaults::DEFAULT_CACHE_DROP_SETTLE,
            home_timeout: defaults::DEFAULT_HOME_TIMEOUT,
            extra_force_stop: defaults::DEFAULT_EXTRA_FORCE_STOP
                .iter()
                .map(|package| package.to_string())
                .collect(),
            load: LoadSettings::default(),
            capture_file: PathBuf::from(defaults::DEFAULT_CAPTURE_FILE),
        }
    }
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(rounds) = optional_count::<u16>(config, "run.rounds")? {
            if rounds > MAX_ROUNDS {
                bail!("Value for 'run.rounds' must be at most {MAX_ROUNDS}");
            }
            settings.rounds = rounds;
        }
        if let Some(output) = optional::<String>(config, "run.output")? {
            settings.output = PathBuf::from(output);
        }
        if let Some(delay) = optional_duration(config, "run.delay")? {
            settings.delay = delay;
        }

        if let Some(adb) = optional::<String>(config, "device.adb")? {
            settings.adb = PathBuf::from(adb);
        }
        settings.serial = optional(config, "device.serial")?;
        if let Some(attempts) = optional_count(config, "device.cache_drop_attempts")? {
            settings.cache_drop_attempts = attempts;
        }
        if let Some(settle) = optional_duration(config, "device.cache_drop_settle")? {
            settings.cache_drop_settle = settle;
        }
        if let Some(timeout) = optional_duration(config, "device.home_timeout")? {
            settings.home_timeout = timeout;
        }
        if let Some(packages) = optional(config, "device.extra_force_stop")? {
            settings.extra_force_stop = packages;
        }

        if let Some(count) = optional_int(config, "load.light_count")? {
            settings.load.light_count = count;
        }
        if let Some(count) = optional_int(config, "load.heavy_extra_count")? {
            settings.load.heavy_extra_count = count;
        }
        if let Some(settle) = optional_duration(config, "load.home_settle")? {
            settings.load.home_settle = settle;
        }

        if let Some(capture_file) = optional::<String>(config, "measure.capture_file")? {
            settings.capture_file = PathBuf::from(capture_file);
        }

        Ok(settings)
    }

    /// Settings from the configuration files, or the defaults when there is
    /// no configuration.
    pub fn load() -> Result<Settings> {
        let config = read_hierarchical_config().context("Failed to read configuration")?;
        Settings::from_config(&config)
    }
}

impl Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[run]")?;
        writeln!(f, "rounds = {}", self.rounds)?;
        writeln!(f, "output = {:?}", self.output.display().to_string())?;
        writeln!(f, "delay = \"{:?}\"", self.delay)?;
        writeln!(f)?;
        writeln!(f, "[device]")?;
        writeln!(f, "adb = {:?}", self.adb.display().to_string())?;
        if let Some(serial) = &self.serial {
            writeln!(f, "serial = {serial:?}")?;
        }
        writeln!(f, "cache_drop_attempts = {}", self.cache_drop_attempts)?;
        writeln!(f, "cache_drop_settle = \"{:?}\"", self.cache_drop_settle)?;
        writeln!(f, "home_timeout = \"{:?}\"", self.home_timeout)?;
        writeln!(f, "extra_force_stop = {:?}", self.extra_force_stop)?;
        writeln!(f)?;
        writeln!(f, "[load]")?;
        writeln!(f, "light_count = {}", self.load.light_count)?;
        writeln!(f, "heavy_extra_count = {}", self.load.heavy_extra_count)?;
        writeln!(f, "home_settle = \"{:?}\"", self.load.home_settle)?;
        writeln!(f)?;
        writeln!(f, "[measure]")?;
        write!(
            f,
            "capture_file = {:?}",
            self.capture_file.display().to_string()
        )
    }
}

/// The catalog of the `[catalog]` section. A tier that is not configured keeps
/// its built-in apps.
pub fn catalog_from_config(config: &Config) -> Result<Catalog> {
    let moderate = optional::<Vec<CatalogEntry>>(config, "catalog.moderate")?;
    let large = optional::<Vec<CatalogEntry>>(config, "catalog.large")?;
    if moderate.is_none() && large.is_none() {
        return Ok(Catalog::default());
    }

    let builtin = Catalog::default();
    let apps = |entries: Option<Vec<CatalogEntry>>, fallback: &[AppDescriptor]| match entries {
        Some(entries) => entries
            .iter()
            .map(AppDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>(),
        None => Ok(fallback.to_vec()),
    };
    let catalog = Catalog::new(
        apps(moderate, builtin.moderate())?,
        apps(large, builtin.large())?,
    )
    .context("Invalid [catalog] configuration")?;
    debug!(
        "configured catalog: {} moderate, {} large apps",
        catalog.moderate().len(),
        catalog.large().len()
    );
    Ok(catalog)
}

pub fn load_catalog() -> Result<Catalog> {
    let config = read_hierarchical_config().context("Failed to read configuration")?;
    catalog_from_config(&config)
}
