use anyhow::anyhow;
use common::constants::DEFAULT_PORT;
use once_cell::sync::OnceCell;
use std::{
    convert::Infallible,
    env::{self, VarError},
    path::PathBuf,
    process::abort,
    time::Duration,
};
use time::{OffsetDateTime, UtcOffset};

const CONTROL_PORT_ENV_VAR: &str = "CONTROL_PORT";
const NEGOTIATION_TIMEOUT_ENV_VAR: &str = "NEGOTIATION_TIMEOUT_MS";
const LOG_DIR_ENV_VAR: &str = "LOG_DIR";
const UTC_OFFSET_ENV_VAR: &str = "UTC_OFFSET";
const CAPTURE_DIR_ENV_VAR: &str = "CAPTURE_DIR";

const DEFAULT_NEGOTIATION_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_CAPTURE_DIR: &str = "captures";

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

pub struct Config {
    pub control_port: u16,
    /// `None` when negotiation may take arbitrarily long.
    pub negotiation_timeout: Option<Duration>,
    pub log_dir: PathBuf,
    pub utc_offset: Option<UtcOffset>,
    pub capture_dir: PathBuf,
}

impl Config {
    #[inline]
    pub fn get() -> &'static Config {
        match GLOBAL_CONFIG.get() {
            Some(config) => config,
            None => Self::init_late(),
        }
    }

    #[inline(never)]
    fn init_late() -> &'static Config {
        eprintln!("Config read before initialization, loading it now");

        match Self::get_or_try_init() {
            Ok(config) => config,
            Err(error) => {
                eprintln!("Failed to load config: {error}");
                abort()
            }
        }
    }

    #[inline]
    pub fn get_or_try_init() -> anyhow::Result<&'static Config> {
        GLOBAL_CONFIG.get_or_try_init(Self::from_env)
    }

    fn from_env() -> anyhow::Result<Self> {
        let control_port = Self::var_or(CONTROL_PORT_ENV_VAR, |var| var.parse(), DEFAULT_PORT)?;

        let negotiation_timeout = Self::var_or(
            NEGOTIATION_TIMEOUT_ENV_VAR,
            |var| var.parse::<u64>(),
            DEFAULT_NEGOTIATION_TIMEOUT_MS,
        )?;
        let negotiation_timeout = match negotiation_timeout {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        };

        let log_dir = Self::path_var(LOG_DIR_ENV_VAR, DEFAULT_LOG_DIR)?;
        let capture_dir = Self::path_var(CAPTURE_DIR_ENV_VAR, DEFAULT_CAPTURE_DIR)?;

        let utc_offset = Self::var_or_else(
            UTC_OFFSET_ENV_VAR,
            |var| -> anyhow::Result<_> {
                let hours = var.parse()?;
                Ok(Some(UtcOffset::from_hms(hours, 0, 0)?))
            },
            || UtcOffset::local_offset_at(OffsetDateTime::now_utc()).ok(),
        )?;

        Ok(Self {
            control_port,
            negotiation_timeout,
            log_dir,
            utc_offset,
            capture_dir,
        })
    }

    fn path_var(env_var: &str, default: &str) -> anyhow::Result<PathBuf> {
        Self::var_or_else(
            env_var,
            |var| Ok::<_, Infallible>(PathBuf::from(var)),
            || PathBuf::from(default),
        )
    }

    fn var_or<T, F, E>(env_var: &str, parse: F, default: T) -> anyhow::Result<T>
    where
        F: FnOnce(String) -> Result<T, E>,
        E: Into<anyhow::Error>,
    {
        Self::var_or_else(env_var, parse, || default)
    }

    fn var_or_else<T, F, E, D>(env_var: &str, parse: F, default: D) -> anyhow::Result<T>
    where
        F: FnOnce(String) -> Result<T, E>,
        E: Into<anyhow::Error>,
        D: FnOnce() -> T,
    {
        match env::var(env_var) {
            Ok(var) => parse(var).map_err(|error| {
                let error: anyhow::Error = error.into();
                anyhow!("Invalid value for {env_var}: {error}")
            }),
            Err(VarError::NotPresent) => Ok(default()),
            Err(error @ VarError::NotUnicode(_)) =>
                Err(anyhow!("Failed to read env var {env_var}: {error}")),
        }
    }
}
