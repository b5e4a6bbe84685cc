//! Run configuration.
//!
//! Everything is read once at process entry from environment variables
//! (optionally seeded from a `.env` file) and then passed down by reference.
//! Nothing reads the environment mid-run.
//!
//! Parsing goes through a lookup function so tests can build a [`Config`]
//! from a plain map instead of the process environment.

use std::{
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::ConfigError;

/// Batch/quota/pause policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    /// Attempts between two pauses.
    pub batch_size: NonZeroUsize,
    /// Length of each pause.
    pub pause_interval: Duration,
    /// Maximum successful sends per run.
    pub total_limit: NonZeroUsize,
}

impl RunPolicy {
    pub const DEFAULT_BATCH_SIZE: usize = 5;
    pub const DEFAULT_PAUSE_SECS: u64 = 1800;
}

impl Default for RunPolicy {
    fn default() -> Self {
        let batch_size = NonZeroUsize::new(Self::DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            batch_size,
            pause_interval: Duration::from_secs(Self::DEFAULT_PAUSE_SECS),
            total_limit: batch_size,
        }
    }
}

/// Filesystem locations used by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub contacts_file: PathBuf,
    pub templates_dir: PathBuf,
    pub template_ext: String,
    pub attachments_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            contacts_file: PathBuf::from("contacts/contacts.csv"),
            templates_dir: PathBuf::from("templates"),
            template_ext: "mustache".to_string(),
            attachments_dir: PathBuf::from("attachments"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS.
    #[default]
    StartTls,
    /// TLS from the first byte (SMTPS).
    Tls,
    /// No encryption. Only for local relays.
    None,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Tls),
            "none" => Ok(Self::None),
            other => Err(format!("expected starttls, tls or none, got {other}")),
        }
    }
}

/// SMTP relay settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the bounce scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceSettings {
    pub maildir: PathBuf,
    pub lookback: chrono::Duration,
}

impl Default for BounceSettings {
    fn default() -> Self {
        Self {
            maildir: PathBuf::from("bounces"),
            lookback: chrono::Duration::days(1),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub policy: RunPolicy,
    pub paths: Paths,
    pub dns_timeout: Duration,
    pub log_level: String,
    /// `None` when `SMTP_SERVER` is unset; the send command rejects that.
    pub smtp: Option<SmtpSettings>,
    pub bounce: BounceSettings,
}

impl Config {
    /// Loads the optional dotenv file, then reads the process environment.
    ///
    /// A missing dotenv file is not an error; an unreadable or malformed one is.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        load_env_file(env_file)?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let batch_size = vars.non_zero("BATCH_SIZE", RunPolicy::DEFAULT_BATCH_SIZE)?;
        let policy = RunPolicy {
            batch_size,
            pause_interval: Duration::from_secs(
                vars.parse("PAUSE_INTERVAL", RunPolicy::DEFAULT_PAUSE_SECS)?,
            ),
            total_limit: vars.non_zero("TOTAL_PER_NIGHT", batch_size.get())?,
        };

        let defaults = Paths::default();
        let paths = Paths {
            contacts_file: vars.path("CONTACTS_FILE", defaults.contacts_file),
            templates_dir: vars.path("TEMPLATES_DIR", defaults.templates_dir),
            template_ext: vars
                .string("TEMPLATE_EXT")
                .map_or(defaults.template_ext, |ext| {
                    ext.trim_start_matches('.').to_string()
                }),
            attachments_dir: vars.path("ATTACHMENTS_DIR", defaults.attachments_dir),
            logs_dir: vars.path("LOG_DIR", defaults.logs_dir),
        };

        let bounce_defaults = BounceSettings::default();
        let bounce = BounceSettings {
            maildir: vars.path("BOUNCE_MAILDIR", bounce_defaults.maildir),
            lookback: chrono::Duration::days(i64::from(vars.parse::<u32>("BOUNCE_LOOKBACK_DAYS", 1)?)),
        };

        Ok(Self {
            policy,
            paths,
            dns_timeout: Duration::from_secs(vars.parse("DNS_TIMEOUT_SECS", 5)?),
            log_level: vars.string("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            smtp: smtp_settings(&vars)?,
            bounce,
        })
    }

    /// SMTP settings, required by anything that actually sends.
    pub fn require_smtp(&self) -> Result<&SmtpSettings, ConfigError> {
        self.smtp.as_ref().ok_or(ConfigError::Missing("SMTP_SERVER"))
    }
}

fn smtp_settings<F>(vars: &Vars<F>) -> Result<Option<SmtpSettings>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(server) = vars.string("SMTP_SERVER") else {
        return Ok(None);
    };

    let username = vars.string("SMTP_USERNAME");
    let from = vars
        .string("SMTP_FROM")
        .or_else(|| username.clone())
        .ok_or(ConfigError::Missing("SMTP_FROM"))?;

    Ok(Some(SmtpSettings {
        server,
        port: vars.parse("SMTP_PORT", 587)?,
        username,
        password: vars.string("SMTP_PASSWORD"),
        from,
        tls: vars.parse("SMTP_TLS", TlsMode::StartTls)?,
        timeout: Duration::from_secs(vars.parse("SMTP_TIMEOUT_SECS", 30)?),
    }))
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value of `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn path(&self, key: &str, default: PathBuf) -> PathBuf {
        self.string(key).map_or(default, PathBuf::from)
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key).map_or(Ok(default), |value| {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                key,
                reason: err.to_string(),
                value,
            })
        })
    }

    fn non_zero(&self, key: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
        let value: usize = self.parse(key, default)?;
        NonZeroUsize::new(value).ok_or_else(|| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

/// Exports the dotenv file into the process environment.
///
/// Without an explicit path, `.env` is searched for from the working
/// directory upwards.
fn load_env_file(env_file: Option<&Path>) -> Result<(), ConfigError> {
    let loaded = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };

    match loaded {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ConfigError::EnvFile {
            path: env_file.map_or_else(|| PathBuf::from(".env"), Path::to_path_buf),
            reason: err.to_string(),
        }),
    }
}
