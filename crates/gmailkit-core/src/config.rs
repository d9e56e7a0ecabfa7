use std::fmt;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

const ENV_USER: &str = "GMAIL_USER";
const ENV_PASSWORD: &str = "GMAIL_APP_PASSWORD";
const ENV_IMAP_HOST: &str = "IMAP_HOST";
const ENV_IMAP_PORT: &str = "IMAP_PORT";
const ENV_SMTP_HOST: &str = "SMTP_HOST";
const ENV_SMTP_PORT: &str = "SMTP_PORT";

/// Values given explicitly on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
}

/// Values read from `gmailkit.toml`.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<String>,
}

#[derive(Clone)]
pub struct Credentials {
    pub address: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Settings {
    pub user: String,
    pub password: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl Settings {
    /// Resolve against the process environment and the config file on disk.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let file = FileConfig::load();
        Self::resolve_with(overrides, |key| std::env::var(key).ok(), &file)
    }

    pub fn resolve_with<F>(overrides: &Overrides, lookup: F, file: &FileConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (user, password) = account_fields(overrides, &lookup, file);
        let env = |key: &str| non_empty(lookup(key));
        let imap_host = non_empty(overrides.imap_host.clone())
            .or_else(|| env(ENV_IMAP_HOST))
            .or_else(|| non_empty(file.imap_host.clone()))
            .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string());
        let imap_port = match overrides.imap_port {
            Some(port) => port,
            None => resolve_port(
                ENV_IMAP_PORT,
                env(ENV_IMAP_PORT),
                file.imap_port.clone(),
                DEFAULT_IMAP_PORT,
            )?,
        };
        let smtp_host = non_empty(overrides.smtp_host.clone())
            .or_else(|| env(ENV_SMTP_HOST))
            .or_else(|| non_empty(file.smtp_host.clone()))
            .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
        let smtp_port = match overrides.smtp_port {
            Some(port) => port,
            None => resolve_port(
                ENV_SMTP_PORT,
                env(ENV_SMTP_PORT),
                file.smtp_port.clone(),
                DEFAULT_SMTP_PORT,
            )?,
        };

        Ok(Self {
            user,
            password,
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
        })
    }

    /// Like [`Settings::resolve`], but only the account is read; hosts and
    /// ports keep their defaults and are never parsed.
    pub fn resolve_account(overrides: &Overrides) -> Self {
        let file = FileConfig::load();
        Self::resolve_account_with(overrides, |key| std::env::var(key).ok(), &file)
    }

    pub fn resolve_account_with<F>(overrides: &Overrides, lookup: F, file: &FileConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (user, password) = account_fields(overrides, &lookup, file);
        Self {
            user,
            password,
            imap_host: DEFAULT_IMAP_HOST.to_string(),
            imap_port: DEFAULT_IMAP_PORT,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
        }
    }

    /// Credentials for an authenticated operation.
    pub fn credentials(&self) -> Result<Credentials> {
        if self.user.is_empty() || self.password.is_empty() {
            return Err(Error::MissingCredentials);
        }
        Ok(Credentials {
            address: self.user.clone(),
            secret: self.password.clone(),
        })
    }
}

impl FileConfig {
    /// First readable candidate wins; a broken file is ignored.
    pub fn load() -> Self {
        for path in config_path_candidates() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            debug!("config file found path={}", path.display());
            match Self::parse(&content) {
                Ok(config) => return config,
                Err(err) => {
                    warn!("ignoring config file path={} error={}", path.display(), err);
                    return Self::default();
                }
            }
        }
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        let account = value.get("account");
        let imap = value.get("imap");
        let smtp = value.get("smtp");
        Ok(Self {
            user: account.and_then(|v| string_value(v, "user")),
            password: account.and_then(|v| string_value(v, "app_password")),
            imap_host: imap.and_then(|v| string_value(v, "host")),
            imap_port: imap.and_then(|v| string_value(v, "port")),
            smtp_host: smtp.and_then(|v| string_value(v, "host")),
            smtp_port: smtp.and_then(|v| string_value(v, "port")),
        })
    }
}

fn account_fields<F>(overrides: &Overrides, lookup: &F, file: &FileConfig) -> (String, String)
where
    F: Fn(&str) -> Option<String>,
{
    let user = non_empty(overrides.user.clone())
        .or_else(|| non_empty(lookup(ENV_USER)))
        .or_else(|| non_empty(file.user.clone()))
        .map(|u| u.trim().to_string())
        .unwrap_or_default();
    let password = non_empty(overrides.password.clone())
        .or_else(|| non_empty(lookup(ENV_PASSWORD)))
        .or_else(|| non_empty(file.password.clone()))
        .map(|p| strip_whitespace(&p))
        .unwrap_or_default();
    (user, password)
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("gmailkit.toml"),
        xdg_config_dir().join("gmailkit").join("gmailkit.toml"),
    ]
}

fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

// Ports may be written as integers or strings in the file.
fn string_value(table: &toml::Value, key: &str) -> Option<String> {
    let value = table.get(key)?;
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_integer().map(|v| v.to_string()))
}

fn resolve_port(
    name: &str,
    from_env: Option<String>,
    from_file: Option<String>,
    default: u16,
) -> Result<u16> {
    match from_env.or_else(|| non_empty(from_file)) {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("{} must be a port number, got {:?}", name, raw))),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}
