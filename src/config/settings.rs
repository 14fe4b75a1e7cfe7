use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One compiled allow/deny rule pinned to a connection after a
/// successful `client auth`. Regexes are compiled eagerly at load
/// time so a malformed rule fails the process at startup rather than
/// on the first connection that tries to use it.
pub struct AuthRule {
    pub passwd: String,
    pub allow: bool,
    pub regex: Regex,
}

#[derive(Debug, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default = "default_foreground")]
    pub foreground: bool,
}

fn default_listen() -> Vec<String> {
    vec!["0.0.0.0:7070".to_string()]
}
fn default_realm() -> String {
    "+ OK ustackd $VERSION$ ready".to_string()
}
fn default_backend() -> String {
    "sqlite".to_string()
}
const fn default_foreground() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct SyslogConfig {
    #[serde(default)]
    pub facility: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ClientConfig {
    /// raw `<passwd>:<allow|deny>:<regex>` lines, compiled into
    /// `Settings::rules` during `load()`
    #[serde(default)]
    pub auth: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub chroot: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct SslConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub cert: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct SqlUrlConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub passwd: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub syslog: SyslogConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(default)]
    pub sqlite: SqlUrlConfig,
    #[serde(default)]
    pub mysql: SqlUrlConfig,
    #[serde(default)]
    pub postgres: SqlUrlConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// compiled from `client.auth`, see [`AuthRule`]
    #[serde(skip)]
    pub rules: Vec<AuthRule>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config_path", &self.config_path)
            .field("daemon", &self.daemon)
            .field("syslog", &self.syslog)
            .field("security", &self.security)
            .field("ssl", &self.ssl)
            .field("sqlite", &self.sqlite)
            .field("mysql", &self.mysql)
            .field("postgres", &self.postgres)
            .field("proxy", &self.proxy)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Settings {
    pub(crate) fn load(&mut self, path: PathBuf) -> Result<()> {
        self.config_path = path;

        match self.daemon.backend.as_str() {
            "sqlite" | "mysql" | "postgres" | "proxy" | "nil" => {}
            other => {
                return Err(Error::new(format!(
                    "unknown daemon.backend '{}': expected sqlite, mysql, postgres, proxy or nil",
                    other
                )))
            }
        }

        let mut rules = Vec::with_capacity(self.client.auth.len());
        for line in &self.client.auth {
            let parts: Vec<&str> = line.splitn(3, ':').collect();
            if parts.len() != 3 {
                return Err(Error::new(format!(
                    "invalid client.auth line '{}': expected <passwd>:<allow|deny>:<regex>",
                    line
                )));
            }
            let allow = match parts[1] {
                "allow" => true,
                "deny" => false,
                other => {
                    return Err(Error::new(format!(
                        "invalid client.auth line '{}': second field must be 'allow' or 'deny', got '{}'",
                        line, other
                    )))
                }
            };
            let regex = Regex::new(parts[2])?;
            rules.push(AuthRule {
                passwd: parts[0].to_string(),
                allow,
                regex,
            });
        }
        self.rules = rules;

        Ok(())
    }

    pub fn realm(&self) -> String {
        self.daemon
            .realm
            .replace("$VERSION$", env!("CARGO_PKG_VERSION"))
    }
}
