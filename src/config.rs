//! Reader configuration

use crate::error::{Error, Result};
use crate::proxy::{Dialer, ProxyConfig};
use crate::server::{ReaderType, ServerIdentity};
use std::env;
use std::fmt;
use std::time::Duration;

/// Timing of the unseen-message polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// How far back a SEARCH looks for unseen messages.
    pub lookback: Duration,
    /// Pause between two searches that found nothing.
    pub backoff: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(5 * 60),
            backoff: Duration::from_secs(5),
        }
    }
}

/// Everything needed to open a session to a mailbox.
#[derive(Clone)]
pub struct ReaderConfig {
    pub server: ServerIdentity,
    pub user: String,
    pub password: String,
    /// `None` connects directly.
    pub proxy: Option<ProxyConfig>,
    /// Check the server certificate against the web PKI roots. Off by
    /// default.
    pub verify_certificates: bool,
    pub polling: PollSettings,
}

impl fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("proxy", &self.proxy.as_ref().map(ProxyConfig::address))
            .field("verify_certificates", &self.verify_certificates)
            .field("polling", &self.polling)
            .finish()
    }
}

impl ReaderConfig {
    #[must_use]
    pub fn new(
        server: ServerIdentity,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server,
            user: user.into(),
            password: password.into(),
            proxy: None,
            verify_certificates: false,
            polling: PollSettings::default(),
        }
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub const fn with_verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    #[must_use]
    pub const fn with_polling(mut self, polling: PollSettings) -> Self {
        self.polling = polling;
        self
    }

    /// The dialer for the configured proxy, or a direct one.
    #[must_use]
    pub fn dialer(&self) -> Dialer {
        Dialer::from_proxy(self.proxy.as_ref())
    }

    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `MAIL_SERVER` (a well-known hostname, or any host when
    ///   `MAIL_PORT` is set)
    /// - `MAIL_USERNAME`
    /// - `MAIL_PASSWORD`
    ///
    /// Optional:
    /// - `MAIL_READER_TYPE` (`imap` or `pop3`, default: `imap`)
    /// - `MAIL_PORT`
    /// - `MAIL_PROXY` (proxy URL, e.g. `socks5://host:1080`)
    /// - `MAIL_VERIFY_TLS` (default: `false`)
    /// - `MAIL_LOOKBACK_SECS` (default: `300`)
    /// - `MAIL_BACKOFF_SECS` (default: `5`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for missing or malformed variables and
    /// the parsing errors of the reader type, server and proxy.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ReaderConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| Error::Config(format!("{key} not set")));

        let reader_type = match var("MAIL_READER_TYPE") {
            Some(raw) => raw.parse()?,
            None => ReaderType::Imap,
        };

        let host = required("MAIL_SERVER")?;
        let server = match var("MAIL_PORT") {
            Some(raw) => {
                let port = raw
                    .trim()
                    .parse()
                    .map_err(|e| Error::Config(format!("Invalid MAIL_PORT: {e}")))?;
                ServerIdentity::custom(reader_type, host.trim(), port)
            }
            None => host.parse()?,
        };

        let proxy = var("MAIL_PROXY")
            .map(|raw| ProxyConfig::from_url(raw.trim()))
            .transpose()?;

        let verify_certificates = match var("MAIL_VERIFY_TLS") {
            Some(raw) => parse_bool("MAIL_VERIFY_TLS", &raw)?,
            None => false,
        };

        let defaults = PollSettings::default();
        let polling = PollSettings {
            lookback: seconds(var("MAIL_LOOKBACK_SECS"), "MAIL_LOOKBACK_SECS")?
                .unwrap_or(defaults.lookback),
            backoff: seconds(var("MAIL_BACKOFF_SECS"), "MAIL_BACKOFF_SECS")?
                .unwrap_or(defaults.backoff),
        };

        Ok(Self {
            server,
            user: required("MAIL_USERNAME")?,
            password: required("MAIL_PASSWORD")?,
            proxy,
            verify_certificates,
            polling,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid {key}: '{other}'"))),
    }
}

fn seconds(raw: Option<String>, key: &str) -> Result<Option<Duration>> {
    raw.map(|v| {
        v.trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|e| Error::Config(format!("Invalid {key}: {e}")))
    })
    .transpose()
}
