//! Connection parameters for a single store node

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::ConnectionError;

/// Default Redis port when neither the URL nor the fields name one
pub const DEFAULT_PORT: u16 = 6379;

/// Connection parameters as supplied by the caller
///
/// Either `url` or the discrete fields (or both) may be set. Discrete
/// fields win over values parsed from the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
    pub username: Option<String>,
}

impl RedisConfig {
    /// Config from a connection URL such as `redis://host:6379/1`
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Config from discrete host and port
    pub fn from_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Merge URL-derived and discrete fields into the effective config
    ///
    /// Precedence, lowest first: `default_db`, fields parsed from `url`,
    /// discrete fields. The URL is dropped once a host is known.
    pub fn resolve(&self, default_db: i64) -> Result<ResolvedConfig, ConnectionError> {
        let mut resolved = ResolvedConfig {
            url: None,
            host: None,
            port: None,
            db: default_db,
            password: None,
            username: None,
        };

        if let Some(ref raw) = self.url {
            let parsed = parse_url(raw)?;
            resolved.host = parsed.host;
            resolved.port = parsed.port;
            if let Some(db) = parsed.db {
                resolved.db = db;
            }
            resolved.password = parsed.password;
            resolved.username = parsed.username;
            resolved.url = Some(raw.clone());
        }

        if self.host.is_some() {
            resolved.host = self.host.clone();
        }
        if self.port.is_some() {
            resolved.port = self.port;
        }
        if let Some(db) = self.db {
            resolved.db = db;
        }
        if self.password.is_some() {
            resolved.password = self.password.clone();
        }
        if self.username.is_some() {
            resolved.username = self.username.clone();
        }

        if resolved.host.is_some() {
            resolved.url = None;
        }

        Ok(resolved)
    }
}

/// Effective, immutable connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Only retained when no host could be derived from it
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: i64,
    pub password: Option<String>,
    pub username: Option<String>,
}

impl ResolvedConfig {
    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.host_or_default(),
            self.port_or_default(),
            self.db
        )
    }
}

struct ParsedUrl {
    host: Option<String>,
    port: Option<u16>,
    db: Option<i64>,
    password: Option<String>,
    username: Option<String>,
}

/// Parse `scheme://[user[:password]@]host[:port][/db]`
fn parse_url(raw: &str) -> Result<ParsedUrl, ConnectionError> {
    let invalid = |reason: String| ConnectionError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string());

    let db = match url.path().trim_start_matches('/') {
        "" => None,
        segment => Some(
            segment
                .parse::<i64>()
                .map_err(|_| invalid(format!("database '{}' is not a number", segment)))?,
        ),
    };

    let username = match url.username() {
        "" => None,
        user => Some(user.to_string()),
    };

    Ok(ParsedUrl {
        host,
        port: url.port(),
        db,
        password: url.password().map(String::from),
        username,
    })
}
