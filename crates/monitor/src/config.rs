use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{pipeline::KeywordTable, Error};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    Sqlite,
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "api" => Ok(SourceKind::Http),
            "sqlite" => Ok(SourceKind::Sqlite),
            other => Err(Error::Config(format!("Unknown TICKET_SOURCE: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub poll: PollConfig,
    /// Replaces the built-in keyword table when set.
    pub keyword_table_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub api_url: String,
    pub limit: u32,
    pub timeout_secs: u64,
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or(defaults.server.addr),
            },
            source: SourceConfig {
                kind: match lookup("TICKET_SOURCE") {
                    Some(raw) => raw.parse()?,
                    None => defaults.source.kind,
                },
                api_url: lookup("TICKET_API_URL").unwrap_or(defaults.source.api_url),
                limit: parse_or(&lookup, "TICKET_API_LIMIT", defaults.source.limit)?,
                timeout_secs: parse_or(&lookup, "TICKET_API_TIMEOUT_SECS", defaults.source.timeout_secs)?,
                sqlite_path: lookup("SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.source.sqlite_path),
            },
            poll: PollConfig {
                enabled: parse_or(&lookup, "POLL_ENABLED", defaults.poll.enabled)?,
                interval_secs: parse_or(&lookup, "POLL_INTERVAL_SECS", defaults.poll.interval_secs)?,
            },
            keyword_table_path: lookup("KEYWORD_TABLE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(Error::Config("POLL_INTERVAL_SECS must be positive".to_string()));
        }
        if self.source.limit == 0 {
            return Err(Error::Config("TICKET_API_LIMIT must be positive".to_string()));
        }
        if self.source.timeout_secs == 0 {
            return Err(Error::Config("TICKET_API_TIMEOUT_SECS must be positive".to_string()));
        }
        if self.source.kind == SourceKind::Http && self.source.api_url.trim().is_empty() {
            return Err(Error::Config(
                "TICKET_API_URL must be set when using the HTTP source".to_string(),
            ));
        }
        Ok(())
    }

    pub fn keyword_table(&self) -> crate::Result<KeywordTable> {
        match &self.keyword_table_path {
            Some(path) => KeywordTable::load(path),
            None => Ok(KeywordTable::default()),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            source: SourceConfig {
                kind: SourceKind::Http,
                api_url: "http://localhost:3005/api".to_string(),
                limit: 1000,
                timeout_secs: 10,
                sqlite_path: PathBuf::from("data/tickets.db"),
            },
            poll: PollConfig {
                enabled: true,
                interval_secs: 30,
            },
            keyword_table_path: None,
        }
    }
}
