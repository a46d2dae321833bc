use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// Row as returned by the ticket store. Never mutated once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAlert {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,
}

impl RawAlert {
    pub fn new(
        id: i64,
        subject: impl Into<String>,
        message: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            message: message.into(),
            created_at: created_at.into(),
        }
    }

    /// Ingestion timestamp, `None` when the upstream value cannot be parsed.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse an upstream `created_at`. Accepts RFC 3339 and the MySQL
/// `YYYY-MM-DD HH:MM:SS` form (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

macro_rules! labelled_enum {
    ($name:ident, $what:literal { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!("Invalid {}: {}", $what, other))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Unknown,
}

labelled_enum!(Status, "status" {
    Open => "open",
    InProgress => "in-progress" | "in_progress" | "inprogress",
    Resolved => "resolved",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

labelled_enum!(Priority, "priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Start,
    Platform,
    Delivery,
    Gpu,
    Network,
    Storage,
    Service,
    Monitoring,
    Database,
    Unknown,
}

labelled_enum!(Sector, "sector" {
    Start => "start",
    Platform => "platform",
    Delivery => "delivery",
    Gpu => "gpu",
    Network => "network",
    Storage => "storage",
    Service => "service",
    Monitoring => "monitoring",
    Database => "database",
    Unknown => "unknown",
});

impl Sector {
    pub const ALL: [Sector; 10] = [
        Sector::Start,
        Sector::Platform,
        Sector::Delivery,
        Sector::Gpu,
        Sector::Network,
        Sector::Storage,
        Sector::Service,
        Sector::Monitoring,
        Sector::Database,
        Sector::Unknown,
    ];

    /// Coarse dashboard groupings produced by the platform rules.
    pub const PLATFORMS: [Sector; 3] = [Sector::Start, Sector::Platform, Sector::Delivery];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    TicketSystem,
    Zabbix,
    Headend,
    Pending,
}

labelled_enum!(Source, "source" {
    TicketSystem => "ticket-system" | "ticket_system",
    Zabbix => "zabbix",
    Headend => "headend",
    Pending => "pending",
});

impl Source {
    pub const ALL: [Source; 4] = [Source::TicketSystem, Source::Zabbix, Source::Headend, Source::Pending];
}

/// Visual category of a message; only used for styling and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Error,
    Warning,
    Success,
    Info,
    Start,
}

labelled_enum!(AlertKind, "type" {
    Error => "error",
    Warning => "warning",
    Success => "success",
    Info => "info",
    Start => "start",
});

impl AlertKind {
    pub const ALL: [AlertKind; 5] = [
        AlertKind::Error,
        AlertKind::Warning,
        AlertKind::Success,
        AlertKind::Info,
        AlertKind::Start,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Problem,
    Incident,
    Request,
    Question,
}

labelled_enum!(RequestType, "request type" {
    Problem => "problem",
    Incident => "incident",
    Request => "request",
    Question => "question",
});

impl RequestType {
    pub const ALL: [RequestType; 4] = [
        RequestType::Problem,
        RequestType::Incident,
        RequestType::Request,
        RequestType::Question,
    ];
}

/// Date and time written inside the message body, e.g. "at 16:22:25 on 2025.09.26".
/// Carries no zone; it may disagree with `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTimestamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl EmbeddedTimestamp {
    pub fn naive(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Absolute gap in hours (two decimals) between this timestamp, read in
    /// `tz`, and the ingestion time.
    pub fn discrepancy_hours<Tz: TimeZone>(&self, created_at: DateTime<Utc>, tz: &Tz) -> Option<f64> {
        let local = tz.from_local_datetime(&self.naive()).earliest()?;
        let diff = (created_at - local.with_timezone(&Utc)).num_seconds().abs() as f64 / 3600.0;
        Some((diff * 100.0).round() / 100.0)
    }
}

/// A raw alert plus every field derived from its subject and message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedAlert {
    #[serde(flatten)]
    pub raw: RawAlert,
    pub timestamp: Option<DateTime<Utc>>,
    pub status: Status,
    pub priority: Priority,
    pub sector: Sector,
    pub platform: Sector,
    pub source: Source,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub request_type: RequestType,
    pub problem_id: Option<String>,
    pub problem_name: String,
    pub host: Option<String>,
    pub embedded_timestamp: Option<EmbeddedTimestamp>,
    pub keywords: Vec<String>,
    pub has_error: bool,
}

impl AnnotatedAlert {
    pub fn id(&self) -> i64 {
        self.raw.id
    }

    pub fn subject(&self) -> &str {
        &self.raw.subject
    }

    pub fn message(&self) -> &str {
        &self.raw.message
    }

    /// Gap between the time written in the message, read in `tz`, and
    /// `created_at`. `None` when either side is missing.
    pub fn discrepancy_hours<Tz: TimeZone>(&self, tz: &Tz) -> Option<f64> {
        self.embedded_timestamp?.discrepancy_hours(self.timestamp?, tz)
    }

    /// Correlation key: the extracted problem id, or a per-message key.
    pub fn correlation_key(&self) -> String {
        match &self.problem_id {
            Some(id) => id.clone(),
            None => format!("no-id-{}", self.raw.id),
        }
    }
}
