//! Keyword classification of alerts.
//!
//! Every category is an ordered list of rules evaluated over the lowercased
//! subject and message; the first matching rule wins and categories are
//! evaluated independently of each other. The rules are plain data so one
//! table serves every view and can be replaced from a JSON file.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::{
    models::{AlertKind, Priority, RequestType, Sector, Source, Status},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule<T> {
    pub value: T,
    /// Terms searched in the message body.
    #[serde(default)]
    pub message: Vec<String>,
    /// Terms searched in the subject.
    #[serde(default)]
    pub subject: Vec<String>,
    /// Message terms that veto the rule even when a term matched.
    #[serde(default)]
    pub unless: Vec<String>,
}

impl<T: Copy> KeywordRule<T> {
    fn matches(&self, subject: &str, message: &str) -> bool {
        let hit = self.message.iter().any(|term| message.contains(term.as_str()))
            || self.subject.iter().any(|term| subject.contains(term.as_str()));
        hit && !self.unless.iter().any(|term| message.contains(term.as_str()))
    }

    fn terms_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.message
            .iter_mut()
            .chain(self.subject.iter_mut())
            .chain(self.unless.iter_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet<T> {
    pub rules: Vec<KeywordRule<T>>,
    pub default: T,
}

impl<T: Copy> RuleSet<T> {
    /// Inputs must already be lowercased.
    pub fn first_match(&self, subject: &str, message: &str) -> Option<T> {
        self.rules
            .iter()
            .find(|rule| rule.matches(subject, message))
            .map(|rule| rule.value)
    }

    pub fn evaluate(&self, subject: &str, message: &str) -> T {
        self.first_match(subject, message).unwrap_or(self.default)
    }

    fn normalize(&mut self) {
        for rule in &mut self.rules {
            for term in rule.terms_mut() {
                *term = term.trim().to_lowercase();
            }
        }
    }

    fn validate(&self, category: &str) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::Config(format!("keyword table category '{}' has no rules", category)));
        }
        for rule in &self.rules {
            if rule.message.is_empty() && rule.subject.is_empty() {
                return Err(Error::Config(format!(
                    "keyword table category '{}' has a rule without terms",
                    category
                )));
            }
            let all_terms = rule.message.iter().chain(&rule.subject).chain(&rule.unless);
            if all_terms.into_iter().any(|term| term.is_empty()) {
                return Err(Error::Config(format!(
                    "keyword table category '{}' contains an empty term",
                    category
                )));
            }
        }
        Ok(())
    }
}

fn rule<T>(value: T, message: &[&str], subject: &[&str]) -> KeywordRule<T> {
    KeywordRule {
        value,
        message: message.iter().map(|s| s.to_string()).collect(),
        subject: subject.iter().map(|s| s.to_string()).collect(),
        unless: Vec::new(),
    }
}

/// The canonical keyword table shared by every view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub status: RuleSet<Status>,
    pub priority: RuleSet<Priority>,
    /// Evaluated over the message, then over the subject if nothing matched.
    pub sector: RuleSet<Sector>,
    pub platform: RuleSet<Sector>,
    pub source: RuleSet<Source>,
    pub kind: RuleSet<AlertKind>,
    pub request_type: RuleSet<RequestType>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let mut open = rule(Status::Open, &["problem"], &[]);
        open.unless.push("resolved".to_string());

        Self {
            status: RuleSet {
                rules: vec![
                    rule(Status::Resolved, &["resolved", "resuelto"], &[]),
                    rule(Status::InProgress, &["started", "iniciado", "began", "comenzó"], &[]),
                    open,
                ],
                default: Status::Unknown,
            },
            priority: RuleSet {
                rules: vec![
                    rule(
                        Priority::High,
                        &["critical", "critico", "high", "alto", "emergency", "emergencia"],
                        &["critical", "high"],
                    ),
                    rule(
                        Priority::Medium,
                        &["important", "importante", "medium", "medio", "attention", "atención"],
                        &[],
                    ),
                ],
                default: Priority::Low,
            },
            sector: RuleSet {
                rules: vec![
                    rule(Sector::Gpu, &["gpu", "procesamiento", "rendering"], &[]),
                    rule(Sector::Network, &["latency", "latencia", "network", "ping", "icmp"], &[]),
                    rule(
                        Sector::Storage,
                        &["disk", "disco", "storage", "almacenamiento", "space", "espacio"],
                        &[],
                    ),
                    rule(
                        Sector::Service,
                        &["service", "servicio", "nginx", "apache", "down", "caída"],
                        &[],
                    ),
                    rule(
                        Sector::Database,
                        &["database", "base de datos", "mysql", "elasticsearch"],
                        &[],
                    ),
                    rule(Sector::Monitoring, &["monitor", "zabbix", "agent", "health"], &[]),
                ],
                default: Sector::Unknown,
            },
            platform: RuleSet {
                rules: vec![
                    rule(Sector::Platform, &[], &["gpu", "platform"]),
                    rule(Sector::Delivery, &[], &["latency", "delivery"]),
                    rule(Sector::Start, &[], &["service", "start", "cabecera"]),
                ],
                default: Sector::Platform,
            },
            source: RuleSet {
                rules: vec![
                    rule(Source::Zabbix, &[], &["zabbix", "monitor"]),
                    rule(Source::Headend, &[], &["headend", "cabecera"]),
                ],
                default: Source::TicketSystem,
            },
            kind: RuleSet {
                rules: vec![
                    rule(AlertKind::Error, &["error", "failed", "falló", "caído"], &["error", "failed"]),
                    rule(AlertKind::Warning, &["warning", "alerta", "alert"], &["warning"]),
                    rule(AlertKind::Success, &["success", "éxito", "completed"], &["resolved"]),
                    rule(AlertKind::Start, &["started", "iniciado"], &[]),
                ],
                default: AlertKind::Info,
            },
            request_type: RuleSet {
                rules: vec![
                    rule(RequestType::Problem, &["problem"], &[]),
                    rule(RequestType::Incident, &["incident"], &[]),
                    rule(RequestType::Request, &["request"], &[]),
                    rule(RequestType::Question, &["question"], &[]),
                ],
                default: RequestType::Problem,
            },
        }
    }
}

impl KeywordTable {
    /// Load a replacement table from a JSON file. Terms are lowercased.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let table = Self::from_json(&raw)?;
        info!("Loaded keyword table from {}", path.display());
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut table: KeywordTable = serde_json::from_str(raw)?;
        table.normalize();
        table.validate()?;
        Ok(table)
    }

    fn normalize(&mut self) {
        self.status.normalize();
        self.priority.normalize();
        self.sector.normalize();
        self.platform.normalize();
        self.source.normalize();
        self.kind.normalize();
        self.request_type.normalize();
    }

    pub fn validate(&self) -> Result<()> {
        self.status.validate("status")?;
        self.priority.validate("priority")?;
        self.sector.validate("sector")?;
        self.platform.validate("platform")?;
        self.source.validate("source")?;
        self.kind.validate("kind")?;
        self.request_type.validate("request_type")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: Status,
    pub priority: Priority,
    pub sector: Sector,
    pub platform: Sector,
    pub source: Source,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub request_type: RequestType,
    pub has_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: KeywordTable,
}

impl Classifier {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    pub fn classify(&self, subject: &str, message: &str) -> Classification {
        let subject = subject.to_lowercase();
        let message = message.to_lowercase();
        let table = &self.table;

        let sector = table
            .sector
            .first_match("", &message)
            .or_else(|| table.sector.first_match("", &subject))
            .unwrap_or(table.sector.default);

        let source = if subject.trim().is_empty() {
            Source::Pending
        } else {
            table.source.evaluate(&subject, &message)
        };

        Classification {
            status: table.status.evaluate(&subject, &message),
            priority: table.priority.evaluate(&subject, &message),
            sector,
            platform: table.platform.evaluate(&subject, &message),
            source,
            kind: table.kind.evaluate(&subject, &message),
            request_type: table.request_type.evaluate(&subject, &message),
            has_error: message.contains("error") || message.contains("fail"),
        }
    }
}

lazy_static! {
    static ref DEFAULT_CLASSIFIER: Classifier = Classifier::default();
}

/// Classify with the built-in table.
pub fn classify(subject: &str, message: &str) -> Classification {
    DEFAULT_CLASSIFIER.classify(subject, message)
}
