//! Field extraction from free-text alert bodies.
//!
//! Zabbix-style notifications embed structured data in plain text:
//!
//! ```text
//! Problem started at 19:13:53 on 2025.09.26
//! Problem name: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos
//! Host: RCS-207-NWC1216
//! Original problem ID: 11865562
//! ```
//!
//! Nothing here fails: a field that cannot be found is `None`.

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::models::EmbeddedTimestamp;

/// Upper bound on keywords attached to one alert.
pub const MAX_KEYWORDS: usize = 5;

/// Vocabulary matched against `message + " " + subject`, in reporting order.
pub const KEYWORD_VOCABULARY: &[&str] = &[
    "problem", "resolved", "started", "latency", "gpu", "service", "monitor",
    "high", "low", "nginx", "icmp", "ping", "disk", "space", "memory", "cpu",
    "database", "connection", "timeout", "failed", "error", "warning", "critical",
    "host", "down", "unavailable", "restarted", "health", "yellow",
    "elasticsearch", "cdn", "zabbix", "agent",
];

lazy_static! {
    // Tried in order, first match wins.
    static ref PROBLEM_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Original problem ID:\s*(\d+)").unwrap(),
        Regex::new(r"(?i)Problem ID:\s*(\d+)").unwrap(),
        Regex::new(r"(?i)ID:\s*(\d+)").unwrap(),
    ];
    static ref HOST: Regex = Regex::new(r"(?i)Host:\s*([^\r\n]+)").unwrap();
    static ref TIME: Regex = Regex::new(r"(\d{2}:\d{2}:\d{2})").unwrap();
    static ref DATE: Regex = Regex::new(r"(\d{4}\.\d{2}\.\d{2})").unwrap();
    static ref PROBLEM_NAME: Regex = Regex::new(r"(?i)Problem name:\s*([^\r\n]+)").unwrap();
    static ref SUBJECT_PROBLEM: Regex = Regex::new(r"(?i)Problem:\s*([^\r\n]+)").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub problem_id: Option<String>,
    pub host: Option<String>,
    pub embedded_timestamp: Option<EmbeddedTimestamp>,
    /// Explicit "Problem name:" line from the message body.
    pub problem_name: Option<String>,
}

impl ExtractedFields {
    /// Display name: the explicit problem name, else "Problem: ..." in the
    /// subject, else the subject itself.
    pub fn resolve_problem_name(&self, subject: &str) -> String {
        if let Some(name) = &self.problem_name {
            return name.clone();
        }
        first_capture(&SUBJECT_PROBLEM, subject).unwrap_or_else(|| subject.to_string())
    }
}

pub fn extract(message: &str) -> ExtractedFields {
    ExtractedFields {
        problem_id: extract_problem_id(message),
        host: first_capture(&HOST, message),
        embedded_timestamp: extract_embedded_timestamp(message),
        problem_name: first_capture(&PROBLEM_NAME, message),
    }
}

pub fn extract_problem_id(message: &str) -> Option<String> {
    PROBLEM_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Both a `HH:MM:SS` and a `YYYY.MM.DD` token must be present and valid;
/// a lone time or date is discarded.
pub fn extract_embedded_timestamp(message: &str) -> Option<EmbeddedTimestamp> {
    let time = TIME.captures(message)?.get(1)?.as_str();
    let date = DATE.captures(message)?.get(1)?.as_str();

    Some(EmbeddedTimestamp {
        date: NaiveDate::parse_from_str(date, "%Y.%m.%d").ok()?,
        time: NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?,
    })
}

pub fn extract_keywords(subject: &str, message: &str) -> Vec<String> {
    let text = format!("{} {}", message, subject).to_lowercase();
    KEYWORD_VOCABULARY
        .iter()
        .filter(|term| text.contains(*term))
        .take(MAX_KEYWORDS)
        .map(|term| term.to_string())
        .collect()
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPU_STARTED: &str = "Problem started at 19:13:53 on 2025.09.26\n\
        Problem name: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos\n\
        Host: RCS-207-NWC1216\n\
        Severity: Information\n\
        Original problem ID: 11865562";

    #[test]
    fn extracts_problem_id_and_host() {
        let fields = extract("Original problem ID: 11865562\nHost: RCS-207-NWC1216");
        assert_eq!(fields.problem_id.as_deref(), Some("11865562"));
        assert_eq!(fields.host.as_deref(), Some("RCS-207-NWC1216"));
        assert!(fields.embedded_timestamp.is_none());
    }

    #[test]
    fn problem_id_patterns_follow_priority_order() {
        // "Problem ID:" appears first in the text but the original id wins.
        let message = "Problem ID: 111\nEvent ID: 222\nOriginal problem ID: 333";
        assert_eq!(extract_problem_id(message).as_deref(), Some("333"));

        assert_eq!(extract_problem_id("Event ID: 222\nProblem ID: 111").as_deref(), Some("111"));
        assert_eq!(extract_problem_id("Event ID: 222").as_deref(), Some("222"));
        assert_eq!(extract_problem_id("no identifiers here"), None);
    }

    #[test]
    fn host_is_trimmed_to_end_of_line() {
        let fields = extract("Host:   delivery-server-01   \r\nSeverity: Warning");
        assert_eq!(fields.host.as_deref(), Some("delivery-server-01"));
    }

    #[test]
    fn embedded_timestamp_needs_both_tokens() {
        assert!(extract_embedded_timestamp("Problem started at 14:02:00").is_none());
        assert!(extract_embedded_timestamp("Problem started on 2025.09.26").is_none());

        let ts = extract(GPU_STARTED).embedded_timestamp.unwrap();
        assert_eq!(ts.date, NaiveDate::from_ymd_opt(2025, 9, 26).unwrap());
        assert_eq!(ts.time, NaiveTime::from_hms_opt(19, 13, 53).unwrap());
    }

    #[test]
    fn invalid_embedded_components_are_discarded() {
        assert!(extract_embedded_timestamp("at 99:61:00 on 2025.09.26").is_none());
        assert!(extract_embedded_timestamp("at 10:00:00 on 2025.13.40").is_none());
    }

    #[test]
    fn problem_name_fallback_chain() {
        let fields = extract(GPU_STARTED);
        assert_eq!(
            fields.resolve_problem_name("ignored"),
            "RCS-207-NWC1216 GPU >= 95% por más de 45 minutos"
        );

        let fields = extract("Host: Elastalerts");
        assert_eq!(fields.resolve_problem_name("Problem: TVF Alert"), "TVF Alert");
        assert_eq!(
            fields.resolve_problem_name("Disk space critical on storage server"),
            "Disk space critical on storage server"
        );
    }

    #[test]
    fn keywords_are_bounded_and_in_vocabulary_order() {
        let keywords = extract_keywords(
            "Problem: nginx down",
            "Problem started: service down, latency high, gpu error, disk space low",
        );
        assert_eq!(keywords, vec!["problem", "started", "latency", "gpu", "service"]);
        assert_eq!(keywords.len(), MAX_KEYWORDS);

        assert!(extract_keywords("", "").is_empty());
    }
}
