use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{AlertKind, AnnotatedAlert, Priority, Status};

/// Lifecycle messages about one incident, folded by problem id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemGroup {
    pub problem_id: String,
    pub problem_name: String,
    pub host: Option<String>,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// Chronological; members without a usable `created_at` come last.
    pub messages: Vec<AnnotatedAlert>,
    pub first_occurrence: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    /// Status of the most recent member.
    pub status: Status,
}

impl ProblemGroup {
    fn open(problem_id: String, first: &AnnotatedAlert) -> Self {
        Self {
            problem_id,
            problem_name: first.problem_name.clone(),
            host: first.host.clone(),
            priority: first.priority,
            kind: first.kind,
            messages: Vec::new(),
            first_occurrence: None,
            last_update: None,
            status: first.status,
        }
    }

    fn absorb(&mut self, alert: &AnnotatedAlert) {
        match alert.timestamp {
            Some(ts) => {
                if self.first_occurrence.map_or(true, |first| ts < first) {
                    self.first_occurrence = Some(ts);
                }
                // Equal timestamps: the later input wins.
                if self.last_update.map_or(true, |last| ts >= last) {
                    self.last_update = Some(ts);
                    self.status = alert.status;
                }
            }
            None if self.last_update.is_none() => self.status = alert.status,
            None => {}
        }
        self.messages.push(alert.clone());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub fn correlate(alerts: &[AnnotatedAlert]) -> HashMap<String, ProblemGroup> {
    let mut groups: HashMap<String, ProblemGroup> = HashMap::new();

    for alert in alerts {
        let key = alert.correlation_key();
        groups
            .entry(key.clone())
            .or_insert_with(|| ProblemGroup::open(key, alert))
            .absorb(alert);
    }

    for group in groups.values_mut() {
        group.messages.sort_by_key(|m| (m.timestamp.is_none(), m.timestamp));
    }

    groups
}

/// Groups ordered by `last_update` descending; undatable groups last.
pub fn correlate_sorted(alerts: &[AnnotatedAlert]) -> Vec<ProblemGroup> {
    let mut groups: Vec<ProblemGroup> = correlate(alerts).into_values().collect();
    groups.sort_by(|a, b| {
        b.last_update
            .cmp(&a.last_update)
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::RawAlert, pipeline::annotate};

    fn alert(id: i64, message: &str, created_at: &str) -> AnnotatedAlert {
        annotate(&RawAlert::new(id, "Problem: test", message, created_at))
    }

    #[test]
    fn groups_share_problem_id() {
        let alerts = vec![
            alert(1, "Problem started\nOriginal problem ID: 123", "2025-01-01T10:00:00Z"),
            alert(2, "Problem has been resolved\nOriginal problem ID: 123", "2025-01-01T10:05:00Z"),
        ];

        let groups = correlate(&alerts);
        assert_eq!(groups.len(), 1);

        let group = &groups["123"];
        assert_eq!(group.first_occurrence, alerts[0].timestamp);
        assert_eq!(group.last_update, alerts[1].timestamp);
        assert_eq!(group.status, Status::Resolved);
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn input_order_does_not_change_latest_status() {
        let alerts = vec![
            alert(2, "Problem has been resolved\nOriginal problem ID: 9", "2025-01-01T10:05:00Z"),
            alert(1, "Problem started\nOriginal problem ID: 9", "2025-01-01T10:00:00Z"),
        ];

        let group = &correlate(&alerts)["9"];
        assert_eq!(group.status, Status::Resolved);
        let ids: Vec<i64> = group.messages.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn equal_timestamps_last_seen_wins() {
        let alerts = vec![
            alert(1, "Problem has been resolved\nOriginal problem ID: 7", "2025-01-01T10:00:00Z"),
            alert(2, "Problem started\nOriginal problem ID: 7", "2025-01-01T10:00:00Z"),
        ];
        assert_eq!(correlate(&alerts)["7"].status, Status::InProgress);
    }

    #[test]
    fn alerts_without_id_become_singletons() {
        let alerts = vec![
            alert(10, "Disk usage over 95%", "2025-01-01T10:00:00Z"),
            alert(11, "Disk usage over 95%", "2025-01-01T10:01:00Z"),
        ];

        let groups = correlate(&alerts);
        assert_eq!(groups.len(), 2);
        assert!(groups.contains_key("no-id-10"));
        assert_eq!(groups["no-id-11"].len(), 1);
    }

    #[test]
    fn unparseable_timestamps_do_not_drive_ordering() {
        let alerts = vec![
            alert(1, "Problem started\nOriginal problem ID: 5", "2025-01-01T10:00:00Z"),
            alert(2, "Problem has been resolved\nOriginal problem ID: 5", "garbage"),
        ];

        let group = &correlate(&alerts)["5"];
        assert_eq!(group.status, Status::InProgress);
        assert_eq!(group.last_update, alerts[0].timestamp);
        assert_eq!(group.messages.last().map(|m| m.id()), Some(2));
    }

    #[test]
    fn sorted_by_last_update_descending() {
        let alerts = vec![
            alert(1, "Original problem ID: 1", "2025-01-01T08:00:00Z"),
            alert(2, "Original problem ID: 2", "2025-01-01T09:00:00Z"),
            alert(3, "Original problem ID: 3", "bad"),
            alert(4, "Original problem ID: 1", "2025-01-01T10:00:00Z"),
        ];

        let order: Vec<String> = correlate_sorted(&alerts)
            .into_iter()
            .map(|g| g.problem_id)
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(correlate(&[]).is_empty());
        assert!(correlate_sorted(&[]).is_empty());
    }
}
