//! Rollup statistics over a filtered alert set.
//!
//! Resolution time is approximated as the time between `created_at` and
//! "now": the messages carry no reliable resolution timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{AlertKind, AnnotatedAlert, Priority, RequestType, Sector, Source, Status};

pub const MIN_RESOLUTION_MINUTES: i64 = 30;
pub const MAX_RESOLUTION_MINUTES: i64 = 2880;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub unknown: usize,
    pub total: usize,
}

impl StatusCounts {
    fn record(&mut self, status: Status) {
        match status {
            Status::Open => self.open += 1,
            Status::InProgress => self.in_progress += 1,
            Status::Resolved => self.resolved += 1,
            Status::Unknown => self.unknown += 1,
        }
        self.total += 1;
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Open => self.open,
            Status::InProgress => self.in_progress,
            Status::Resolved => self.resolved,
            Status::Unknown => self.unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Ratios {
    pub resolved_pct: f64,
    pub in_progress_pct: f64,
    pub open_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub by_status: StatusCounts,
    pub ratios: Ratios,
    pub by_sector: BTreeMap<Sector, StatusCounts>,
    pub by_platform: BTreeMap<Sector, StatusCounts>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_source: BTreeMap<Source, usize>,
    pub by_kind: BTreeMap<AlertKind, usize>,
    pub by_request_type: BTreeMap<RequestType, usize>,
    /// Every sector is present; 0 when none of its alerts is resolved.
    pub avg_resolution_minutes: BTreeMap<Sector, f64>,
    pub overall_avg_resolution_minutes: f64,
}

impl Stats {
    pub fn sector_status(&self, sector: Sector, status: Status) -> usize {
        self.by_sector.get(&sector).map_or(0, |counts| counts.get(status))
    }

    pub fn avg_resolution(&self, sector: Sector) -> f64 {
        self.avg_resolution_minutes.get(&sector).copied().unwrap_or(0.0)
    }
}

/// Percentage with one decimal; 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Approximate resolution time, only for resolved alerts with a usable
/// `created_at`. Clamped to [30, 2880] minutes.
pub fn resolution_minutes(alert: &AnnotatedAlert, now: DateTime<Utc>) -> Option<i64> {
    if alert.status != Status::Resolved {
        return None;
    }
    let created = alert.timestamp?;
    let minutes = ((now - created).num_seconds() as f64 / 60.0).round() as i64;
    Some(minutes.clamp(MIN_RESOLUTION_MINUTES, MAX_RESOLUTION_MINUTES))
}

pub fn aggregate(alerts: &[AnnotatedAlert], now: DateTime<Utc>) -> Stats {
    let mut stats = Stats {
        total: alerts.len(),
        by_sector: Sector::ALL.iter().map(|s| (*s, StatusCounts::default())).collect(),
        by_platform: Sector::PLATFORMS.iter().map(|s| (*s, StatusCounts::default())).collect(),
        by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
        by_source: Source::ALL.iter().map(|s| (*s, 0)).collect(),
        by_kind: AlertKind::ALL.iter().map(|k| (*k, 0)).collect(),
        by_request_type: RequestType::ALL.iter().map(|r| (*r, 0)).collect(),
        ..Stats::default()
    };

    let mut resolution: BTreeMap<Sector, Vec<i64>> = BTreeMap::new();

    for alert in alerts {
        stats.by_status.record(alert.status);
        stats.by_sector.entry(alert.sector).or_default().record(alert.status);
        stats.by_platform.entry(alert.platform).or_default().record(alert.status);
        *stats.by_priority.entry(alert.priority).or_default() += 1;
        *stats.by_source.entry(alert.source).or_default() += 1;
        *stats.by_kind.entry(alert.kind).or_default() += 1;
        *stats.by_request_type.entry(alert.request_type).or_default() += 1;

        if let Some(minutes) = resolution_minutes(alert, now) {
            resolution.entry(alert.sector).or_default().push(minutes);
        }
    }

    stats.ratios = Ratios {
        resolved_pct: percentage(stats.by_status.resolved, stats.total),
        in_progress_pct: percentage(stats.by_status.in_progress, stats.total),
        open_pct: percentage(stats.by_status.open, stats.total),
    };

    stats.avg_resolution_minutes = Sector::ALL
        .iter()
        .map(|sector| (*sector, mean(resolution.get(sector).map(Vec::as_slice).unwrap_or(&[]))))
        .collect();

    let all: Vec<i64> = resolution.into_values().flatten().collect();
    stats.overall_avg_resolution_minutes = mean(&all);

    stats
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// "0m", "45m", "2h", "2h 5m".
pub fn format_minutes(minutes: i64) -> String {
    if minutes <= 0 {
        return "0m".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let (hours, rest) = (minutes / 60, minutes % 60);
    if rest > 0 {
        format!("{}h {}m", hours, rest)
    } else {
        format!("{}h", hours)
    }
}
