use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::{
    models::{AlertKind, AnnotatedAlert, Priority, Sector, Source, Status},
    Error,
};

/// Half-open `[start, end)` interval over `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// An end before the start contains nothing.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangePreset {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    Day(NaiveDate),
    /// Both dates inclusive.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRangePreset {
    /// Resolve against local midnight of `now` in `now`'s timezone.
    /// Weeks start on Sunday.
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateRange {
        let tz = now.timezone();
        let today = now.date_naive();
        let tomorrow = today + Duration::days(1);
        let start_of_week = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        let start_of_month = today - Duration::days(today.day0() as i64);

        let (start, end) = match *self {
            DateRangePreset::Today => (today, tomorrow),
            DateRangePreset::Yesterday => (today - Duration::days(1), today),
            DateRangePreset::ThisWeek => (start_of_week, tomorrow),
            DateRangePreset::LastWeek => (start_of_week - Duration::days(7), start_of_week),
            DateRangePreset::ThisMonth => (start_of_month, tomorrow),
            DateRangePreset::LastMonth => {
                let last_day = start_of_month - Duration::days(1);
                (last_day - Duration::days(last_day.day0() as i64), start_of_month)
            }
            DateRangePreset::Day(day) => (day, day + Duration::days(1)),
            DateRangePreset::Custom { start, end } => (start, end + Duration::days(1)),
        };

        DateRange::new(local_midnight(&tz, start), local_midnight(&tz, end))
    }
}

impl FromStr for DateRangePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "today" => Ok(DateRangePreset::Today),
            "yesterday" => Ok(DateRangePreset::Yesterday),
            "thisWeek" | "week" => Ok(DateRangePreset::ThisWeek),
            "lastWeek" => Ok(DateRangePreset::LastWeek),
            "thisMonth" => Ok(DateRangePreset::ThisMonth),
            "lastMonth" => Ok(DateRangePreset::LastMonth),
            other => Err(Error::Validation(format!("Invalid range: {}", other))),
        }
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // A DST jump can skip midnight; the first valid instant is an hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Compound predicate; every set field must hold, unset fields pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub date_range: Option<DateRange>,
    /// Matches either the content sector or the dashboard platform.
    pub sector: Option<Sector>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub kind: Option<AlertKind>,
    pub source: Option<Source>,
    pub search_text: Option<String>,
}

impl FilterCriteria {
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_sector(mut self, sector: Sector) -> Self {
        self.sector = Some(sector);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_kind(mut self, kind: AlertKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn matches(&self, alert: &AnnotatedAlert) -> bool {
        if let Some(range) = &self.date_range {
            match alert.timestamp {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }
        if let Some(sector) = self.sector {
            if alert.sector != sector && alert.platform != sector {
                return false;
            }
        }
        if self.status.is_some_and(|status| alert.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| alert.priority != priority) {
            return false;
        }
        if self.kind.is_some_and(|kind| alert.kind != kind) {
            return false;
        }
        if self.source.is_some_and(|source| alert.source != source) {
            return false;
        }
        match self.search_text.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => matches_text(alert, &needle.to_lowercase()),
            _ => true,
        }
    }
}

fn matches_text(alert: &AnnotatedAlert, needle: &str) -> bool {
    alert.subject().to_lowercase().contains(needle)
        || alert.message().to_lowercase().contains(needle)
        || alert
            .host
            .as_deref()
            .is_some_and(|host| host.to_lowercase().contains(needle))
        || alert
            .problem_id
            .as_deref()
            .is_some_and(|id| id.to_lowercase().contains(needle))
}

/// Order-preserving and idempotent.
pub fn filter(alerts: &[AnnotatedAlert], criteria: &FilterCriteria) -> Vec<AnnotatedAlert> {
    alerts
        .iter()
        .filter(|alert| criteria.matches(alert))
        .cloned()
        .collect()
}
