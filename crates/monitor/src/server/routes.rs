use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::Server;
use crate::{
    metrics::gather_metrics,
    models::AnnotatedAlert,
    pipeline::{DateRangePreset, FilterCriteria, PipelineOutput},
    Error, Result,
};

/// Query string shared by the listing endpoints. Values are parsed by hand
/// so that bad input yields a JSON 400 rather than the extractor's text.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub range: Option<String>,
    pub day: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub sector: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
    pub search: Option<String>,
    /// UTC offset in hours (e.g. `-6`, `5.5`) for date presets and
    /// embedded-timestamp discrepancies. Defaults to the server's zone.
    pub tz_offset: Option<String>,
}

impl FilterQuery {
    pub fn offset(&self) -> Result<Option<FixedOffset>> {
        let Some(raw) = self.tz_offset.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let invalid = || {
            Error::Validation(format!("Invalid tz_offset: {} (expected hours, -14 to 14)", raw))
        };
        let hours: f64 = raw.trim().parse().map_err(|_| invalid())?;
        if !hours.is_finite() || hours.abs() > 14.0 {
            return Err(invalid());
        }
        FixedOffset::east_opt((hours * 3600.0).round() as i32)
            .map(Some)
            .ok_or_else(invalid)
    }

    pub fn into_criteria<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Result<FilterCriteria> {
        let preset = match (present(self.day), present(self.start), present(self.end)) {
            (Some(day), _, _) => Some(DateRangePreset::Day(parse_date("day", &day)?)),
            (None, Some(start), Some(end)) => Some(DateRangePreset::Custom {
                start: parse_date("start", &start)?,
                end: parse_date("end", &end)?,
            }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(Error::Validation(
                    "start and end must be given together".to_string(),
                ))
            }
            (None, None, None) => match present(self.range) {
                Some(range) if range != "all" => Some(range.parse()?),
                _ => None,
            },
        };

        Ok(FilterCriteria {
            date_range: preset.map(|p| p.resolve(now)),
            sector: present(self.sector).map(|s| s.parse()).transpose()?,
            status: present(self.status).map(|s| s.parse()).transpose()?,
            priority: present(self.priority).map(|s| s.parse()).transpose()?,
            kind: present(self.kind).map(|s| s.parse()).transpose()?,
            source: present(self.source).map(|s| s.parse()).transpose()?,
            search_text: present(self.search),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("Invalid {}: {} (expected YYYY-MM-DD)", field, raw)))
}

fn error_response(err: &Error) -> Response {
    let (status, label) = match err {
        Error::Validation(_) => (StatusCode::BAD_REQUEST, "Bad request"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    let message = match err {
        Error::Validation(msg) => msg.clone(),
        other => other.to_string(),
    };
    (status, Json(json!({ "error": label, "message": message }))).into_response()
}

async fn run_query(
    server: &Server,
    query: FilterQuery,
) -> Result<(PipelineOutput, Option<FixedOffset>)> {
    let offset = query.offset()?;
    let criteria = match offset {
        Some(tz) => query.into_criteria(&Utc::now().with_timezone(&tz))?,
        None => query.into_criteria(&Local::now())?,
    };
    let snapshot = server.poller.snapshot().await;
    let output = server.poller.pipeline().run(&snapshot.alerts, &criteria, Utc::now());
    Ok((output, offset))
}

/// Listed alert with its embedded-timestamp discrepancy.
#[derive(Debug, Serialize)]
struct AlertView<'a> {
    #[serde(flatten)]
    alert: &'a AnnotatedAlert,
    discrepancy_hours: Option<f64>,
}

impl<'a> AlertView<'a> {
    fn new(alert: &'a AnnotatedAlert, offset: Option<FixedOffset>) -> Self {
        let discrepancy_hours = match offset {
            Some(tz) => alert.discrepancy_hours(&tz),
            None => alert.discrepancy_hours(&Local),
        };
        Self {
            alert,
            discrepancy_hours,
        }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_alerts(
    State(server): State<Arc<Server>>,
    Query(query): Query<FilterQuery>,
) -> Response {
    match run_query(&server, query).await {
        Ok((output, offset)) => {
            let views: Vec<AlertView> = output
                .alerts
                .iter()
                .map(|alert| AlertView::new(alert, offset))
                .collect();
            Json(views).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn list_problems(
    State(server): State<Arc<Server>>,
    Query(query): Query<FilterQuery>,
) -> Response {
    match run_query(&server, query).await {
        Ok((output, _)) => Json(output.problems).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn stats(
    State(server): State<Arc<Server>>,
    Query(query): Query<FilterQuery>,
) -> Response {
    match run_query(&server, query).await {
        Ok((output, _)) => Json(output.stats).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn snapshot(State(server): State<Arc<Server>>) -> Response {
    Json(server.poller.snapshot().await.info()).into_response()
}

pub async fn refresh(State(server): State<Arc<Server>>) -> Response {
    info!("Manual refresh requested");
    Json(server.poller.refresh().await).into_response()
}
