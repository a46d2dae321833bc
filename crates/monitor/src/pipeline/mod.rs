//! Alert classification and correlation pipeline.
//!
//! Raw rows are annotated once per fetch (extraction + classification);
//! filtering, correlation and aggregation run over that immutable snapshot
//! on every query.

pub mod aggregate;
pub mod classify;
pub mod correlate;
pub mod extract;
pub mod filter;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::models::{AnnotatedAlert, RawAlert};

pub use aggregate::{aggregate, format_minutes, Stats, StatusCounts};
pub use classify::{classify, Classification, Classifier, KeywordTable};
pub use correlate::{correlate, correlate_sorted, ProblemGroup};
pub use extract::{extract, ExtractedFields};
pub use filter::{filter, DateRange, DateRangePreset, FilterCriteria};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub alerts: Vec<AnnotatedAlert>,
    pub problems: Vec<ProblemGroup>,
    pub stats: Stats,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn annotate(&self, raw: &RawAlert) -> AnnotatedAlert {
        annotate_with(&self.classifier, raw)
    }

    pub fn annotate_all(&self, raws: &[RawAlert]) -> Vec<AnnotatedAlert> {
        raws.iter().map(|raw| self.annotate(raw)).collect()
    }

    /// Filter, correlate and aggregate an annotated snapshot.
    pub fn run(
        &self,
        alerts: &[AnnotatedAlert],
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> PipelineOutput {
        let filtered = filter(alerts, criteria);
        let problems = correlate_sorted(&filtered);
        let stats = aggregate(&filtered, now);

        debug!(
            input = alerts.len(),
            filtered = filtered.len(),
            problems = problems.len(),
            "Pipeline run complete"
        );

        PipelineOutput {
            alerts: filtered,
            problems,
            stats,
        }
    }
}

/// Annotate with the built-in keyword table.
pub fn annotate(raw: &RawAlert) -> AnnotatedAlert {
    let fields = extract(&raw.message);
    let classification = classify(&raw.subject, &raw.message);
    assemble(raw, fields, classification)
}

fn annotate_with(classifier: &Classifier, raw: &RawAlert) -> AnnotatedAlert {
    let fields = extract(&raw.message);
    let classification = classifier.classify(&raw.subject, &raw.message);
    assemble(raw, fields, classification)
}

fn assemble(raw: &RawAlert, fields: ExtractedFields, c: Classification) -> AnnotatedAlert {
    AnnotatedAlert {
        timestamp: raw.created_at(),
        status: c.status,
        priority: c.priority,
        sector: c.sector,
        platform: c.platform,
        source: c.source,
        kind: c.kind,
        request_type: c.request_type,
        problem_name: fields.resolve_problem_name(&raw.subject),
        problem_id: fields.problem_id,
        host: fields.host,
        embedded_timestamp: fields.embedded_timestamp,
        keywords: extract::extract_keywords(&raw.subject, &raw.message),
        has_error: c.has_error,
        raw: raw.clone(),
    }
}
