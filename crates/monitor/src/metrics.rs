use lazy_static::lazy_static;
use prometheus::{
    core::Collector, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref REFRESHES_TOTAL: IntCounter = IntCounter::new(
        "ticket_monitor_refreshes_total",
        "Total number of snapshot refreshes started."
    )
    .expect("valid metric definition");
    pub static ref FETCH_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "ticket_monitor_fetch_failures_total",
        "Total number of failed upstream fetches."
    )
    .expect("valid metric definition");
    pub static ref STALE_REFRESHES_TOTAL: IntCounter = IntCounter::new(
        "ticket_monitor_stale_refreshes_total",
        "Refresh results dropped because a newer refresh already published."
    )
    .expect("valid metric definition");
    pub static ref ALERTS_FETCHED_TOTAL: IntCounter = IntCounter::new(
        "ticket_monitor_alerts_fetched_total",
        "Total number of raw alerts fetched from the upstream source."
    )
    .expect("valid metric definition");
    pub static ref SNAPSHOT_ALERTS: IntGauge = IntGauge::new(
        "ticket_monitor_snapshot_alerts",
        "Number of alerts in the published snapshot."
    )
    .expect("valid metric definition");
    pub static ref DEGRADED: IntGauge = IntGauge::new(
        "ticket_monitor_degraded",
        "1 while the published snapshot is fallback or stale data."
    )
    .expect("valid metric definition");
    pub static ref REFRESH_DURATION_SECONDS: Histogram = Histogram::with_opts(HistogramOpts::new(
        "ticket_monitor_refresh_duration_seconds",
        "Time spent fetching and annotating one snapshot."
    ))
    .expect("valid metric definition");
}

/// Register every collector with `REGISTRY`. Safe to call more than once.
pub fn register_metrics() -> crate::Result<()> {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(REFRESHES_TOTAL.clone()),
        Box::new(FETCH_FAILURES_TOTAL.clone()),
        Box::new(STALE_REFRESHES_TOTAL.clone()),
        Box::new(ALERTS_FETCHED_TOTAL.clone()),
        Box::new(SNAPSHOT_ALERTS.clone()),
        Box::new(DEGRADED.clone()),
        Box::new(REFRESH_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();

        REFRESHES_TOTAL.inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("ticket_monitor_refreshes_total"));
        assert!(text.contains("ticket_monitor_degraded"));
    }
}
