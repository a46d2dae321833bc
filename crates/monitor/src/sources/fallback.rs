use async_trait::async_trait;

use super::TicketSource;
use crate::{models::RawAlert, Result};

/// Embedded sample rows served while no real fetch has succeeded.
pub fn sample_alerts() -> Vec<RawAlert> {
    vec![
        RawAlert::new(
            1,
            "Problem: TVF Alert",
            "Problem started at 16:22:25 on 2025.09.26\n\
             Problem name: TVF Alert\n\
             Host: Elastalerts\n\
             Severity: Information\n\
             Operational data: America TV caido\n\
             Original problem ID: 11865054",
            "2025-09-26T22:22:31.000Z",
        ),
        RawAlert::new(
            2,
            "Resolved in 1m: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos",
            "Problem has been resolved at 18:56:53 on 2025.09.26\n\
             Problem name: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos\n\
             Problem duration: 1m\n\
             Host: RCS-207-NWC1216\n\
             Severity: Information\n\
             Original problem ID: 11865397",
            "2025-09-27T00:56:55.000Z",
        ),
        RawAlert::new(
            3,
            "Problem: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos",
            "Problem started at 18:55:53 on 2025.09.26\n\
             Problem name: RCS-207-NWC1216 GPU >= 95% por más de 45 minutos\n\
             Host: RCS-207-NWC1216\n\
             Severity: Information\n\
             Original problem ID: 11865397",
            "2025-09-27T00:55:57.000Z",
        ),
        RawAlert::new(
            4,
            "High latency detected in delivery network",
            "Latency over 100ms for more than 5 minutes\n\
             Host: delivery-server-01\n\
             Severity: Warning\n\
             Original problem ID: 11865398",
            "2025-09-26T20:10:00.000Z",
        ),
        RawAlert::new(
            5,
            "Disk space critical on storage server",
            "Disk usage over 95% on /dev/sda1\n\
             Host: storage-server-01\n\
             Severity: Critical\n\
             Original problem ID: 11865396",
            "2025-09-26T18:10:00.000Z",
        ),
        RawAlert::new(
            6,
            "Caida de servicio en cabecera",
            "Incident reported, investigating",
            "2025-09-26 16:30:00",
        ),
    ]
}

pub struct FallbackSource;

#[async_trait]
impl TicketSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self) -> Result<Vec<RawAlert>> {
        Ok(sample_alerts())
    }
}
