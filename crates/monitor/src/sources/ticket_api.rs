//! Ticket REST API source.
//!
//! Reads `GET {base}/tickets?limit=N&page=P`, which answers with
//! `{success, data, pagination, error}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::TicketSource;
use crate::{models::RawAlert, Error, Result};

pub const DEFAULT_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
pub struct TicketEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<RawAlert>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TicketEnvelope {
    pub fn into_alerts(self) -> Result<Vec<RawAlert>> {
        if !self.success {
            return Err(Error::Upstream(
                self.error.unwrap_or_else(|| "success=false".to_string()),
            ));
        }
        Ok(self.data)
    }
}

pub struct HttpTicketSource {
    base_url: String,
    client: Client,
    limit: u32,
    timeout: Duration,
}

impl HttpTicketSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            limit: DEFAULT_LIMIT,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_page(&self, page: u32) -> Result<TicketEnvelope> {
        let url = format!("{}/tickets", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", self.limit), ("page", page)])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ticket API returned {}: {}", status, body);
            return Err(Error::Upstream(format!("{} returned {}", url, status)));
        }

        let envelope: TicketEnvelope = response.json().await?;
        if let Some(pagination) = &envelope.pagination {
            debug!(
                page = pagination.page,
                total = pagination.total,
                total_pages = pagination.total_pages,
                "Fetched ticket page"
            );
        }
        Ok(envelope)
    }
}

#[async_trait]
impl TicketSource for HttpTicketSource {
    fn name(&self) -> &str {
        "ticket-api"
    }

    async fn fetch(&self) -> Result<Vec<RawAlert>> {
        self.fetch_page(1).await?.into_alerts()
    }
}
