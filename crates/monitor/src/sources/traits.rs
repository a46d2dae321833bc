use async_trait::async_trait;

use crate::{models::RawAlert, Result};

/// Upstream ticket store. Implementations return rows newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<RawAlert>>;
}
