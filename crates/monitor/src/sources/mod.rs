mod fallback;
mod sqlite;
mod ticket_api;
mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use fallback::{sample_alerts, FallbackSource};
pub use sqlite::SqliteTicketSource;
pub use ticket_api::{HttpTicketSource, Pagination, TicketEnvelope};
pub use traits::TicketSource;

#[cfg(test)]
pub use traits::MockTicketSource;

use crate::config::{SourceConfig, SourceKind};

pub async fn create_source(config: &SourceConfig) -> crate::Result<Arc<dyn TicketSource>> {
    match config.kind {
        SourceKind::Http => Ok(Arc::new(
            HttpTicketSource::new(config.api_url.clone())
                .with_limit(config.limit)
                .with_timeout(Duration::from_secs(config.timeout_secs)),
        )),
        SourceKind::Sqlite => {
            let source = SqliteTicketSource::new(&config.sqlite_path, config.limit).await?;
            source.init().await?;
            Ok(Arc::new(source))
        }
    }
}
