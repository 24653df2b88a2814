use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::error;

use crate::error::{AppError, Result};
use crate::metrics;

/// Run an upstream call under `duration`.
///
/// Both a timeout and an upstream error surface as `UpstreamUnavailable`,
/// labelled with `upstream` in logs and metrics.
pub async fn with_upstream_timeout<F, T>(upstream: &str, duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            metrics::record_upstream_failure(upstream, "error");
            error!(upstream, error = %e, "Upstream call failed");
            Err(AppError::UpstreamUnavailable(format!("{} failed: {}", upstream, e)))
        }
        Err(_) => {
            metrics::record_upstream_failure(upstream, "timeout");
            error!(upstream, timeout_ms = duration.as_millis() as u64, "Upstream call timed out");
            Err(AppError::UpstreamUnavailable(format!(
                "{} timed out after {:?}",
                upstream, duration
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let value = with_upstream_timeout("content_store", Duration::from_secs(1), async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_error_becomes_upstream_unavailable() {
        let result: Result<()> = with_upstream_timeout("follow_graph", Duration::from_secs(1), async {
            Err(AppError::Database("connection refused".to_string()))
        })
        .await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_timeout_becomes_upstream_unavailable() {
        let result: Result<()> = with_upstream_timeout("content_store", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    }
}
