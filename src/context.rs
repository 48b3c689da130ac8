//! Call context
//!
//! Every blocking call made on behalf of an action (ARM lookup, provider
//! start, import, read, child listing) runs under the action's deadline.

use crate::error::ExportError;
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Instant,
    correlation_id: Uuid,
}

impl CallContext {
    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Sent as `x-ms-correlation-request-id` and recorded on log spans
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run `fut` until it completes or the deadline passes
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Deadline exceeded while {}", what);
                Err(ExportError::DeadlineExceeded(what.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_result_before_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run("adding", async { Ok::<_, anyhow::Error>(1 + 1) }).await.unwrap();
        assert_eq!(value, 2);
        assert!(ctx.remaining() > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = CallContext::with_timeout(Duration::from_millis(10));
        let err = ctx
            .run("waiting forever", std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::DeadlineExceeded(what)) if what == "waiting forever"
        ));
    }

    #[test]
    fn test_run_on_a_blocking_runtime() {
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        let result = tokio_test::block_on(ctx.run("blocking", async { Ok::<_, anyhow::Error>("done") }));
        assert_eq!(tokio_test::assert_ok!(result), "done");
    }

    #[test]
    fn test_each_context_gets_a_correlation_id() {
        let a = CallContext::with_timeout(Duration::from_secs(1));
        let b = CallContext::with_timeout(Duration::from_secs(1));
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
