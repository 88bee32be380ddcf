use async_trait::async_trait;
use std::time::Duration;

/// Source of backoff waits. Tests swap in a timer that returns immediately.
#[async_trait]
pub trait Timer: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
