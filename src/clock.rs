// sms_relay/src/clock.rs
// Suspension primitive used between attempts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

/// Waits out a backoff delay without blocking the worker thread.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration,);
}

#[derive(Debug, Clone, Copy, Default,)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration,) {
        tokio::time::sleep(delay,).await;
    }
}

/// Fake clock that records every requested delay and returns immediately.
#[derive(Debug, Clone, Default,)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration,>,>,>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self,) -> Vec<Duration,> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner(),).clone()
    }

    pub fn delays_ms(&self,) -> Vec<u64,> {
        self.delays().iter().map(|d| d.as_millis() as u64,).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration,) {
        self.delays.lock().unwrap_or_else(|e| e.into_inner(),).push(delay,);
        tokio::task::yield_now().await;
    }
}
