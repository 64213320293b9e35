// sms_relay/src/logging.rs
// Attempt-level log records emitted by the retry executor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{Level, debug, error, info, trace, warn};

use crate::classifier::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum AttemptEvent {
    Succeeded,
    Retrying,
    DnsUpgrade,
    Rejected,
    Exhausted,
    Cancelled,
}

/// One line of operational visibility for a single attempt.
#[derive(Debug, Clone, Copy,)]
pub struct AttemptRecord<'a,> {
    pub level:   Level,
    pub event:   AttemptEvent,
    pub label:   &'a str,
    pub attempt: u32,
    /// Total attempts allowed under the budget in force.
    pub budget:  u32,
    pub class:   Option<ErrorClass,>,
    pub code:    Option<&'a str,>,
    pub delay:   Option<Duration,>,
}

pub trait AttemptLogger: Send + Sync {
    fn log(&self, record: &AttemptRecord<'_,>,);
}

/// Forwards records to `tracing`.
#[derive(Debug, Clone, Copy, Default,)]
pub struct TracingLogger;

impl AttemptLogger for TracingLogger {
    fn log(&self, r: &AttemptRecord<'_,>,) {
        let class = r.class.map(|c| c.to_string(),).unwrap_or_default();
        let code = r.code.unwrap_or("-",);
        let delay_ms = r.delay.map(|d| d.as_millis() as u64,);
        let text = describe(r,);

        match r.level {
            Level::ERROR => error!(label = r.label, attempt = r.attempt, budget = r.budget, class = %class, code, ?delay_ms, "{}", text),
            Level::WARN => warn!(label = r.label, attempt = r.attempt, budget = r.budget, class = %class, code, ?delay_ms, "{}", text),
            Level::INFO => info!(label = r.label, attempt = r.attempt, budget = r.budget, class = %class, code, ?delay_ms, "{}", text),
            Level::DEBUG => debug!(label = r.label, attempt = r.attempt, budget = r.budget, class = %class, code, ?delay_ms, "{}", text),
            _ => trace!(label = r.label, attempt = r.attempt, budget = r.budget, class = %class, code, ?delay_ms, "{}", text),
        }
    }
}

fn describe(r: &AttemptRecord<'_,>,) -> String {
    match r.event {
        AttemptEvent::Succeeded => {
            format!("{} succeeded on attempt {}/{}", r.label, r.attempt, r.budget)
        },
        AttemptEvent::Retrying => format!(
            "{} failed (attempt {}/{}) [{}]: {}. Retrying in {:.1}s",
            r.label,
            r.attempt,
            r.budget,
            r.class.map(|c| c.to_string(),).unwrap_or_default(),
            r.code.unwrap_or("unknown error",),
            r.delay.unwrap_or_default().as_secs_f64(),
        ),
        AttemptEvent::DnsUpgrade => format!(
            "{}: DNS error detected, using extended retry strategy ({} attempts)",
            r.label, r.budget
        ),
        AttemptEvent::Rejected => format!(
            "{} failed with non-retryable error: {}",
            r.label,
            r.code.unwrap_or("unknown error",)
        ),
        AttemptEvent::Exhausted if r.class.is_some_and(ErrorClass::is_dns,) => format!(
            "{} failed after {} attempts; persistent DNS failure, check resolver configuration and connectivity",
            r.label, r.attempt
        ),
        AttemptEvent::Exhausted => format!("{} failed after {} attempts", r.label, r.attempt),
        AttemptEvent::Cancelled => {
            format!("{} cancelled before attempt {}", r.label, r.attempt)
        },
    }
}

/// Owned copy of an [`AttemptRecord`].
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct LoggedAttempt {
    pub level:   Level,
    pub event:   AttemptEvent,
    pub label:   String,
    pub attempt: u32,
    pub budget:  u32,
    pub class:   Option<ErrorClass,>,
    pub code:    Option<String,>,
    pub delay:   Option<Duration,>,
}

/// Keeps every record in memory, for tests and diagnostics.
#[derive(Debug, Clone, Default,)]
pub struct MemoryLogger {
    records: Arc<Mutex<Vec<LoggedAttempt,>,>,>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self,) -> Vec<LoggedAttempt,> {
        self.records.lock().unwrap_or_else(|e| e.into_inner(),).clone()
    }

    pub fn events(&self,) -> Vec<AttemptEvent,> {
        self.records().into_iter().map(|r| r.event,).collect()
    }
}

impl AttemptLogger for MemoryLogger {
    fn log(&self, r: &AttemptRecord<'_,>,) {
        self.records.lock().unwrap_or_else(|e| e.into_inner(),).push(LoggedAttempt {
            level:   r.level,
            event:   r.event,
            label:   r.label.to_string(),
            attempt: r.attempt,
            budget:  r.budget,
            class:   r.class,
            code:    r.code.map(str::to_string,),
            delay:   r.delay,
        },);
    }
}
