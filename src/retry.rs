// sms_relay/src/retry.rs
// Attempt loop that drives a fallible remote operation under a retry policy.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::classifier::ErrorClass;
use crate::clock::{Sleeper, TokioSleeper};
use crate::error::{CallError, RemoteFailure};
use crate::logging::{AttemptEvent, AttemptLogger, AttemptRecord, TracingLogger};
use crate::outcome::{Failure, Outcome};
use crate::policy::RetryPolicy;
use crate::schedule::AttemptState;

/// Runs remote operations with classified retries and doubling backoff.
///
/// The executor holds no per-call state, so one instance can serve any number
/// of concurrent calls. It does not deduplicate attempts: an operation handed
/// to it must be safe to invoke more than once for the same logical request.
#[derive(Clone,)]
pub struct RetryExecutor {
    policy:  Arc<RetryPolicy,>,
    sleeper: Arc<dyn Sleeper,>,
    logger:  Arc<dyn AttemptLogger,>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result {
        f.debug_struct("RetryExecutor",).field("policy", &self.policy,).finish_non_exhaustive()
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy,) -> Self {
        Self::from_shared(Arc::new(policy,),)
    }

    pub fn from_shared(policy: Arc<RetryPolicy,>,) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper,),
            logger: Arc::new(TracingLogger,),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static,) -> Self {
        self.sleeper = Arc::new(sleeper,);
        self
    }

    pub fn with_logger(mut self, logger: impl AttemptLogger + 'static,) -> Self {
        self.logger = Arc::new(logger,);
        self
    }

    pub fn policy(&self,) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<F, Fut, T, E,>(&self, label: &str, operation: F,) -> Outcome<T, E,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E,>,>,
        E: RemoteFailure,
    {
        self.run(label, None, operation,).await
    }

    /// Like [`RetryExecutor::execute`], but gives up as soon as `cancel` fires.
    /// The token is checked before every attempt and raced against every
    /// backoff sleep.
    pub async fn execute_with_cancel<F, Fut, T, E,>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Outcome<T, E,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E,>,>,
        E: RemoteFailure,
    {
        self.run(label, Some(cancel,), operation,).await
    }

    async fn run<F, Fut, T, E,>(
        &self,
        label: &str,
        cancel: Option<&CancellationToken,>,
        mut operation: F,
    ) -> Outcome<T, E,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E,>,>,
        E: RemoteFailure,
    {
        let mut state = AttemptState::new(&self.policy,);
        let mut last_error: Option<E,> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if cancel.is_some_and(CancellationToken::is_cancelled,) {
                self.emit(AttemptEvent::Cancelled, Level::ERROR, label, attempt, &state, None, None, None,);
                return Outcome::Cancelled {
                    attempts_made: attempt - 1,
                    last_error,
                };
            }

            let error = match operation().await {
                Ok(value,) => {
                    let level = if attempt > 1 { Level::INFO } else { Level::DEBUG };
                    self.emit(AttemptEvent::Succeeded, level, label, attempt, &state, None, None, None,);
                    return Outcome::Success {
                        value,
                        attempts_made: attempt,
                    };
                },
                Err(e,) => e,
            };

            let class = self.policy.classify(&error,);
            let code = error.code();

            if !class.is_retryable() {
                self.emit(AttemptEvent::Rejected, Level::ERROR, label, attempt, &state, Some(class,), code, None,);
                return Outcome::Failure(Failure {
                    error,
                    attempts_made: attempt,
                    was_classified_retryable: false,
                    was_dns_class: false,
                },);
            }

            let was_upgraded = state.is_upgraded();
            let delay = state.schedule(class,);
            if !was_upgraded && state.is_upgraded() {
                self.emit(AttemptEvent::DnsUpgrade, Level::WARN, label, attempt, &state, Some(class,), code, None,);
            }

            let Some(delay,) = delay else {
                self.emit(AttemptEvent::Exhausted, Level::ERROR, label, attempt, &state, Some(class,), code, None,);
                return Outcome::Failure(Failure {
                    error,
                    attempts_made: attempt,
                    was_classified_retryable: true,
                    was_dns_class: class == ErrorClass::RetryableDns,
                },);
            };

            self.emit(AttemptEvent::Retrying, Level::WARN, label, attempt, &state, Some(class,), code, Some(delay,),);
            last_error = Some(error,);

            match cancel {
                Some(token,) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            self.emit(AttemptEvent::Cancelled, Level::ERROR, label, attempt + 1, &state, None, None, None,);
                            return Outcome::Cancelled {
                                attempts_made: attempt,
                                last_error,
                            };
                        }
                        _ = self.sleeper.sleep(delay) => {}
                    }
                },
                None => self.sleeper.sleep(delay,).await,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        event: AttemptEvent,
        level: Level,
        label: &str,
        attempt: u32,
        state: &AttemptState,
        class: Option<ErrorClass,>,
        code: Option<&str,>,
        delay: Option<std::time::Duration,>,
    ) {
        self.logger.log(&AttemptRecord {
            level,
            event,
            label,
            attempt,
            budget: state.total_budget(),
            class,
            code,
            delay,
        },);
    }
}

/// One-shot helper for callers that want the value or an error, using the
/// tokio timer and `tracing` output.
pub async fn execute_with_retry<F, Fut, T, E,>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, CallError<E,>,>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E,>,>,
    E: RemoteFailure,
{
    RetryExecutor::new(policy.clone(),)
        .execute(label, operation,)
        .await
        .into_value(label,)
}
