// sms_relay/tests/retry_tests.rs

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use sms_relay::clock::RecordingSleeper;
use sms_relay::logging::{AttemptEvent, MemoryLogger};
use sms_relay::{
    CallError, CallReport, DnsUpgrade, ErrorClass, Outcome, RemoteError, RetryExecutor,
    RetryPolicy, execute_with_retry,
};
use tokio_util::sync::CancellationToken;

/// Replays a fixed sequence of results, repeating the last one forever.
struct Script {
    steps: Mutex<VecDeque<Result<&'static str, RemoteError,>,>,>,
    calls: AtomicU32,
}

impl Script {
    fn new(steps: Vec<Result<&'static str, RemoteError,>,>,) -> Self {
        Self {
            steps: Mutex::new(steps.into(),),
            calls: AtomicU32::new(0,),
        }
    }

    fn always(err: RemoteError,) -> Self {
        Self::new(vec![Err(err,)],)
    }

    fn call(&self,) -> impl Future<Output = Result<&'static str, RemoteError,>,> + use<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst,);
        let mut steps = self.steps.lock().unwrap();
        let step = if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().expect("script must not be empty",)
        };
        async move { step }
    }

    fn calls(&self,) -> u32 {
        self.calls.load(Ordering::SeqCst,)
    }
}

fn err(code: &str,) -> RemoteError {
    RemoteError::with_code(code, format!("{} raised by test", code),)
}

fn scenario_policy() -> RetryPolicy {
    RetryPolicy::new(2, 1000, 4, 1500,)
        .retryable(["ECONNRESET"],)
        .dns(["ENOTFOUND"],)
}

fn harness(policy: RetryPolicy,) -> (RetryExecutor, RecordingSleeper, MemoryLogger,) {
    let sleeper = RecordingSleeper::new();
    let logger = MemoryLogger::new();
    let executor = RetryExecutor::new(policy,)
        .with_sleeper(sleeper.clone(),)
        .with_logger(logger.clone(),);
    (executor, sleeper, logger,)
}

#[tokio::test]
async fn success_on_first_attempt_does_not_retry() {
    let (executor, sleeper, _,) = harness(scenario_policy(),);
    let script = Script::new(vec![Ok("sent")],);

    let outcome = executor.execute("op", || script.call(),).await;

    assert_eq!(outcome, Outcome::Success { value: "sent", attempts_made: 1 });
    assert_eq!(script.calls(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn non_retryable_error_short_circuits() {
    let (executor, sleeper, logger,) = harness(scenario_policy(),);
    let script = Script::always(err("EBADAUTH",),);

    let outcome = executor.execute("SMS authentication", || script.call(),).await;

    let Outcome::Failure(failure,) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(failure.attempts_made, 1);
    assert!(!failure.was_classified_retryable);
    assert!(!failure.was_dns_class);
    assert_eq!(failure.error.code.as_deref(), Some("EBADAUTH"));
    assert_eq!(script.calls(), 1);
    assert!(sleeper.delays().is_empty());
    assert_eq!(logger.events(), vec![AttemptEvent::Rejected]);
}

#[tokio::test]
async fn transient_errors_are_retried_up_to_the_budget() {
    let policy = RetryPolicy::new(3, 100, 5, 300,).retryable(["ECONNRESET"],);
    let (executor, sleeper, _,) = harness(policy,);
    let script = Script::always(err("ECONNRESET",),);

    let outcome = executor.execute("op", || script.call(),).await;

    let Outcome::Failure(failure,) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.attempts_made, 4);
    assert!(failure.was_classified_retryable);
    assert!(!failure.was_dns_class);
    assert_eq!(script.calls(), 4);
    assert_eq!(sleeper.delays_ms(), vec![100, 200, 400]);
}

#[tokio::test]
async fn recovery_mid_retry_returns_success() {
    let (executor, sleeper, logger,) = harness(RetryPolicy::new(3, 100, 5, 300,).retryable(["ECONNRESET"],),);
    let script = Script::new(vec![Err(err("ECONNRESET",),), Err(err("ECONNRESET",),), Ok("ok",)],);

    let outcome = executor.execute("op", || script.call(),).await;

    assert_eq!(outcome, Outcome::Success { value: "ok", attempts_made: 3 });
    assert_eq!(sleeper.delays_ms(), vec![100, 200]);
    assert_eq!(
        logger.events(),
        vec![AttemptEvent::Retrying, AttemptEvent::Retrying, AttemptEvent::Succeeded]
    );
}

#[tokio::test]
async fn dns_failures_use_the_extended_budget_and_base() {
    let (executor, sleeper, logger,) = harness(scenario_policy(),);
    let script = Script::new(vec![
        Err(err("ENOTFOUND",),),
        Err(err("ENOTFOUND",),),
        Err(err("ENOTFOUND",),),
        Ok("delivered",),
    ],);

    let outcome = executor.execute("SMS send", || script.call(),).await;

    assert_eq!(outcome, Outcome::Success { value: "delivered", attempts_made: 4 });
    assert_eq!(sleeper.delays_ms(), vec![1500, 3000, 6000]);

    let upgrades: Vec<_,> = logger
        .records()
        .into_iter()
        .filter(|r| r.event == AttemptEvent::DnsUpgrade,)
        .collect();
    assert_eq!(upgrades.len(), 1);
    assert_eq!(upgrades[0].budget, 5);
    assert_eq!(upgrades[0].class, Some(ErrorClass::RetryableDns));
}

#[tokio::test]
async fn dns_upgrade_persists_after_a_plain_network_error() {
    let (executor, sleeper, _,) = harness(scenario_policy(),);
    let script = Script::new(vec![Err(err("ENOTFOUND",),), Err(err("ECONNRESET",),)],);

    let outcome = executor.execute("op", || script.call(),).await;

    let Outcome::Failure(failure,) = outcome else {
        panic!("expected failure");
    };
    // maxAttempts = 2 would stop at 3 attempts; the DNS budget allows 5.
    assert_eq!(failure.attempts_made, 5);
    assert!(failure.was_classified_retryable);
    assert!(!failure.was_dns_class);
    assert_eq!(sleeper.delays_ms(), vec![1500, 3000, 6000, 12000]);
}

#[tokio::test]
async fn late_dns_failure_upgrades_by_default() {
    let (executor, sleeper, _,) = harness(scenario_policy(),);
    let script = Script::new(vec![Err(err("ECONNRESET",),), Err(err("ENOTFOUND",),)],);

    let outcome = executor.execute("op", || script.call(),).await;

    assert_eq!(outcome.attempts_made(), 5);
    assert_eq!(sleeper.delays_ms(), vec![1000, 3000, 6000, 12000]);
}

#[tokio::test]
async fn first_attempt_only_mode_ignores_late_dns_failures() {
    let policy = scenario_policy().with_dns_upgrade(DnsUpgrade::FirstAttemptOnly,);
    let (executor, sleeper, logger,) = harness(policy,);
    let script = Script::new(vec![Err(err("ECONNRESET",),), Err(err("ENOTFOUND",),)],);

    let outcome = executor.execute("op", || script.call(),).await;

    let Outcome::Failure(failure,) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.attempts_made, 3);
    assert!(failure.was_dns_class);
    assert_eq!(sleeper.delays_ms(), vec![1000, 2000]);
    assert!(!logger.events().contains(&AttemptEvent::DnsUpgrade));
}

#[tokio::test]
async fn persistent_dns_failure_is_reported_as_dns_class() {
    let (executor, _, logger,) = harness(scenario_policy(),);
    let script = Script::always(RemoteError::new(None, "getaddrinfo EAI_AGAIN gateway.example",),);

    let outcome = executor.execute("SMS send", || script.call(),).await;

    assert_eq!(outcome.attempts_made(), 5);
    let CallReport::Failure(report,) = outcome.into_report() else {
        panic!("expected failure report");
    };
    assert!(!report.success);
    assert!(report.is_dns_class);
    assert_eq!(report.code, None);
    assert_eq!(report.error, "getaddrinfo EAI_AGAIN gateway.example");
    assert_eq!(logger.events().last(), Some(&AttemptEvent::Exhausted));
}

#[tokio::test]
async fn rejected_call_reports_without_delay() {
    let (executor, sleeper, _,) = harness(scenario_policy(),);
    let script = Script::new(vec![Err(err("EBADAUTH",),), Ok("never",)],);

    let outcome = executor.execute("op", || script.call(),).await;

    assert_eq!(outcome.attempts_made(), 1);
    assert!(!outcome.is_success());
    assert!(sleeper.delays().is_empty());
    let err = outcome.into_value("op",).unwrap_err();
    assert!(matches!(err, CallError::Rejected { attempts: 1, .. }));
}

#[tokio::test]
async fn classification_is_independent_of_history() {
    let policy = scenario_policy();
    let dns = err("ENOTFOUND",);
    let plain = err("ECONNRESET",);

    let first = policy.classify(&dns,);
    let _ = policy.classify(&plain,);
    let second = policy.classify(&dns,);

    assert_eq!(first, second);
    assert_eq!(first, ErrorClass::RetryableDns);
}

#[tokio::test]
async fn concurrent_calls_keep_separate_budgets() {
    let (executor, _, _,) = harness(scenario_policy(),);
    let dns = Script::always(err("ENOTFOUND",),);
    let plain = Script::always(err("ECONNRESET",),);

    let (a, b,) = tokio::join!(
        executor.execute("dns", || dns.call()),
        executor.execute("plain", || plain.call()),
    );

    assert_eq!(a.attempts_made(), 5);
    assert_eq!(b.attempts_made(), 3);
}

#[tokio::test]
async fn cancelled_token_prevents_any_attempt() {
    let (executor, _, logger,) = harness(scenario_policy(),);
    let script = Script::new(vec![Ok("unused",)],);
    let token = CancellationToken::new();
    token.cancel();

    let outcome = executor.execute_with_cancel("op", &token, || script.call(),).await;

    assert_eq!(outcome, Outcome::Cancelled { attempts_made: 0, last_error: None });
    assert_eq!(script.calls(), 0);
    assert_eq!(logger.events(), vec![AttemptEvent::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_backoff_sleep() {
    let logger = MemoryLogger::new();
    let executor = RetryExecutor::new(scenario_policy(),).with_logger(logger.clone(),);
    let script = Script::always(err("ENOTFOUND",),);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100,),).await;
        canceller.cancel();
    },);

    let outcome = executor.execute_with_cancel("SMS send", &token, || script.call(),).await;

    let Outcome::Cancelled { attempts_made, last_error, } = outcome else {
        panic!("expected cancellation, got {:?}", outcome);
    };
    assert_eq!(attempts_made, 1);
    assert_eq!(last_error.and_then(|e| e.code), Some("ENOTFOUND".to_string()));
    assert_eq!(script.calls(), 1);
    assert_eq!(logger.events().last(), Some(&AttemptEvent::Cancelled));
}

#[tokio::test]
async fn one_shot_helper_propagates_rejections() {
    let script = Script::always(err("HTTP_401",),);

    let result = execute_with_retry(&scenario_policy(), "SMS authentication", || script.call(),).await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert_eq!(
        err.to_string(),
        "SMS authentication rejected after 1 attempt(s): HTTP_401 raised by test"
    );
}
