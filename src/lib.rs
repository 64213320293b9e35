// sms_relay/src/lib.rs
// Public API: the retry executor and the SMS gateway client built on it.

pub mod classifier;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod policy;
pub mod retry;
pub mod schedule;
pub mod sms;
pub mod token_cache;

pub use classifier::{ErrorClass, classify};
pub use error::{CallError, RelayError, RemoteError, RemoteFailure, Result};
pub use outcome::{CallReport, Failure, FailureReport, Outcome};
pub use policy::{DnsUpgrade, RetryPolicy};
pub use retry::{RetryExecutor, execute_with_retry};
