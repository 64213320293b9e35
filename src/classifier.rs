// sms_relay/src/classifier.rs
// Sorts remote failures into retry classes.

use std::fmt;

use serde::Serialize;

use crate::error::RemoteFailure;
use crate::policy::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize,)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    NonRetryable,
    Retryable,
    RetryableDns,
}

impl ErrorClass {
    pub fn is_retryable(self,) -> bool {
        !matches!(self, ErrorClass::NonRetryable)
    }

    pub fn is_dns(self,) -> bool {
        matches!(self, ErrorClass::RetryableDns)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        let label = match self {
            ErrorClass::NonRetryable => "non-retryable",
            ErrorClass::Retryable => "network",
            ErrorClass::RetryableDns => "dns",
        };
        f.write_str(label,)
    }
}

/// Classifies a failure against the policy's code sets.
///
/// DNS codes win over ordinary retryable codes, and a DNS lookup message
/// matches even when the failure carries no code at all.
pub fn classify<E: RemoteFailure + ?Sized,>(error: &E, policy: &RetryPolicy,) -> ErrorClass {
    let code = error.code();

    if code.is_some_and(|c| policy.dns_codes.contains(c,),) {
        return ErrorClass::RetryableDns;
    }

    let message = error.message();
    if policy
        .dns_message_patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && message.contains(pattern.as_str(),),)
    {
        return ErrorClass::RetryableDns;
    }

    if code.is_some_and(|c| policy.retryable_codes.contains(c,),) {
        return ErrorClass::Retryable;
    }

    ErrorClass::NonRetryable
}

impl RetryPolicy {
    pub fn classify<E: RemoteFailure + ?Sized,>(&self, error: &E,) -> ErrorClass {
        classify(error, self,)
    }
}
