// sms_relay/src/outcome.rs
// Terminal results of a retried call and their caller-facing projections.

use serde::Serialize;

use crate::error::{CallError, RemoteFailure};

/// Details of a call that ended without a value.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Failure<E,> {
    pub error:                    E,
    pub attempts_made:            u32,
    pub was_classified_retryable: bool,
    pub was_dns_class:            bool,
}

#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum Outcome<T, E,> {
    Success {
        value:         T,
        attempts_made: u32,
    },
    Failure(Failure<E,>,),
    /// The caller's cancellation token fired before the call settled.
    Cancelled {
        attempts_made: u32,
        last_error:    Option<E,>,
    },
}

/// Structured failure for callers that must not fail themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub success:       bool,
    pub error:         String,
    pub code:          Option<String,>,
    #[serde(rename = "isDNSClass")]
    pub is_dns_class:  bool,
    pub attempts_made: u32,
}

impl FailureReport {
    pub fn new(error: impl Into<String,>, code: Option<String,>, is_dns_class: bool,) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
            is_dns_class,
            attempts_made: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
#[serde(untagged)]
pub enum CallReport<T,> {
    Success(T,),
    Failure(FailureReport,),
}

impl<T,> CallReport<T,> {
    pub fn is_success(&self,) -> bool {
        matches!(self, CallReport::Success(_))
    }
}

impl<T, E: RemoteFailure,> Outcome<T, E,> {
    pub fn attempts_made(&self,) -> u32 {
        match self {
            Outcome::Success { attempts_made, .. } | Outcome::Cancelled { attempts_made, .. } => {
                *attempts_made
            },
            Outcome::Failure(failure,) => failure.attempts_made,
        }
    }

    pub fn is_success(&self,) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn error(&self,) -> Option<&E,> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure,) => Some(&failure.error,),
            Outcome::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Never fails: the value passes through unchanged, anything else becomes
    /// a [`FailureReport`].
    pub fn into_report(self,) -> CallReport<T,> {
        match self {
            Outcome::Success { value, .. } => CallReport::Success(value,),
            Outcome::Failure(failure,) => CallReport::Failure(FailureReport {
                success:       false,
                error:         failure.error.message(),
                code:          failure.error.code().map(str::to_string,),
                is_dns_class:  failure.was_dns_class,
                attempts_made: failure.attempts_made,
            },),
            Outcome::Cancelled { attempts_made, last_error, } => CallReport::Failure(FailureReport {
                success: false,
                error: "operation cancelled".to_string(),
                code: last_error.as_ref().and_then(|e| e.code(),).map(str::to_string,),
                is_dns_class: false,
                attempts_made,
            },),
        }
    }

    /// Returns the value, or the last error wrapped in a [`CallError`].
    pub fn into_value(self, label: &str,) -> Result<T, CallError<E,>,> {
        match self {
            Outcome::Success { value, .. } => Ok(value,),
            Outcome::Failure(failure,) if failure.was_classified_retryable => {
                Err(CallError::Exhausted {
                    label:    label.to_string(),
                    attempts: failure.attempts_made,
                    dns:      failure.was_dns_class,
                    source:   failure.error,
                },)
            },
            Outcome::Failure(failure,) => Err(CallError::Rejected {
                label:    label.to_string(),
                attempts: failure.attempts_made,
                source:   failure.error,
            },),
            Outcome::Cancelled { attempts_made, last_error, } => Err(CallError::Cancelled {
                label: label.to_string(),
                attempts: attempts_made,
                last_error,
            },),
        }
    }
}
