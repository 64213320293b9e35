// sms_relay/src/error.rs
// Error types for outbound calls and for the relay as a whole.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// A failure raised by a remote operation that the retry executor can classify.
///
/// The classifier only needs a machine-readable code (when the transport
/// provides one) and a human-readable message.
pub trait RemoteFailure: StdError + Send + Sync + 'static {
    /// Machine-readable code such as `ECONNRESET` or `ENOTFOUND`.
    fn code(&self,) -> Option<&str,>;

    fn message(&self,) -> String {
        self.to_string()
    }
}

/// Concrete failure of an HTTP call made by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error,)]
#[error("{message}")]
pub struct RemoteError {
    pub code:    Option<String,>,
    pub message: String,
    pub status:  Option<u16,>,
}

impl RemoteError {
    pub fn new(code: Option<&str,>, message: impl Into<String,>,) -> Self {
        Self {
            code:    code.map(str::to_string,),
            message: message.into(),
            status:  None,
        }
    }

    pub fn with_code(code: &str, message: impl Into<String,>,) -> Self {
        Self::new(Some(code,), message,)
    }

    pub fn http_status(status: u16, message: impl Into<String,>,) -> Self {
        Self {
            code:    Some(format!("HTTP_{}", status),),
            message: message.into(),
            status:  Some(status,),
        }
    }
}

impl RemoteFailure for RemoteError {
    fn code(&self,) -> Option<&str,> {
        self.code.as_deref()
    }

    fn message(&self,) -> String {
        self.message.clone()
    }
}

impl From<reqwest::Error,> for RemoteError {
    fn from(err: reqwest::Error,) -> Self {
        let message = error_chain(&err,);

        if let Some(status,) = err.status() {
            return RemoteError::http_status(status.as_u16(), message,);
        }

        let code = if err.is_timeout() {
            "ETIMEDOUT"
        } else if let Some(code,) = io_code(&err,) {
            code
        } else if is_resolver_failure(&message,) {
            "ENOTFOUND"
        } else if err.is_connect() {
            "ERR_NETWORK"
        } else if err.is_body() || err.is_decode() {
            "ERR_BAD_RESPONSE"
        } else {
            "ERR_NETWORK"
        };

        RemoteError::with_code(code, message,)
    }
}

/// Joins an error and all of its sources with `": "`.
fn error_chain(err: &(dyn StdError + 'static),) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner,) = source {
        let text = inner.to_string();
        if !parts.iter().any(|p| p == &text,) {
            parts.push(text,);
        }
        source = inner.source();
    }
    parts.join(": ",)
}

fn io_code(err: &(dyn StdError + 'static),) -> Option<&'static str,> {
    let mut source: Option<&(dyn StdError + 'static),> = Some(err,);
    while let Some(inner,) = source {
        if let Some(io_err,) = inner.downcast_ref::<io::Error>() {
            let code = match io_err.kind() {
                io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED",),
                io::ErrorKind::ConnectionReset => Some("ECONNRESET",),
                io::ErrorKind::ConnectionAborted => Some("ECONNABORTED",),
                io::ErrorKind::TimedOut => Some("ETIMEDOUT",),
                io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                    Some("ENETUNREACH",)
                },
                _ => None,
            };
            if code.is_some() {
                return code;
            }
        }
        source = inner.source();
    }
    None
}

fn is_resolver_failure(message: &str,) -> bool {
    let m = message.to_lowercase();
    m.contains("dns error",) || m.contains("failed to lookup address",)
}

/// Terminal failure of a retried call, as surfaced to callers that propagate errors.
#[derive(Debug, Error,)]
pub enum CallError<E,>
where
    E: StdError + 'static,
{
    #[error("{label} rejected after {attempts} attempt(s): {source}")]
    Rejected {
        label:    String,
        attempts: u32,
        #[source]
        source:   E,
    },
    #[error("{label} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        label:    String,
        attempts: u32,
        dns:      bool,
        #[source]
        source:   E,
    },
    #[error("{label} cancelled after {attempts} attempt(s)")]
    Cancelled {
        label:      String,
        attempts:   u32,
        last_error: Option<E,>,
    },
}

impl<E: StdError + 'static,> CallError<E,> {
    pub fn attempts(&self,) -> u32 {
        match self {
            CallError::Rejected { attempts, .. }
            | CallError::Exhausted { attempts, .. }
            | CallError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last error the operation produced, if any attempt ran.
    pub fn last_error(&self,) -> Option<&E,> {
        match self {
            CallError::Rejected { source, .. } | CallError::Exhausted { source, .. } => {
                Some(source,)
            },
            CallError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    pub fn into_last_error(self,) -> Option<E,> {
        match self {
            CallError::Rejected { source, .. } | CallError::Exhausted { source, .. } => {
                Some(source,)
            },
            CallError::Cancelled { last_error, .. } => last_error,
        }
    }
}

#[derive(Debug, Error,)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    Configuration(String,),
    #[error(transparent)]
    Call(#[from] CallError<RemoteError,>,),
    #[error("Invalid response: {0}")]
    InvalidResponse(String,),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String,),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error,),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error,),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError,),
    #[error("Other error: {0}")]
    Other(String,),
}

impl RelayError {
    /// Code of the underlying remote failure, when there is one.
    pub fn code(&self,) -> Option<&str,> {
        match self {
            RelayError::Call(call,) => call.last_error().and_then(|e| e.code(),),
            _ => None,
        }
    }
}

pub type Result<T,> = std::result::Result<T, RelayError,>;
