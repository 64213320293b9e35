// sms_relay/src/sms/mod.rs
// Client for the bulk SMS gateway used for attendance notifications.

pub mod msisdn;
pub mod payload;

use std::sync::Arc;

use chrono::{Local, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{Campaign, SmsConfig};
use crate::error::{CallError, RelayError, RemoteError, RemoteFailure, Result};
use crate::outcome::{CallReport, FailureReport};
use crate::policy::RetryPolicy;
use crate::retry::RetryExecutor;
use crate::token_cache::{InMemoryTokenCache, TokenCache};

pub use payload::{AttendanceEvent, BulkSmsRequest, MessageType, StudentContact};

pub const AUTH_LABEL: &str = "SMS authentication";
pub const SEND_LABEL: &str = "SMS send";
pub const STATUS_LABEL: &str = "SMS status check";

pub const AUTH_PATH: &str = "api/AuthJwt/Authenticate";

pub const INVALID_RECIPIENT_MESSAGE: &str =
    "Invalid recipient phone number (requires 10-14 digits including country code).";

/// Status and body of a gateway response that passed the status check.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct GatewayResponse {
    pub status: u16,
    pub body:   String,
}

impl GatewayResponse {
    /// The body as JSON, or as a JSON string when it is not JSON.
    pub fn json(&self,) -> Value {
        serde_json::from_str(&self.body,).unwrap_or_else(|_| Value::String(self.body.clone(),),)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize,)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceipt {
    pub success:     bool,
    pub data:        Value,
    pub campaign_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning:     Option<String,>,
}

/// Result of a send. Sending never fails the caller; failures are reported.
#[derive(Debug, Clone, PartialEq, Serialize,)]
#[serde(untagged)]
pub enum SmsReport {
    Sent(SmsReceipt,),
    Failed(FailureReport,),
}

impl SmsReport {
    pub fn is_success(&self,) -> bool {
        matches!(self, SmsReport::Sent(_))
    }
}

#[derive(Serialize,)]
struct AuthRequest<'a,> {
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}

pub struct SmsClient {
    http:     Client,
    config:   SmsConfig,
    executor: RetryExecutor,
    tokens:   Arc<dyn TokenCache,>,
}

impl SmsClient {
    pub fn new(config: SmsConfig, executor: RetryExecutor, tokens: Arc<dyn TokenCache,>,) -> Result<Self,> {
        let http = Client::builder().build().map_err(|e| {
            RelayError::Configuration(format!("Failed to build HTTP client: {}", e),)
        },)?;
        Ok(Self {
            http,
            config,
            executor,
            tokens,
        },)
    }

    /// Client with the tokio timer, `tracing` output and a process-local token cache.
    pub fn with_policy(config: SmsConfig, policy: RetryPolicy,) -> Result<Self,> {
        policy.validate()?;
        Self::new(config, RetryExecutor::new(policy,), Arc::new(InMemoryTokenCache::new(),),)
    }

    pub fn config(&self,) -> &SmsConfig {
        &self.config
    }

    pub fn executor(&self,) -> &RetryExecutor {
        &self.executor
    }

    /// Returns the cached bearer token or fetches a new one. Failures propagate.
    pub async fn authenticate(&self,) -> Result<String,> {
        if let Some(token,) = self.tokens.get() {
            debug!("Using cached SMS token");
            return Ok(token,);
        }

        info!("Requesting new SMS authentication token from {}", self.config.base_url);
        let url = self.config.endpoint(AUTH_PATH,)?;
        let credentials = AuthRequest {
            username: &self.config.username,
            password: &self.config.password,
        };
        let timeout = self.config.request_timeout();

        let outcome = self
            .executor
            .execute(AUTH_LABEL, || {
                self.dispatch(
                    self.http
                        .post(url.clone(),)
                        .timeout(timeout,)
                        .header(ACCEPT, "application/json",)
                        .json(&credentials,),
                )
            },)
            .await;

        let response = match outcome.into_value(AUTH_LABEL,) {
            Ok(response,) => response,
            Err(err,) => {
                self.log_call_failure(&err,);
                return Err(err.into(),);
            },
        };

        let token = extract_token(&response.body,)?;
        self.tokens.set(token.clone(), Instant::now() + self.config.token_ttl(),);
        info!("SMS authentication token obtained ({})", mask_token(&token));
        Ok(token,)
    }

    /// Sends an attendance notification. Never fails: an invalid recipient,
    /// an authentication failure or a send failure all become
    /// [`SmsReport::Failed`] so the caller's own workflow can continue.
    pub async fn send_attendance_sms(
        &self,
        student: &StudentContact,
        attendance: &AttendanceEvent,
        campaign: Campaign,
    ) -> SmsReport {
        if msisdn::normalize(&student.phone,).is_none() {
            warn!(
                student = %student.name,
                phone = %student.phone,
                "Invalid or missing recipient phone number for SMS, skipping send"
            );
            return SmsReport::Failed(FailureReport::new(INVALID_RECIPIENT_MESSAGE, None, false,),);
        }

        let token = match self.authenticate().await {
            Ok(token,) => token,
            Err(err,) => {
                error!("Failed to send SMS: {}", err);
                return SmsReport::Failed(self.failure_report(&err,),);
            },
        };

        let campaign_id = self.config.campaign_id(campaign,).to_string();
        let request = payload::attendance_request(
            request_id(),
            &campaign_id,
            student,
            attendance,
            Local::now().naive_local(),
        );
        let message_type = request.bulk_data[0].vars[6].clone();
        let body = vec![request];

        let url = match self.config.endpoint(&format!("campaignApi/InsertBulkSms/{}", self.config.api_key),) {
            Ok(url,) => url,
            Err(err,) => {
                error!("Failed to send SMS: {}", err);
                return SmsReport::Failed(self.failure_report(&err,),);
            },
        };

        info!(
            student = %student.name,
            message_type = %message_type,
            campaign = %campaign_id,
            "Sending SMS notification"
        );

        let timeout = self.config.request_timeout();
        let outcome = self
            .executor
            .execute(SEND_LABEL, || {
                self.dispatch(
                    self.http
                        .post(url.clone(),)
                        .timeout(timeout,)
                        .bearer_auth(&token,)
                        .json(&body,),
                )
            },)
            .await;

        match outcome.into_report() {
            CallReport::Success(response,) => {
                let warning = match response.status {
                    200 | 201 => {
                        info!("SMS sent successfully to {}", student.name);
                        None
                    },
                    other => {
                        warn!("SMS sent but with unexpected status: {}", other);
                        Some(format!("Unexpected status: {}", other),)
                    },
                };
                SmsReport::Sent(SmsReceipt {
                    success: true,
                    data: response.json(),
                    campaign_id,
                    warning,
                },)
            },
            CallReport::Failure(report,) => {
                error!(code = ?report.code, "Failed to send SMS: {}", report.error);
                if report.is_dns_class {
                    error!(
                        "DNS resolution error: SMS could not be sent; the attendance record itself is unaffected"
                    );
                }
                SmsReport::Failed(report,)
            },
        }
    }

    /// Looks up delivery status for a request id. Any failure yields `None`.
    pub async fn check_sms_status(&self, request_id: &str,) -> Option<Value,> {
        let token = match self.authenticate().await {
            Ok(token,) => token,
            Err(err,) => {
                error!("Failed to check SMS status: {}", err);
                return None;
            },
        };

        let url = match self.config.endpoint(&format!("campaignApi/GetSMSStatus/{}", request_id),) {
            Ok(url,) => url,
            Err(err,) => {
                error!("Failed to check SMS status: {}", err);
                return None;
            },
        };

        let timeout = self.config.status_timeout();
        let outcome = self
            .executor
            .execute(STATUS_LABEL, || {
                self.dispatch(
                    self.http
                        .get(url.clone(),)
                        .timeout(timeout,)
                        .bearer_auth(&token,)
                        .header(ACCEPT, "application/json",),
                )
            },)
            .await;

        match outcome.into_value(STATUS_LABEL,) {
            Ok(response,) => {
                debug!("SMS status check response: {}", response.body);
                Some(response.json(),)
            },
            Err(err,) => {
                error!("Failed to check SMS status: {}", err);
                None
            },
        }
    }

    async fn dispatch(&self, request: RequestBuilder,) -> std::result::Result<GatewayResponse, RemoteError,> {
        let response = request.send().await?.error_for_status()?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(GatewayResponse { status, body, },)
    }

    fn failure_report(&self, err: &RelayError,) -> FailureReport {
        match err {
            RelayError::Call(call,) => {
                let mut report = match call.last_error() {
                    Some(last,) => FailureReport::new(
                        last.message(),
                        last.code().map(str::to_string,),
                        self.executor.policy().classify(last,).is_dns(),
                    ),
                    None => FailureReport::new(call.to_string(), None, false,),
                };
                report.attempts_made = call.attempts();
                report
            },
            other => FailureReport::new(other.to_string(), None, false,),
        }
    }

    fn log_call_failure(&self, err: &CallError<RemoteError,>,) {
        error!("{}", err);
        let dns = err
            .last_error()
            .is_some_and(|e| self.executor.policy().classify(e,).is_dns(),);
        if dns {
            error!(
                "DNS resolution error: the resolver may be down, the network unreachable, \
                 DNS blocked by a firewall, or the gateway domain unreachable"
            );
        }
    }
}

/// Pulls the bearer token out of an authentication response body: a bare
/// JWT, a JSON string holding one, or a `token`, `access_token` or `jwt` field.
pub fn extract_token(body: &str,) -> Result<String,> {
    let trimmed = body.trim();
    if trimmed.starts_with("eyJ",) {
        return Ok(trimmed.to_string(),);
    }

    let value: Value = serde_json::from_str(trimmed,).map_err(|_| {
        RelayError::InvalidResponse(format!("Authentication response is not JSON: {}", trimmed),)
    },)?;

    match &value {
        Value::String(s,) if s.starts_with("eyJ",) => return Ok(s.clone(),),
        Value::Object(map,) => {
            for key in ["token", "access_token", "jwt"] {
                if let Some(Value::String(token,),) = map.get(key,) {
                    if !token.is_empty() {
                        return Ok(token.clone(),);
                    }
                }
            }
        },
        _ => {},
    }

    Err(RelayError::InvalidResponse(format!(
        "Expected JWT string or 'token', 'access_token', or 'jwt' field. Got: {}",
        value
    ),),)
}

fn mask_token(token: &str,) -> String {
    let prefix: String = token.chars().take(8,).collect();
    format!("{}...", prefix)
}

/// Millisecond timestamp, as the gateway expects.
fn request_id() -> String {
    Utc::now().timestamp_millis().to_string()
}
