// sms_relay/src/config.rs
// Gateway connection settings and retry policy loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelayError, Result};
use crate::policy::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://dservices.etisalat.af/smsbusinesssolution";
pub const DEFAULT_IN_TIME_CAMPAIGN: &str = "403";
pub const DEFAULT_OUT_TIME_CAMPAIGN: &str = "404";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Campaign template a message is sent under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,)]
#[serde(rename_all = "camelCase")]
pub enum Campaign {
    #[default]
    InTime,
    OutTime,
}

/// Configuration for the SMS gateway client.
#[derive(Debug, Clone, Serialize, Deserialize,)]
pub struct SmsConfig {
    pub base_url:             Url,
    pub username:             String,
    #[serde(skip_serializing)]
    pub password:             String,
    pub api_key:              String,
    pub in_time_campaign:     String,
    pub out_time_campaign:    String,
    pub request_timeout_secs: u64,
    pub status_timeout_secs:  u64,
    pub token_ttl_secs:       u64,
}

impl SmsConfig {
    pub fn new(base_url: &str, username: &str, password: &str, api_key: &str,) -> Result<Self,> {
        if api_key.trim().is_empty() {
            return Err(RelayError::Configuration("SMS API key must not be empty".to_string(),),);
        }
        Ok(Self {
            base_url:             Url::parse(base_url,)?,
            username:             username.to_string(),
            password:             password.to_string(),
            api_key:              api_key.to_string(),
            in_time_campaign:     DEFAULT_IN_TIME_CAMPAIGN.to_string(),
            out_time_campaign:    DEFAULT_OUT_TIME_CAMPAIGN.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            status_timeout_secs:  DEFAULT_STATUS_TIMEOUT_SECS,
            token_ttl_secs:       DEFAULT_TOKEN_TTL_SECS,
        },)
    }

    pub fn request_timeout(&self,) -> Duration {
        Duration::from_secs(self.request_timeout_secs,)
    }

    pub fn status_timeout(&self,) -> Duration {
        Duration::from_secs(self.status_timeout_secs,)
    }

    pub fn token_ttl(&self,) -> Duration {
        Duration::from_secs(self.token_ttl_secs,)
    }

    pub fn campaign_id(&self, campaign: Campaign,) -> &str {
        match campaign {
            Campaign::InTime => &self.in_time_campaign,
            Campaign::OutTime => &self.out_time_campaign,
        }
    }

    /// Resolves `path` below the base URL, keeping any path prefix the base
    /// URL already has.
    pub fn endpoint(&self, path: &str,) -> Result<Url,> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/',) {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash,);
        }
        Ok(base.join(path.trim_start_matches('/',),)?,)
    }
}

/// Reads and validates a JSON retry policy. Missing fields take their defaults.
pub fn load_policy(path: &Path,) -> Result<RetryPolicy,> {
    let raw = std::fs::read_to_string(path,)?;
    let policy: RetryPolicy = serde_json::from_str(&raw,)?;
    policy.validate()?;
    Ok(policy,)
}

/// The policy at `path` if given, otherwise the validated default.
pub fn resolve_policy(path: Option<&Path,>,) -> Result<RetryPolicy,> {
    match path {
        Some(path,) => load_policy(path,),
        None => {
            let policy = RetryPolicy::default();
            policy.validate()?;
            Ok(policy,)
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn endpoint_keeps_the_base_path() {
        let config = SmsConfig::new(DEFAULT_BASE_URL, "u", "p", "81945d",).unwrap();
        let url = config.endpoint("/api/AuthJwt/Authenticate",).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dservices.etisalat.af/smsbusinesssolution/api/AuthJwt/Authenticate"
        );
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            SmsConfig::new(DEFAULT_BASE_URL, "u", "p", " "),
            Err(RelayError::Configuration(_))
        ));
    }

    #[test]
    fn password_is_never_serialised() {
        let config = SmsConfig::new(DEFAULT_BASE_URL, "u", "secret", "k",).unwrap();
        let json = serde_json::to_string(&config,).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn policy_file_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_attempts": 2, "base_delay_ms": 1000, "dns_max_attempts": 4, "dns_base_delay_ms": 1500}}"#).unwrap();
        let policy = load_policy(file.path(),).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.dns_base_delay_ms, 1500);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"max_attempts": 0}}"#).unwrap();
        assert!(matches!(load_policy(bad.path()), Err(RelayError::Configuration(_))));
    }
}
