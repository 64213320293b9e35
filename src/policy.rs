// sms_relay/src/policy.rs
// Retry policy shared by every call the executor makes.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_DNS_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_DNS_BASE_DELAY_MS: u64 = 3_000;

const DEFAULT_RETRYABLE_CODES: &[&str] = &[
    "ECONNRESET",
    "ETIMEDOUT",
    "ECONNREFUSED",
    "ENETUNREACH",
    "ERR_NETWORK",
    "ECONNABORTED",
];
const DEFAULT_DNS_CODES: &[&str] = &["EAI_AGAIN", "ENOTFOUND"];
const DEFAULT_DNS_MESSAGE_PATTERNS: &[&str] =
    &["getaddrinfo", "dns error", "failed to lookup address"];

/// When the extended DNS budget is adopted within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,)]
#[serde(rename_all = "snake_case")]
pub enum DnsUpgrade {
    /// The first DNS-class failure at any attempt upgrades the budget.
    #[default]
    FirstOccurrence,
    /// Only a DNS-class failure on the very first attempt upgrades the budget.
    FirstAttemptOnly,
}

/// Immutable retry configuration. Built once and shared across calls.
///
/// `max_attempts` and `dns_max_attempts` count retries after the first
/// attempt, so `max_attempts = 3` allows four attempts in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts:         u32,
    pub base_delay_ms:        u64,
    pub dns_max_attempts:     u32,
    pub dns_base_delay_ms:    u64,
    pub retryable_codes:      BTreeSet<String,>,
    pub dns_codes:            BTreeSet<String,>,
    pub dns_message_patterns: Vec<String,>,
    pub dns_upgrade:          DnsUpgrade,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:         DEFAULT_MAX_ATTEMPTS,
            base_delay_ms:        DEFAULT_BASE_DELAY_MS,
            dns_max_attempts:     DEFAULT_DNS_MAX_ATTEMPTS,
            dns_base_delay_ms:    DEFAULT_DNS_BASE_DELAY_MS,
            retryable_codes:      to_set(DEFAULT_RETRYABLE_CODES,),
            dns_codes:            to_set(DEFAULT_DNS_CODES,),
            dns_message_patterns: DEFAULT_DNS_MESSAGE_PATTERNS
                .iter()
                .map(|p| p.to_string(),)
                .collect(),
            dns_upgrade:          DnsUpgrade::default(),
        }
    }
}

fn to_set(codes: &[&str],) -> BTreeSet<String,> {
    codes.iter().map(|c| c.to_string(),).collect()
}

impl RetryPolicy {
    /// A policy with the given budgets and no known codes. Codes are added
    /// with [`RetryPolicy::retryable`] and [`RetryPolicy::dns`].
    pub fn new(
        max_attempts: u32,
        base_delay_ms: u64,
        dns_max_attempts: u32,
        dns_base_delay_ms: u64,
    ) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            dns_max_attempts,
            dns_base_delay_ms,
            retryable_codes: BTreeSet::new(),
            dns_codes: BTreeSet::new(),
            dns_message_patterns: vec!["getaddrinfo".to_string()],
            dns_upgrade: DnsUpgrade::default(),
        }
    }

    pub fn retryable<I, S,>(mut self, codes: I,) -> Self
    where
        I: IntoIterator<Item = S,>,
        S: Into<String,>,
    {
        self.retryable_codes.extend(codes.into_iter().map(Into::into,),);
        self
    }

    pub fn dns<I, S,>(mut self, codes: I,) -> Self
    where
        I: IntoIterator<Item = S,>,
        S: Into<String,>,
    {
        self.dns_codes.extend(codes.into_iter().map(Into::into,),);
        self
    }

    pub fn with_dns_upgrade(mut self, mode: DnsUpgrade,) -> Self {
        self.dns_upgrade = mode;
        self
    }

    pub fn base_delay(&self,) -> Duration {
        Duration::from_millis(self.base_delay_ms,)
    }

    pub fn dns_base_delay(&self,) -> Duration {
        Duration::from_millis(self.dns_base_delay_ms,)
    }

    pub fn validate(&self,) -> Result<(),> {
        if self.max_attempts < 1 {
            return Err(RelayError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ),);
        }
        if self.base_delay_ms == 0 {
            return Err(RelayError::Configuration(
                "base_delay_ms must be greater than 0".to_string(),
            ),);
        }
        if self.dns_max_attempts < self.max_attempts {
            return Err(RelayError::Configuration(format!(
                "dns_max_attempts ({}) must not be lower than max_attempts ({})",
                self.dns_max_attempts, self.max_attempts
            ),),);
        }
        if self.dns_base_delay_ms < self.base_delay_ms {
            return Err(RelayError::Configuration(format!(
                "dns_base_delay_ms ({}) must not be lower than base_delay_ms ({})",
                self.dns_base_delay_ms, self.base_delay_ms
            ),),);
        }
        Ok((),)
    }
}
