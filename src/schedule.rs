// sms_relay/src/schedule.rs
// Per-call attempt bookkeeping and the doubling backoff schedule.

use std::time::Duration;

use backoff::backoff::Backoff;

use crate::classifier::ErrorClass;
use crate::policy::{DnsUpgrade, RetryPolicy};

/// Mutable state of one executor invocation.
///
/// `attempt_index` counts retries already scheduled and never exceeds
/// `effective_max_attempts`. The DNS upgrade is one-way.
#[derive(Debug, Clone,)]
pub struct AttemptState {
    attempt_index:          u32,
    effective_max_attempts: u32,
    effective_base_delay:   Duration,
    upgraded:               bool,
    initial_max_attempts:   u32,
    initial_base_delay:     Duration,
    dns_max_attempts:       u32,
    dns_base_delay:         Duration,
    upgrade_mode:           DnsUpgrade,
}

impl AttemptState {
    pub fn new(policy: &RetryPolicy,) -> Self {
        Self {
            attempt_index:          0,
            effective_max_attempts: policy.max_attempts,
            effective_base_delay:   policy.base_delay(),
            upgraded:               false,
            initial_max_attempts:   policy.max_attempts,
            initial_base_delay:     policy.base_delay(),
            dns_max_attempts:       policy.dns_max_attempts,
            dns_base_delay:         policy.dns_base_delay(),
            upgrade_mode:           policy.dns_upgrade,
        }
    }

    pub fn attempt_index(&self,) -> u32 {
        self.attempt_index
    }

    pub fn effective_max_attempts(&self,) -> u32 {
        self.effective_max_attempts
    }

    pub fn effective_base_delay(&self,) -> Duration {
        self.effective_base_delay
    }

    /// Total attempts allowed under the current budget.
    pub fn total_budget(&self,) -> u32 {
        self.effective_max_attempts.saturating_add(1,)
    }

    pub fn is_upgraded(&self,) -> bool {
        self.upgraded
    }

    pub fn is_exhausted(&self,) -> bool {
        self.attempt_index >= self.effective_max_attempts
    }

    /// Switches to the DNS budget. Returns `true` only on the call that
    /// performed the switch.
    pub fn upgrade_for_dns(&mut self,) -> bool {
        if self.upgraded {
            return false;
        }
        if self.upgrade_mode == DnsUpgrade::FirstAttemptOnly && self.attempt_index > 0 {
            return false;
        }
        self.upgraded = true;
        self.effective_max_attempts = self.effective_max_attempts.max(self.dns_max_attempts,);
        self.effective_base_delay = self.effective_base_delay.max(self.dns_base_delay,);
        true
    }

    /// Delay before retry number `attempt_index` (1-based):
    /// `effective_base_delay * 2^(attempt_index - 1)`.
    pub fn delay_for(&self, attempt_index: u32,) -> Duration {
        let exponent = attempt_index.saturating_sub(1,);
        let factor = 2u32.saturating_pow(exponent,);
        self.effective_base_delay.saturating_mul(factor,)
    }

    /// Records a failure of the given class and returns the delay before the
    /// next attempt, or `None` once the budget is spent. DNS failures upgrade
    /// the budget first so the returned delay already uses the DNS base.
    pub fn schedule(&mut self, class: ErrorClass,) -> Option<Duration,> {
        if class.is_dns() {
            self.upgrade_for_dns();
        }
        self.next_backoff()
    }
}

impl Backoff for AttemptState {
    fn next_backoff(&mut self,) -> Option<Duration,> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt_index += 1;
        Some(self.delay_for(self.attempt_index,),)
    }

    fn reset(&mut self,) {
        self.attempt_index = 0;
        self.upgraded = false;
        self.effective_max_attempts = self.initial_max_attempts;
        self.effective_base_delay = self.initial_base_delay;
    }
}
