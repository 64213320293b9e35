// sms_relay/src/cli.rs
// Command Line Interface (CLI) specific logic for sms_relay.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;

use crate::config::{Campaign, DEFAULT_BASE_URL};
use crate::sms::{AttendanceEvent, StudentContact};

/// Command Line Interface for the SMS relay.
#[derive(Parser, Debug,)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// JSON file with the retry policy. Defaults apply when omitted.
    #[clap(long, env = "SMS_RETRY_POLICY")]
    pub policy: Option<PathBuf,>,

    #[clap(flatten)]
    pub gateway: GatewayArgs,
}

#[derive(Parser, Debug,)]
pub struct GatewayArgs {
    /// Base URL of the SMS gateway
    #[clap(long, env = "SMS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Gateway account user name
    #[clap(long, env = "SMS_USERNAME", default_value = "")]
    pub username: String,

    /// Gateway account password
    #[clap(long, env = "SMS_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// API key embedded in the bulk SMS endpoint path
    #[clap(long, env = "SMS_API_KEY", default_value = "")]
    pub api_key: String,
}

#[derive(Parser, Debug,)]
pub enum Commands {
    /// Acquire a gateway token
    Auth,
    /// Send an attendance notification
    Send(SendArgs,),
    /// Check the delivery status of a request
    Status {
        /// Request id returned when the message was queued
        request_id: String,
    },
    /// Print the effective retry policy
    Policy,
}

#[derive(Parser, Debug,)]
pub struct SendArgs {
    /// Student name shown in the message
    #[clap(long)]
    pub name: String,

    /// Recipient phone number
    #[clap(long)]
    pub phone: String,

    /// Arrival time (e.g. 2026-10-16T07:45:00)
    #[clap(long)]
    pub in_time: Option<NaiveDateTime,>,

    /// Departure time (e.g. 2026-10-16T14:05:00)
    #[clap(long)]
    pub out_time: Option<NaiveDateTime,>,

    /// Attendance date (YYYY-MM-DD)
    #[clap(long)]
    pub date: Option<NaiveDate,>,

    #[clap(long)]
    pub class_name: Option<String,>,

    /// Attendance status, PRESENT when omitted
    #[clap(long)]
    pub status: Option<String,>,

    #[clap(long, value_enum, default_value_t = Campaign::InTime)]
    pub campaign: Campaign,
}

impl SendArgs {
    pub fn student(&self,) -> StudentContact {
        StudentContact {
            name:  self.name.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn attendance(&self,) -> AttendanceEvent {
        AttendanceEvent {
            in_time:    self.in_time,
            out_time:   self.out_time,
            date:       self.date,
            class_name: self.class_name.clone(),
            status:     self.status.clone(),
        }
    }
}
