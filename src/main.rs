// sms_relay/src/main.rs
// Entry point for the sms-relay CLI application.

use clap::Parser;
use sms_relay::cli::{Cli, Commands, GatewayArgs};
use sms_relay::config::{SmsConfig, resolve_policy};
use sms_relay::error::{RelayError, Result};
use sms_relay::policy::RetryPolicy;
use sms_relay::sms::SmsClient;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(),> {
    // Initialize tracing
    let file_appender = tracing_appender::rolling::never(".", "sms-relay.log",);
    let (non_blocking, _guard,) = tracing_appender::non_blocking(file_appender,);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),),)
        .with(fmt::layer().with_writer(std::io::stderr,),)
        .with(fmt::layer().with_writer(non_blocking,).with_ansi(false,),)
        .init();

    let cli = Cli::parse();
    let policy = resolve_policy(cli.policy.as_deref(),)?;

    match &cli.command {
        Commands::Policy => {
            println!("{}", serde_json::to_string_pretty(&policy,)?);
        },
        Commands::Auth => {
            let client = build_client(&cli.gateway, policy,)?;
            let token = client.authenticate().await?;
            let shown: String = token.chars().take(12,).collect();
            println!("token acquired: {}...", shown);
        },
        Commands::Send(args,) => {
            let client = build_client(&cli.gateway, policy,)?;
            let report = client
                .send_attendance_sms(&args.student(), &args.attendance(), args.campaign,)
                .await;
            println!("{}", serde_json::to_string_pretty(&report,)?);
            if !report.is_success() {
                error!("SMS was not sent");
                return Err(RelayError::Other("SMS was not sent".to_string(),),);
            }
            info!("SMS relay finished");
        },
        Commands::Status { request_id, } => {
            let client = build_client(&cli.gateway, policy,)?;
            let status = client.check_sms_status(request_id,).await;
            println!("{}", serde_json::to_string_pretty(&status,)?);
        },
    }

    Ok((),)
}

fn build_client(args: &GatewayArgs, policy: RetryPolicy,) -> Result<SmsClient,> {
    if args.username.is_empty() || args.password.is_empty() {
        return Err(RelayError::Configuration(
            "gateway username and password are required (SMS_USERNAME / SMS_PASSWORD)".to_string(),
        ),);
    }
    let config = SmsConfig::new(&args.base_url, &args.username, &args.password, &args.api_key,)?;
    SmsClient::with_policy(config, policy,)
}
