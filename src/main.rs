use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::time::Duration;

use whatsapp_client::config::{self, CliArgs, Command, Config};
use whatsapp_client::poller::PollerConfig;
use whatsapp_client::WhatsAppClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let mut args = CliArgs::parse();

    // Prompt for missing credentials when running interactively without a .env file
    if config::needs_interactive_setup(&args) {
        args = config::run_interactive_setup(args)?;
    }

    let config = Config::from_args(&args)?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for command output
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("Using API at {}", config.base_url);

    let client = WhatsAppClient::new(&config).context("Failed to create WhatsApp client")?;

    match args.command {
        Command::Token => {
            let info = client.token_info().await.context("Failed to get token")?;
            if info.is_new_token {
                tracing::info!(
                    "New token generated, expires in {} minutes",
                    info.expires_in_minutes
                );
            } else {
                tracing::info!(
                    "Existing token found, expires in {} minutes",
                    info.expires_in_minutes
                );
            }
            print_json(&info)?;
        }

        Command::Status => {
            let status = client
                .check_token_status()
                .await
                .context("Failed to check token status")?;
            print_json(&serde_json::json!({
                "has_token": status.has_token,
                "token": status.token,
                "expires_in_minutes": status.expires_in_minutes(),
                "expires_at": status.expires_at,
            }))?;
        }

        Command::Send { to, message } => {
            let response = client
                .send_message(&to, &message)
                .await
                .context("Failed to send message")?;
            print_json(&response)?;
        }

        Command::Receive { limit, mark_read } => {
            let response = client
                .receiver()
                .receive_messages(limit, mark_read)
                .await
                .context("Failed to receive messages")?;
            print_json(&response)?;
        }

        Command::Unread => {
            let count = client
                .receiver()
                .unread_count()
                .await
                .context("Failed to get unread count")?;
            print_json(&serde_json::json!({ "count": count }))?;
        }

        Command::MarkRead { ids } => {
            let response = client
                .receiver()
                .mark_messages_as_read(&ids)
                .await
                .context("Failed to mark messages as read")?;
            print_json(&response)?;
        }

        Command::Message { id } => {
            let message = client
                .receiver()
                .message_by_id(&id)
                .await
                .context("Failed to get message")?;
            print_json(&message)?;
        }

        Command::Poll { interval, limit } => {
            let mut poller = client.poller(PollerConfig {
                interval: Duration::from_secs(interval.max(1)),
                limit,
            });

            poller
                .start(|messages| {
                    for message in messages {
                        match serde_json::to_string(&message) {
                            Ok(line) => println!("{}", line),
                            Err(e) => tracing::error!("Failed to encode message: {}", e),
                        }
                    }
                })
                .await?;

            shutdown_signal().await;
            poller.stop().await?;
        }

        Command::Debug => {
            let info = client.receiver().debug_connection().await;
            print_json(&info)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", text);
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, stopping...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, stopping...");
        },
    }
}
