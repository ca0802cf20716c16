use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use std::io::{IsTerminal, Write};

use crate::auth::AuthScheme;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://whatsapp.tradeunifox.com/api";

/// WhatsApp Client - command line access to the Trade Unifox WhatsApp API
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Account username
    #[arg(short, long, env = "WHATSAPP_USERNAME")]
    pub username: Option<String>,

    /// Account password
    #[arg(short, long, env = "WHATSAPP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// API key
    #[arg(short = 'k', long, env = "WHATSAPP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long, env = "WHATSAPP_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// How the token is sent (basic, bearer)
    #[arg(long, env = "AUTH_SCHEME", default_value = "basic")]
    pub auth_scheme: String,

    /// Re-authenticate and retry once when a request gets 401
    #[arg(long, env = "AUTO_REFRESH", default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_refresh: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the current token, generating one if the server has none
    Token,

    /// Check the token status on the server
    Status,

    /// Send a text message
    Send {
        /// Recipient phone number
        to: String,
        /// Message text
        message: String,
    },

    /// Fetch incoming messages
    Receive {
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Mark fetched messages as read
        #[arg(long)]
        mark_read: bool,
    },

    /// Show the unread message count
    Unread,

    /// Mark messages as read (all unread when no ids are given)
    MarkRead { ids: Vec<String> },

    /// Fetch a single message by id
    Message { id: String },

    /// Poll for new messages until interrupted
    Poll {
        /// Seconds between polls
        #[arg(short, long, env = "POLL_INTERVAL", default_value = "5")]
        interval: u64,
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Test connectivity and print what the client is configured with
    Debug,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub username: String,
    pub password: String,
    pub api_key: String,

    // API
    pub base_url: String,
    pub auth_scheme: AuthScheme,
    pub auto_refresh: bool,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Config with defaults for everything but the credentials
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_scheme: AuthScheme::Basic,
            auto_refresh: true,
            http_connect_timeout: 10,
            http_request_timeout: 30,
            log_level: "info".to_string(),
        }
    }

    /// Build configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = Config::new(
            args.username
                .clone()
                .context("WHATSAPP_USERNAME is required (use -u or set WHATSAPP_USERNAME env var)")?,
            args.password
                .clone()
                .context("WHATSAPP_PASSWORD is required (use -p or set WHATSAPP_PASSWORD env var)")?,
            args.api_key
                .clone()
                .context("WHATSAPP_API_KEY is required (use -k or set WHATSAPP_API_KEY env var)")?,
        );

        config.base_url = args.base_url.trim_end_matches('/').to_string();
        config.auth_scheme = parse_auth_scheme(&args.auth_scheme);
        config.auto_refresh = args.auto_refresh;
        config.http_request_timeout = args.http_timeout;
        config.http_connect_timeout = std::env::var("HTTP_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        config.log_level = args.log_level.clone();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty()
            || self.password.trim().is_empty()
            || self.api_key.trim().is_empty()
        {
            anyhow::bail!("Username, password and API key must not be empty");
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!("WHATSAPP_BASE_URL must be an http(s) URL: {}", self.base_url);
        }

        if self.http_request_timeout == 0 || self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        Ok(())
    }
}

/// Parse auth scheme from string
fn parse_auth_scheme(s: &str) -> AuthScheme {
    match s.to_lowercase().as_str() {
        "bearer" => AuthScheme::Bearer,
        _ => AuthScheme::Basic, // default
    }
}


// === Interactive Setup ===

/// Interactive setup is needed when a credential is missing, there is no .env file
/// and we are attached to a terminal
pub fn needs_interactive_setup(args: &CliArgs) -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();
    let missing = args.username.is_none() || args.password.is_none() || args.api_key.is_none();

    missing && !env_file_exists && std::io::stdin().is_terminal()
}

/// Prompt for missing credentials, optionally saving them to .env
pub fn run_interactive_setup(mut args: CliArgs) -> Result<CliArgs> {
    println!();
    println!("No configuration found. Let's set up your WhatsApp client.");
    println!();

    if args.username.is_none() {
        let username: String = Input::new()
            .with_prompt("Username (WHATSAPP_USERNAME)")
            .interact_text()
            .context("Failed to read WHATSAPP_USERNAME")?;
        args.username = Some(username);
    }

    if args.password.is_none() {
        let password: String = Password::new()
            .with_prompt("Password (WHATSAPP_PASSWORD)")
            .interact()
            .context("Failed to read WHATSAPP_PASSWORD")?;
        args.password = Some(password);
    }

    if args.api_key.is_none() {
        let api_key: String = Password::new()
            .with_prompt("API key (WHATSAPP_API_KEY)")
            .interact()
            .context("Failed to read WHATSAPP_API_KEY")?;
        args.api_key = Some(api_key);
    }

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&args)?;
        println!("✅ Configuration saved to .env file");
    }
    println!();

    Ok(args)
}

/// Save credentials to .env file
fn save_env_file(args: &CliArgs) -> Result<()> {
    let env_content = format!(
        r#"# WhatsApp Client Configuration
# Generated by interactive setup

WHATSAPP_USERNAME={}
WHATSAPP_PASSWORD={}
WHATSAPP_API_KEY={}
WHATSAPP_BASE_URL={}

# Token transport (basic, bearer)
AUTH_SCHEME={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL={}
"#,
        args.username.as_deref().unwrap_or_default(),
        args.password.as_deref().unwrap_or_default(),
        args.api_key.as_deref().unwrap_or_default(),
        args.base_url,
        args.auth_scheme,
        args.log_level,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
