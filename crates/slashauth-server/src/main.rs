// ============================================
// File: crates/slashauth-server/src/main.rs
// ============================================
//! # SlashAuth Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the SlashAuth server binary.
//! Handles CLI parsing, logging setup, and server initialization.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration and key file handling
//! - Server execution with demonstration handlers
//!
//! ## Usage
//! ```bash
//! # Step 1: Generate the server key
//! slashauth-server keygen --config /etc/slashauth/server.toml
//!
//! # Step 2: Start server
//! slashauth-server start
//!
//! # Other commands
//! slashauth-server init              # Print a default config file
//! slashauth-server validate          # Validate config file
//! slashauth-server pubkey            # Show the key clients must pin
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The bundled handlers grant every `authz` and mint a placeholder magic
//!   link; real deployments embed `AuthServer` with their own handlers
//! - Key file permissions are 0600; keep it that way
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation
//! v0.1.1 - Logging level read from config before the subscriber is installed

use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slashauth_common::time::Timestamp;
use slashauth_core::crypto::IdentityKeyPair;
use slashauth_core::protocol::{AuthzGrant, MagicLink};
use slashauth_server::key_file::{load_key, save_key};
use slashauth_server::{AuthHandlers, AuthServer, ServerConfig};

/// Lifetime of links minted by the demonstration handlers.
const DEMO_LINK_TTL_SECS: u64 = 600;

// ============================================
// CLI Definition
// ============================================

/// SlashAuth challenge/response authentication server
///
/// Quick Start:
///   1. Run: slashauth-server keygen
///   2. Run: slashauth-server start
#[derive(Parser, Debug)]
#[command(name = "slashauth-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/slashauth/server.toml")]
        config: PathBuf,
    },

    /// Generate the server key pair
    Keygen {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/slashauth/server.toml")]
        config: PathBuf,

        /// Write the key here instead of `server_key.key_file`
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print a default configuration file
    Init,

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/slashauth/server.toml")]
        config: PathBuf,
    },

    /// Show the server public key
    Pubkey {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/slashauth/server.toml")]
        config: PathBuf,

        /// Output format: hex (default), base64
        #[arg(long, default_value = "hex")]
        format: String,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging once, at the configured level
    init_logging(&startup_log_level(&cli.command));

    // Execute command
    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Keygen { config, out, force } => cmd_keygen(config, out, force).await,
        Commands::Init => {
            print!("{}", ServerConfig::default().to_toml());
            Ok(())
        }
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Pubkey { config, format } => cmd_pubkey(config, format).await,
    };

    // Handle errors
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the server.
async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    info!("Starting SlashAuth server...");

    // Load configuration
    let config = if config_path.exists() {
        ServerConfig::load(&config_path).await?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    let key_path = PathBuf::from(&config.server_key.key_file);
    if !key_path.exists() {
        println!();
        println!("❌ Server key not found: {}", key_path.display());
        println!();
        println!("Generate one first:");
        println!("  slashauth-server keygen --config {}", config_path.display());
        std::process::exit(1);
    }
    let identity = load_key(&key_path).await?;

    let handlers = DemoHandlers {
        link_base: config.network.public_url.clone(),
    };
    warn!("Using demonstration handlers: every authz request is granted");

    let server = AuthServer::builder()
        .config(config)
        .key_pair(identity)
        .handlers(handlers)
        .build()?;

    info!("════════════════════════════════════════");
    info!("Mode:       {}", server.mode());
    info!("Public Key: {}", server.advertised_public_key());
    info!("════════════════════════════════════════");

    server.run().await?;
    Ok(())
}

/// Generates and stores the server key.
async fn cmd_keygen(config_path: PathBuf, out: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let key_path = match out {
        Some(path) => path,
        None => {
            let config = load_or_default_config(&config_path).await;
            PathBuf::from(&config.server_key.key_file)
        }
    };

    if key_path.exists() && !force {
        println!("⚠️  Key file already exists: {}", key_path.display());
        println!("   Use --force to replace it.");
        return Ok(());
    }

    let identity = IdentityKeyPair::generate();
    save_key(&identity, &key_path).await?;

    println!("✅ Server key written to {}", key_path.display());
    println!("   Public Key: {}", identity.public_key_hex());
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Server will use default values.");
        return Ok(());
    }

    let config = ServerConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:     {}", config.network.listen_addr);
    println!("   Transport:  {}", config.network.transport);
    println!("   Public URL: {}", config.network.public_url);
    println!("   Relay:      {}", config.advertised_relay());
    println!();
    println!("Channel:");
    println!("   Mode:       {}", config.channel.mode);
    println!("   Rotation:   {}", config.channel.rotate_responder_key);
    println!("   Max Skew:   {}s", config.channel.max_timestamp_skew_secs);
    println!();
    println!("Limits:");
    println!("   Max Connections:  {}", config.limits.max_connections);
    println!("   Idle Timeout:     {}s", config.limits.idle_timeout_secs);
    println!();

    Ok(())
}

/// Shows the server public key.
async fn cmd_pubkey(config_path: PathBuf, format: String) -> anyhow::Result<()> {
    use base64::Engine;

    let config = load_or_default_config(&config_path).await;
    let key_path = PathBuf::from(&config.server_key.key_file);

    if !key_path.exists() {
        println!("❌ Server key not found. Generate one first:");
        println!("   slashauth-server keygen");
        std::process::exit(1);
    }

    let identity = load_key(&key_path).await?;

    match format.as_str() {
        "base64" => println!(
            "{}",
            base64::engine::general_purpose::STANDARD.encode(identity.public_key_bytes())
        ),
        _ => println!("{}", identity.public_key_hex()),
    }

    Ok(())
}

// ============================================
// Demonstration Handlers
// ============================================

/// Grants every request; stands in for application logic.
struct DemoHandlers {
    link_base: String,
}

#[async_trait]
impl AuthHandlers for DemoHandlers {
    async fn authz(&self, public_key: &str, _token: &str) -> anyhow::Result<Value> {
        info!(client = %slashauth_common::abbreviate(public_key), "Granting authz");
        Ok(AuthzGrant::ok(["default"]).to_value())
    }

    async fn magiclink(&self, public_key: &str) -> anyhow::Result<Value> {
        let now = u64::try_from(Timestamp::now().as_secs()).unwrap_or_default();
        let link = MagicLink {
            url: format!("{}/magic/{}", self.link_base.trim_end_matches('/'), public_key),
            valid_until: now + DEMO_LINK_TTL_SECS,
        };
        Ok(link.to_value())
    }
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Level for this invocation: `logging.level` from the command's config
/// file when it parses, `info` otherwise.
fn startup_log_level(command: &Commands) -> String {
    let path = match command {
        Commands::Start { config }
        | Commands::Keygen { config, .. }
        | Commands::Validate { config }
        | Commands::Pubkey { config, .. } => config,
        Commands::Init => return "info".to_string(),
    };

    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str::<ServerConfig>(&content).ok())
        .map_or_else(|| "info".to_string(), |config| config.logging.level)
}

/// Loads config or returns default.
async fn load_or_default_config(path: &PathBuf) -> ServerConfig {
    if path.exists() {
        ServerConfig::load(path).await.unwrap_or_default()
    } else {
        ServerConfig::default()
    }
}

// ============================================
// Tests
// ============================================
