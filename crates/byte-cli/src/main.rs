//! byte: device tooling for the byte client chain
//!
//! Commands:
//!   debug generate token <rootKey> <clientID>     - mint a token, print it with the derived token key
//!   debug decrypt-token <rootKey> <clientID> <t>  - verify a token and print its claims
//!   device provision <serverSeed>                 - derive a new device secret, print provisioning JSON
//!   config check                                  - load, validate and self-test the device config
//!   config import <json>                          - store a provisioning payload in the OS keychain
//!   config clear                                  - remove the stored device session

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use tracing::{debug, info};

use byte_core::config::{decode_root_key, ProvisioningPayload};
use byte_core::{ByteResult, ClientConfig, ClientId};
use byte_crypto::{ClientChain, OsRandom, ServerChain};
use byte_secrets::{KeyringStore, SecretStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "byte",
    version,
    about = "byte client chain tooling",
    long_about = "byte: derive device keys, mint and inspect tokens, and manage the device session"
)]
struct Cli {
    /// Path to config.toml (default: ~/.byte/config.toml, then the OS keychain)
    #[arg(long, short = 'c', env = "BYTE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BYTE_LOG", default_value = "warn", global = true)]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "BYTE_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interop and debugging utilities
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },

    /// Server side device management
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },

    /// Client configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum DebugAction {
    /// Generate utilities
    Generate {
        #[command(subcommand)]
        what: GenerateAction,
    },

    /// Verify a token and print its claims
    #[command(name = "decrypt-token")]
    DecryptToken {
        /// Root key as base64
        root_key: String,
        /// Client ID (UUID v4)
        client_id: String,
        /// v4.local token
        token: String,
        /// Verify as of this RFC 3339 instant instead of now
        #[arg(long, value_parser = parse_rfc3339)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand, Debug)]
enum GenerateAction {
    /// Mint a token and print the derived token key
    ///
    /// With identical root key, client ID, --at and nonce every client
    /// implementation derives the same key; the token differs per nonce.
    Token {
        /// Root key as base64
        root_key: String,
        /// Client ID (UUID v4)
        client_id: String,
        /// Issue the token at this RFC 3339 instant instead of now
        #[arg(long, value_parser = parse_rfc3339)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceAction {
    /// Derive a device secret from the server seed and print the provisioning JSON
    Provision {
        /// Server seed (at least 32 bytes)
        #[arg(env = "BYTE_SERVER_SEED", hide_env_values = true)]
        server_seed: String,
        /// URL the device should talk to
        #[arg(long, default_value = "http://localhost:8080")]
        server_url: String,
        /// Re-provision an existing device instead of generating a new ID
        #[arg(long)]
        device_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Load and validate the configuration, then mint a test token
    Check,

    /// Store a provisioning payload in the OS keychain
    Import {
        /// Provisioning JSON: {"serverUrl": .., "deviceId": .., "secret": ..}
        payload: String,
    },

    /// Remove the device session from the OS keychain
    Clear,
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    debug!(version = env!("CARGO_PKG_VERSION"), "byte starting");

    match cli.command {
        Commands::Debug {
            action:
                DebugAction::Generate {
                    what: GenerateAction::Token { root_key, client_id, at },
                },
        } => cmd_generate_token(&root_key, &client_id, at),
        Commands::Debug {
            action: DebugAction::DecryptToken { root_key, client_id, token, at },
        } => cmd_decrypt_token(&root_key, &client_id, &token, at),
        Commands::Device {
            action: DeviceAction::Provision { server_seed, server_url, device_id },
        } => cmd_provision(&server_seed, &server_url, device_id.as_deref()),
        Commands::Config { action: ConfigAction::Check } => cmd_config_check(cli.config.as_deref()),
        Commands::Config { action: ConfigAction::Import { payload } } => cmd_config_import(&payload),
        Commands::Config { action: ConfigAction::Clear } => {
            byte_secrets::clear_config(&KeyringStore::default())?;
            println!("Device session removed from keychain");
            Ok(())
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── `byte debug` ──────────────────────────────────────────────────────────────

fn chain_from_args(root_key: &str, client_id: &str) -> Result<ClientChain> {
    let root = decode_root_key(root_key).context("invalid root key")?;
    ClientChain::new(root.as_slice(), client_id).context("failed to create client chain")
}

fn cmd_generate_token(root_key: &str, client_id: &str, at: Option<DateTime<Utc>>) -> Result<()> {
    let chain = chain_from_args(root_key, client_id)?;

    let token = chain
        .issue_token(at.unwrap_or_else(Utc::now), &OsRandom)
        .context("failed to generate token")?;
    let key = chain.token_key().context("failed to derive token key")?;

    println!("Generated PASETO token:");
    println!("{token}");
    println!();
    println!("Derived PASETO encryption key (base64):");
    println!("{}", STANDARD.encode(key.as_bytes()));
    Ok(())
}

fn cmd_decrypt_token(
    root_key: &str,
    client_id: &str,
    token: &str,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let chain = chain_from_args(root_key, client_id)?;
    let claims = chain
        .verify_token(token, at.unwrap_or_else(Utc::now))
        .context("token rejected")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&claims).context("serializing claims")?
    );
    Ok(())
}

// ── `byte device provision` ───────────────────────────────────────────────────

fn cmd_provision(server_seed: &str, server_url: &str, device_id: Option<&str>) -> Result<()> {
    let server = ServerChain::new(server_seed.as_bytes()).context("invalid server seed")?;

    let device_id = match device_id {
        Some(id) => ClientId::parse(id).context("invalid --device-id")?,
        None => ClientId::generate(),
    };
    let root = server
        .client_root(&device_id)
        .context("deriving device secret")?;

    let payload = ProvisioningPayload {
        server_url: server_url.to_owned(),
        device_id: device_id.to_string(),
        secret: STANDARD.encode(root.as_bytes()),
    };
    ClientConfig::new(
        payload.server_url.clone(),
        payload.device_id.clone(),
        SecretString::from(payload.secret.clone()),
    )
    .validate()
    .context("refusing to emit invalid provisioning payload")?;

    info!(device_id = %device_id, "provisioned device");
    println!(
        "{}",
        serde_json::to_string(&payload).context("serializing provisioning payload")?
    );
    Ok(())
}

// ── `byte config` ─────────────────────────────────────────────────────────────

/// Config source: explicit path > ~/.byte/config.toml > OS keychain.
fn load_client_config(path: Option<&Path>) -> ByteResult<(ClientConfig, String)> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Some(ClientConfig::default_path()).filter(|p| p.exists()),
    };

    if let Some(path) = path {
        let config = ClientConfig::load(&path)?;
        return Ok((config, path.display().to_string()));
    }

    let store = KeyringStore::default();
    let config = byte_secrets::load_config(&store)?.ok_or_else(|| {
        byte_core::ByteError::Secrets(format!(
            "no device session in keychain service '{}'",
            store.service()
        ))
    })?;
    Ok((config, format!("keychain ({})", store.service())))
}

fn cmd_config_check(path: Option<&Path>) -> Result<()> {
    let (config, source) = load_client_config(path)?;
    config.validate()?;

    let chain = ClientChain::new(config.root_key()?.as_slice(), &config.device_id)?;
    let token = chain.token().context("minting test token")?;
    let _channel = byte_client::connect_lazy(&config).context("building channel")?;

    println!("# Configuration from: {source}");
    println!("server_url   = {}", config.server_url);
    println!("device_id    = {}", config.device_id);
    println!("timeout_secs = {}", config.timeout_secs);
    println!("token        = ok ({} chars)", token.len());
    Ok(())
}

fn cmd_config_import(payload: &str) -> Result<()> {
    let config = ClientConfig::from_provisioning_json(payload)?;
    let store = KeyringStore::default();
    if !store.is_available() {
        anyhow::bail!("platform keychain is not available");
    }
    byte_secrets::save_config(&store, &config)?;

    // Read back so a silently failing keychain is caught here.
    store
        .load(byte_secrets::session::keys::DEVICE_ID)?
        .context("keychain did not persist the session")?;

    println!("Stored device {} in keychain '{}'", config.device_id, store.service());
    Ok(())
}
