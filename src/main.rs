//! apns-gateway CLI - send push notifications from the command line.
//!
//! This is the main binary entry point. See the `apns_gateway` library
//! for the core functionality.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use apns_gateway::settings::keys;
use apns_gateway::{EventKind, GatewayConfig, Provider, ProviderEvent};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::sync::mpsc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "apns-gateway")]
#[command(version)]
#[command(about = "Send notifications over a persistent push gateway connection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one notification and wait for the gateway.
    Send(SendArgs),
    /// Print the effective configuration (file + environment).
    Config {
        /// Write it back to the config file (passphrase excluded).
        #[arg(long)]
        save: bool,
    },
}

#[derive(clap::Args)]
struct SendArgs {
    /// Device token (hex).
    #[arg(long)]
    device: String,
    /// Alert text.
    #[arg(long)]
    alert: Option<String>,
    /// Badge number.
    #[arg(long)]
    badge: Option<u32>,
    /// Sound name.
    #[arg(long)]
    sound: Option<String>,
    /// Codec for this message ("simple", "enhanced").
    #[arg(long)]
    codec: Option<String>,
    /// Notification identifier (echoed in gateway errors).
    #[arg(long, default_value_t = 0)]
    identifier: u32,
    /// Use the sandbox gateway.
    #[arg(long)]
    sandbox: bool,
    /// PKCS#12 credential bundle.
    #[arg(long)]
    pfx_file: Option<PathBuf>,
    /// PEM private key.
    #[arg(long)]
    key_file: Option<PathBuf>,
    /// PEM certificate.
    #[arg(long)]
    cert_file: Option<PathBuf>,
    /// PEM trust anchors.
    #[arg(long)]
    ca_file: Option<PathBuf>,
    /// Passphrase for the key or bundle.
    #[arg(long, env = "APNS_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
    /// How long to listen for a gateway rejection after connecting.
    #[arg(long, default_value_t = 1000)]
    wait_ms: u64,
}

/// What the listeners report back to the CLI.
enum Outcome {
    Connected,
    Failed { transport: bool, reason: String },
}

impl Outcome {
    fn failed(error: &apns_gateway::Error) -> Self {
        Self::Failed {
            transport: error.is_transport(),
            reason: error.to_string(),
        }
    }
}

fn failure(transport: bool, reason: &str) -> anyhow::Error {
    if transport {
        anyhow::anyhow!("Gateway connection error: {reason}")
    } else {
        anyhow::anyhow!("Notification not sent: {reason}")
    }
}

fn apply_args(config: &mut GatewayConfig, args: &SendArgs) {
    if args.sandbox {
        config.sandbox = true;
    }
    if args.passphrase.is_some() {
        config.passphrase.clone_from(&args.passphrase);
    }
    let paths = [
        (&mut config.pfx_file, &args.pfx_file),
        (&mut config.key_file, &args.key_file),
        (&mut config.cert_file, &args.cert_file),
        (&mut config.ca_file, &args.ca_file),
    ];
    for (target, arg) in paths {
        if arg.is_some() {
            target.clone_from(arg);
        }
    }
}

async fn run_send(args: SendArgs) -> Result<()> {
    let mut config = GatewayConfig::load()?;
    apply_args(&mut config, &args);

    let provider = Provider::new();
    config.apply(&provider);

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let tx = outcome_tx.clone();
    provider.on(EventKind::Connect, move |_| {
        let _ = tx.send(Outcome::Connected);
    });
    let tx = outcome_tx.clone();
    provider.on(EventKind::Error, move |event| {
        if let ProviderEvent::Error(e) = event {
            let _ = tx.send(Outcome::failed(e));
        }
    });

    let mut message = provider
        .create(args.codec.as_deref())
        .device(&args.device)
        .context("Invalid device token")?
        .identifier(args.identifier);
    if let Some(alert) = args.alert {
        message = message.alert(alert);
    }
    if let Some(badge) = args.badge {
        message = message.badge(badge);
    }
    if let Some(sound) = args.sound {
        message = message.sound(sound);
    }

    // Queued until the handshake completes.
    provider.send(message)?;

    let host = if provider.enabled(keys::SANDBOX) { "sandbox" } else { "production" };
    println!("Connecting to {host} gateway...");
    provider.connect(move |result| {
        if let Err(e) = result {
            let _ = outcome_tx.send(Outcome::failed(&e));
        }
    });

    match outcome_rx.recv().await {
        Some(Outcome::Connected) => println!("Connected, notification written."),
        Some(Outcome::Failed { transport, reason }) => return Err(failure(transport, &reason)),
        None => anyhow::bail!("Connection ended without a result"),
    }

    // The gateway only answers on failure; give it a moment to reject.
    let grace = tokio::time::sleep(Duration::from_millis(args.wait_ms));
    tokio::select! {
        () = grace => {
            println!("No rejection received.");
            Ok(())
        }
        outcome = outcome_rx.recv() => match outcome {
            Some(Outcome::Failed { transport, reason }) => Err(failure(transport, &reason)),
            _ => Ok(()),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send(args) => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(run_send(args))
        }
        Commands::Config { save } => {
            let config = GatewayConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = config.save()?;
                println!("Saved to {}", path.display());
            }
            Ok(())
        }
    }
}
