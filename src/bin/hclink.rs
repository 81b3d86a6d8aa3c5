//! hclink CLI binary.
//!
//! Offline tooling around the appliance session layer.
//!
//! # Commands
//!
//! - `endpoint` - Show the websocket URL and transport for the configured appliance
//! - `seal` - Encrypt messages into chained frames (one per input line)
//! - `open` - Decrypt chained frames (one per input line)
//! - `decode` - Resolve `[{uid, value}]` entries through a feature catalog
//! - `check` - Validate a write payload against a feature catalog
//! - `feature` - Show one catalog entry

use std::io::{self, BufRead, Read};
use std::path::PathBuf;

use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use hclink::{
    catalog::parse_uid, crypto::decode_base64url, ChannelRole, Config, FeatureCatalog, VERSION,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hclink")]
#[command(version = VERSION)]
#[command(about = "Home Connect appliance session tooling", long_about = None)]
struct Cli {
    /// Config file (HCLINK_* environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the websocket URL and transport for the appliance
    Endpoint,

    /// Encrypt messages, one per line, into base64url frames
    Seal {
        /// Input file path (default: stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Side the frames are written by
        #[arg(short, long, value_enum, default_value = "application")]
        role: Role,
    },

    /// Decrypt base64url frames, one per line
    Open {
        /// Input file path (default: stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Side reading the frames
        #[arg(short, long, value_enum, default_value = "application")]
        role: Role,
    },

    /// Decode a value list through the feature catalog
    Decode {
        /// JSON array of {uid, value} entries (or - for stdin)
        input: Option<String>,

        /// Feature catalog (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as pretty-printed JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Check a {uid, value} write against the feature catalog
    Check {
        /// JSON write payload (or - for stdin)
        input: Option<String>,

        /// Feature catalog (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show one feature of the catalog
    Feature {
        /// Feature uid, decimal or 0x-prefixed hex
        uid: String,

        /// Feature catalog (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Application,
    Device,
}

impl From<Role> for ChannelRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Application => ChannelRole::Application,
            Role::Device => ChannelRole::Device,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Endpoint => cmd_endpoint(&config),
        Commands::Seal { file, role } => cmd_seal(&config, file, role),
        Commands::Open { file, role } => cmd_open(&config, file, role),
        Commands::Decode {
            input,
            catalog,
            pretty,
        } => cmd_decode(&config, input, catalog, pretty),
        Commands::Check { input, catalog } => cmd_check(&config, input, catalog),
        Commands::Feature { uid, catalog } => cmd_feature(&config, &uid, catalog),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env(),
        None => Config::from_env(),
    };
    Ok(config)
}

fn cmd_endpoint(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let device = &config.device;
    println!("{}", device.endpoint());
    println!("transport: {}", device.transport_kind());
    Ok(())
}

fn cmd_seal(config: &Config, file: Option<PathBuf>, role: Role) -> anyhow::Result<()> {
    let mut channel = self_encrypted_channel(config, role)?;
    for line in read_lines(file)? {
        let frame = channel.encrypt(&line);
        println!("{}", URL_SAFE_NO_PAD.encode(frame));
    }
    Ok(())
}

fn cmd_open(config: &Config, file: Option<PathBuf>, role: Role) -> anyhow::Result<()> {
    let mut channel = self_encrypted_channel(config, role)?;
    for (index, line) in read_lines(file)?.into_iter().enumerate() {
        let frame = decode_base64url(line.trim())
            .with_context(|| format!("frame {index} is not base64url"))?;
        let plaintext = channel
            .decrypt(&frame)
            .with_context(|| format!("frame {index} rejected"))?;
        println!("{}", String::from_utf8_lossy(&plaintext));
    }
    Ok(())
}

fn cmd_decode(
    config: &Config,
    input: Option<String>,
    catalog: Option<PathBuf>,
    pretty: bool,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config, catalog)?;
    let entries: Vec<Value> =
        serde_json::from_str(&read_input(input)?).context("expected a JSON array")?;

    let report = catalog.decode_values(&entries);
    let output = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}

fn cmd_check(
    config: &Config,
    input: Option<String>,
    catalog: Option<PathBuf>,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config, catalog)?;
    let payload: Value = serde_json::from_str(&read_input(input)?).context("invalid JSON")?;

    match catalog.validate_write(&payload) {
        Ok(feature) => {
            println!("OK: {} (uid {})", feature.name, feature.uid);
            Ok(())
        },
        Err(e) => {
            eprintln!("REJECTED: {e}");
            std::process::exit(1);
        },
    }
}

fn cmd_feature(config: &Config, uid: &str, catalog: Option<PathBuf>) -> anyhow::Result<()> {
    let catalog = load_catalog(config, catalog)?;
    let uid = parse_uid(uid).with_context(|| format!("invalid uid {uid:?}"))?;
    let feature = catalog
        .lookup(uid)
        .with_context(|| format!("uid {uid} not in catalog"))?;

    println!("uid:    {uid} (0x{uid:04x})");
    println!("{}", serde_json::to_string_pretty(feature)?);
    Ok(())
}

fn self_encrypted_channel(config: &Config, role: Role) -> anyhow::Result<hclink::SecureChannel> {
    let channel = config.device.open_channel(role.into())?;
    if !channel.is_self_encrypted() {
        anyhow::bail!("device.iv is not set; TLS appliances have no frame encryption");
    }
    Ok(channel)
}

fn load_catalog(config: &Config, path: Option<PathBuf>) -> anyhow::Result<FeatureCatalog> {
    let path = path
        .or_else(|| config.catalog.clone())
        .context("no catalog given (use --catalog or set HCLINK_CATALOG)")?;
    Ok(FeatureCatalog::from_file(path)?)
}

fn read_input(input: Option<String>) -> anyhow::Result<String> {
    match input {
        Some(s) if s != "-" => Ok(s),
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        },
    }
}

fn read_lines(file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    let lines = match file {
        Some(path) => std::fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect(),
        None => io::stdin().lock().lines().collect::<io::Result<Vec<_>>>()?,
    };
    Ok(lines.into_iter().filter(|l| !l.trim().is_empty()).collect())
}
