//! ltokey: LTO tape encryption key manager CLI
//!
//! Offline commands:
//!   mnemonic new [--words N]   - generate a fresh recovery phrase
//!   mnemonic check             - validate an operator-entered phrase
//!   fingerprint                - derive and fingerprint the key hierarchy
//!   kad                        - render the KAD string for one cartridge
//!
//! The recovery phrase and passphrase are always prompted, never taken
//! from arguments, so they stay out of shell history and process lists.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

use ltk_core::config::LtokeyConfig;
use ltk_core::types::{Barcode, RolloverCounters};
use ltk_derive::hierarchy;
use ltk_derive::kad::{AccountHash, KeyAssociatedData};
use ltk_derive::material::Secret64;
use ltk_derive::mnemonic;
use ltk_derive::validation::{spawn_fingerprint, FingerprintParams};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ltokey",
    version,
    about = "LTO tape encryption key manager",
    long_about = "ltokey: derive, validate, and label AES-256 tape encryption keys \
                  from a recovery phrase"
)]
struct Cli {
    /// Path to ltokey.toml configuration file
    #[arg(long, short = 'c', env = "LTOKEY_CONFIG", default_value = "/etc/ltokey/config.toml")]
    config: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recovery phrase management
    Mnemonic {
        #[command(subcommand)]
        action: MnemonicAction,
    },

    /// Derive the hierarchy and print fingerprints for operator comparison
    Fingerprint {
        /// Account identifier
        #[arg(long, short = 'a')]
        account: String,
        /// Cartridge barcode; adds the tape-level fingerprint when given
        #[arg(long, short = 'b')]
        barcode: Option<String>,
        #[arg(long, default_value_t = 0)]
        global_rollover: u64,
        #[arg(long, default_value_t = 0)]
        account_rollover: u64,
        #[arg(long, default_value_t = 0)]
        tape_rollover: u64,
    },

    /// Render the KAD string that will be written alongside a tape key
    Kad {
        /// Cartridge barcode
        #[arg(long, short = 'b')]
        barcode: String,
        /// Account identifier
        #[arg(long, short = 'a')]
        account: String,
        /// Explicit MCF-style account hash (default: Z85 of CRC32)
        #[arg(long)]
        account_hash: Option<String>,
        #[arg(long, default_value_t = 0)]
        global_rollover: u64,
        #[arg(long, default_value_t = 0)]
        account_rollover: u64,
        #[arg(long, default_value_t = 0)]
        tape_rollover: u64,
    },
}

#[derive(Subcommand, Debug)]
enum MnemonicAction {
    /// Generate a fresh recovery phrase from OS randomness
    New {
        /// 12, 15, 18, 21 or 24 words
        #[arg(long, short = 'w', default_value_t = 24)]
        words: usize,
    },
    /// Prompt for a phrase and verify its checksum
    Check,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Mnemonic { action: MnemonicAction::New { words } } => cmd_mnemonic_new(words),
        Commands::Mnemonic { action: MnemonicAction::Check } => cmd_mnemonic_check(),
        Commands::Fingerprint {
            account,
            barcode,
            global_rollover,
            account_rollover,
            tape_rollover,
        } => {
            let rollovers = RolloverCounters {
                global: global_rollover,
                account: account_rollover,
                tape: tape_rollover,
            };
            cmd_fingerprint(&config, &account, barcode.as_deref(), rollovers).await
        }
        Commands::Kad {
            barcode,
            account,
            account_hash,
            global_rollover,
            account_rollover,
            tape_rollover,
        } => {
            let rollovers = RolloverCounters {
                global: global_rollover,
                account: account_rollover,
                tape: tape_rollover,
            };
            cmd_kad(&config, &barcode, &account, account_hash, rollovers).await
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
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<LtokeyConfig> {
    if path.exists() {
        LtokeyConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display()))
    } else {
        tracing::debug!("config file not found: {} (using defaults)", path.display());
        Ok(LtokeyConfig::default())
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_mnemonic_new(words: usize) -> Result<()> {
    let phrase = mnemonic::generate_phrase(words)?;
    println!("{phrase}");
    eprintln!();
    eprintln!("Write these {words} words down and store them offline.");
    eprintln!("Anyone holding them (and the passphrase) can derive every tape key.");
    Ok(())
}

fn cmd_mnemonic_check() -> Result<()> {
    let phrase = rpassword::prompt_password("Recovery phrase: ")
        .context("reading recovery phrase")?;
    match mnemonic::phrase_to_words(&phrase) {
        Ok(words) => {
            println!("OK: valid {}-word phrase", words.len());
            Ok(())
        }
        Err(e) => anyhow::bail!("invalid phrase: {e}"),
    }
}

async fn cmd_fingerprint(
    config: &LtokeyConfig,
    account: &str,
    barcode: Option<&str>,
    rollovers: RolloverCounters,
) -> Result<()> {
    let seed = prompt_seed()?;
    let schema = &config.schema;
    let params = FingerprintParams::display(&config.fingerprint);

    let mut global = hierarchy::global_node(&seed, &schema.tree_label, rollovers.global);
    let global_fp = wait_fingerprint(&global, schema, rollovers.global, params.clone()).await?;
    println!("global  [{}]  {global_fp}", rollovers.global);

    let mut acct = hierarchy::account_node(&global, account, rollovers.account);
    global.wipe();
    let account_fp = wait_fingerprint(&acct, schema, rollovers.account, params.clone()).await?;
    println!("account [{}]  {account_fp}", rollovers.account);

    if let Some(bc) = barcode {
        let barcode = Barcode(bc.to_string());
        let mut tape = hierarchy::tape_node(&acct, &barcode, rollovers.tape);
        let tape_fp = wait_fingerprint(&tape, schema, rollovers.tape, params).await?;
        tape.wipe();
        println!("tape    [{}]  {tape_fp}", rollovers.tape);
    }
    acct.wipe();
    Ok(())
}

async fn cmd_kad(
    config: &LtokeyConfig,
    barcode: &str,
    account: &str,
    account_hash: Option<String>,
    rollovers: RolloverCounters,
) -> Result<()> {
    let seed = prompt_seed()?;
    let schema = &config.schema;
    let barcode = Barcode(barcode.to_string());

    let mut tape = hierarchy::derive_tape_node(
        &seed,
        &schema.tree_label,
        account,
        &barcode,
        rollovers,
    );
    let params = FingerprintParams::tape_kad(&config.fingerprint);
    let tape_fp = wait_fingerprint(&tape, schema, rollovers.tape, params).await?;
    tape.wipe();

    let account_hash = match account_hash {
        Some(mcf) => parse_mcf(&mcf)?,
        None => AccountHash::Crc32,
    };
    let kad = KeyAssociatedData {
        barcode,
        rollovers,
        schema: schema.ids.clone(),
        account_id: account.to_string(),
        account_hash,
        tape_fingerprint: tape_fp,
    };
    println!("{}", kad.get_kad());
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn prompt_seed() -> Result<Secret64> {
    let phrase = rpassword::prompt_password("Recovery phrase: ")
        .context("reading recovery phrase")?;
    let passphrase = SecretString::from(
        rpassword::prompt_password("Passphrase (empty for none): ")
            .context("reading passphrase")?,
    );
    let seed = mnemonic::seed_from_phrase(&phrase, &passphrase)
        .context("deriving seed from phrase")?;
    Ok(seed)
}

async fn wait_fingerprint(
    node: &ltk_derive::slip21::Slip21Node,
    schema: &ltk_core::config::SchemaConfig,
    rollover: u64,
    params: FingerprintParams,
) -> Result<String> {
    let mut task = spawn_fingerprint(node, &schema.validation_label, rollover, params)
        .context("starting fingerprint computation")?;
    task.wait().await.context("fingerprint computation")
}

/// Split an MCF/PHC-style hash `$scheme$rest...` into scheme and suffix.
/// Legacy schemes (empty, `_`) are accepted as-is.
fn parse_mcf(mcf: &str) -> Result<AccountHash> {
    let rest = mcf
        .strip_prefix('$')
        .context("account hash must start with '$'")?;
    let (scheme, suffix) = match rest.find('$') {
        Some(i) => (rest[..i].to_string(), rest[i..].to_string()),
        None => (rest.to_string(), String::new()),
    };
    Ok(AccountHash::Mcf { scheme, suffix })
}
