use crate::config::Config;
use crate::core::{Block, Chain, Payload, Transaction};
use crate::mining::ProofOfWork;
use crate::{LedgerError, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "hashledger")]
#[command(about = "Hashledger - a single-node proof-of-work ledger with UTXO balances")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Block store directory")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Proof-of-work difficulty for newly mined blocks")]
    pub difficulty: Option<u32>,

    #[arg(long, global = true, help = "Enable debug logging")]
    pub debug: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blockchain and send the genesis reward to ADDRESS
    #[command(name = "createchain")]
    CreateChain { address: String },

    /// Print every block from the tip back to genesis
    #[command(name = "printchain")]
    PrintChain,

    /// Get the balance of an address
    #[command(name = "getbalance")]
    GetBalance { address: String },

    /// Send AMOUNT coins from one address to another
    Send { from: String, to: String, amount: u64 },

    /// Mine a block carrying raw data and no transactions
    #[command(name = "addblock")]
    AddBlock { data: String },

    /// Re-check proof of work and hash links of every block
    Validate,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            log::warn!("Falling back to default configuration: {}", e);
            Config::default()
        }),
    };

    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(difficulty) = cli.difficulty {
        config.mining.difficulty = difficulty;
    }
    config.validate()?;

    match cli.command {
        Commands::CreateChain { address } => create_chain(&config, address).await,
        Commands::PrintChain => print_chain(&config),
        Commands::GetBalance { address } => get_balance(&config, &address),
        Commands::Send { from, to, amount } => send(&config, &from, &to, amount).await,
        Commands::AddBlock { data } => add_block(&config, data).await,
        Commands::Validate => validate_chain(&config),
    }
}

fn open_chain(config: &Config) -> Result<Chain> {
    let pow = ProofOfWork::from_config(&config.mining)?;
    Chain::open(&config.storage.data_dir, pow)
}

async fn create_chain(config: &Config, address: String) -> Result<()> {
    let pow = ProofOfWork::from_config(&config.mining)?;
    let cancel = pow.cancel_flag();
    let path = config.storage.data_dir.clone();
    let coinbase = Transaction::new_coinbase(
        &address,
        config.consensus.coinbase_reward,
        &config.consensus.genesis_data,
    );

    let tip = run_mining(cancel, move || {
        let chain = Chain::initialize(&path, pow, Payload::Transactions(vec![coinbase]))?;
        let tip = chain.tip();
        chain.close()?;
        Ok(tip)
    })
    .await?;

    println!("✅ Genesis created: {}", tip);
    println!("💰 {} coins sent to {}", config.consensus.coinbase_reward, address);
    Ok(())
}

fn print_chain(config: &Config) -> Result<()> {
    let chain = open_chain(config)?;

    for block in chain.iter() {
        print_block(&block?);
    }

    Ok(())
}

fn print_block(block: &Block) {
    let prev_hash = block.prev_hash.map(|hash| hash.to_string()).unwrap_or_default();

    println!("Prev. hash: {}", prev_hash);
    println!("Hash: {}", block.hash);
    println!("Nonce: {}", block.nonce);
    println!("Difficulty: {}", block.difficulty);
    println!("PoW: {}", ProofOfWork::validate(block));

    match &block.payload {
        Payload::Data(data) => println!("Data: {}", String::from_utf8_lossy(data)),
        Payload::Transactions(transactions) => {
            for tx in transactions {
                println!("  Transaction {}{}", tx.id, if tx.is_coinbase() { " (coinbase)" } else { "" });
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        println!(
                            "    in:  {}:{} from {}",
                            input.previous_output.txid, input.previous_output.vout, input.signature
                        );
                    }
                }
                for (vout, output) in tx.outputs.iter().enumerate() {
                    println!("    out: #{} {} to {}", vout, output.value, output.address);
                }
            }
        }
    }
    println!();
}

fn get_balance(config: &Config, address: &str) -> Result<()> {
    let chain = open_chain(config)?;

    let balance = chain.utxo().get_balance(address)?;

    println!("Balance of '{}': {}", address, balance);
    Ok(())
}

async fn send(config: &Config, from: &str, to: &str, amount: u64) -> Result<()> {
    let chain = open_chain(config)?;
    let tx = Transaction::new_transfer(from, to, amount, &chain)?;
    log::debug!("Built transaction {} with {} inputs", tx.id, tx.inputs.len());

    let (block, height) = append_in_background(chain, Payload::Transactions(vec![tx])).await?;

    println!("✅ Success! {} sent from {} to {}", amount, from, to);
    println!("📦 Block {} at height {}", block.hash, height);
    Ok(())
}

async fn add_block(config: &Config, data: String) -> Result<()> {
    let chain = open_chain(config)?;
    let (block, height) = append_in_background(chain, Payload::Data(data.into_bytes())).await?;

    println!("✅ Block added at height {}: {}", height, block.hash);
    Ok(())
}

fn validate_chain(config: &Config) -> Result<()> {
    let chain = open_chain(config)?;
    let report = chain.verify()?;

    for invalid in &report.invalid_blocks {
        println!("❌ {}: {}", invalid.hash, invalid.reason);
    }

    if !report.is_valid() {
        return Err(LedgerError::CorruptChain(format!(
            "{} problem(s) found in {} blocks",
            report.invalid_blocks.len(),
            report.blocks_checked
        )));
    }

    println!("✅ All {} blocks are valid", report.blocks_checked);
    Ok(())
}

async fn append_in_background(chain: Chain, payload: Payload) -> Result<(Block, u64)> {
    let cancel = chain.pow().cancel_flag();

    run_mining(cancel, move || {
        let mut chain = chain;
        let block = chain.append(payload)?;
        let height = chain.height()?;
        chain.close()?;
        Ok((block, height))
    })
    .await
}

/// Run a mining job off the async runtime. Ctrl+C raises the cancel flag and
/// waits for the job to stop at its next nonce.
async fn run_mining<T, F>(cancel: Arc<AtomicBool>, job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("⛏️  Mining block...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut handle = tokio::task::spawn_blocking(job);
    let joined = tokio::select! {
        joined = &mut handle => joined,
        Ok(()) = signal::ctrl_c() => {
            spinner.set_message("🛑 Cancelling...");
            cancel.store(true, Ordering::Relaxed);
            handle.await
        }
    };

    spinner.finish_and_clear();
    joined?
}
