use anyhow::Result;
use clap::Parser;
use powchain_core::chain::{build_chain_with, MineStrategy};
use powchain_core::pow::CancelToken;
use powchain_core::{Block, ChainConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Mine a short proof-of-work chain and print it")]
struct Cli {
    /// Number of blocks to mine
    #[arg(long, default_value_t = 5)]
    blocks: u64,

    /// Required leading zero hex characters per block hash
    #[arg(long, default_value_t = 3)]
    difficulty: usize,

    /// Race worker threads over each block's nonce space
    #[arg(long)]
    parallel: bool,

    /// Print the chain as JSON instead of the text view
    #[arg(long)]
    json: bool,
}

// Hashes are fixed-length hex but the renderer never relies on how long;
// it just truncates for display.
fn short(hash: &str) -> &str {
    &hash[..hash.len().min(20)]
}

fn print_block(block: &Block) {
    println!("block {}", block.index);
    println!("  payload:   {}", block.payload);
    println!("  nonce:     {}", block.nonce);
    println!("  hash:      {}...", short(&block.hash));
    println!("  prev hash: {}...", short(&block.previous_hash));
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ChainConfig::new(cli.difficulty)?;
    let strategy = if cli.parallel {
        MineStrategy::Parallel
    } else {
        MineStrategy::Sequential
    };

    let report = build_chain_with(cli.blocks, &config, &CancelToken::new(), strategy)?;
    info!(
        blocks = report.chain.len(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "chain built"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.chain)?);
    } else {
        for block in &report.chain {
            print_block(block);
        }
        println!(
            "built {} blocks in {:.2}s",
            report.chain.len(),
            report.elapsed.as_secs_f64()
        );
    }
    Ok(())
}
