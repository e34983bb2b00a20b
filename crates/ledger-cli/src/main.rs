use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ledger_core::{Block, Ledger, LedgerConfig, RewardPolicy, Transaction};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Drive the in-process proof-of-work ledger")]
struct Cli {
    #[command(flatten)]
    ledger: LedgerArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct LedgerArgs {
    /// Leading zero hex symbols required of a block fingerprint
    #[arg(long, global = true, default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Reward paid to the miner of each block
    #[arg(long, global = true, default_value_t = ledger_core::constants::BLOCK_REWARD)]
    reward: u64,
    /// Hash the reward together with the block so mined chains verify
    #[arg(long, global = true)]
    strict: bool,
    /// Search nonces on all cores
    #[arg(long, global = true)]
    parallel: bool,
}

impl From<&LedgerArgs> for LedgerConfig {
    fn from(args: &LedgerArgs) -> Self {
        LedgerConfig {
            difficulty: args.difficulty,
            reward: args.reward,
            reward_policy: if args.strict {
                RewardPolicy::Strict
            } else {
                RewardPolicy::Historical
            },
            parallel: args.parallel,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer, mine, create/mint/burn a token, then verify the chain
    Demo {
        /// Miner credited with the block reward
        #[arg(long, default_value = "Miner1")]
        miner: String,
    },
    /// Mine a number of blocks of generated transfers and verify the chain
    Mine {
        #[arg(long, default_value = "Miner1")]
        miner: String,
        /// Blocks to mine
        #[arg(long, default_value_t = 3)]
        blocks: u64,
        /// Transfers submitted per block
        #[arg(long, default_value_t = 2)]
        txs: u64,
        /// Print every block as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut ledger = Ledger::new(LedgerConfig::from(&cli.ledger))?;
    info!(config = ?ledger.config(), "starting ledger-cli");

    match cli.cmd {
        Command::Demo { miner } => {
            ledger.submit_transaction(Transaction::transfer("Alice", "Bob", 10));
            if let Some(block) = ledger.mine(&miner) {
                println!("New block mined: {}", block.index);
            }

            ledger.create_token("StreamerCoin", 1_000_000_000)?;
            ledger.mint("StreamerCoin", 500, "Alice")?;
            ledger.burn("StreamerCoin", 100, "Alice")?;
            if let Some(token) = ledger.tokens().get("StreamerCoin") {
                println!(
                    "StreamerCoin supply: {}, Alice: {}",
                    token.total_supply(),
                    token.balance_of("Alice")
                );
            }

            print_verification(&ledger);
        }
        Command::Mine {
            miner,
            blocks,
            txs,
            json,
        } => {
            for b in 0..blocks {
                for t in 0..txs {
                    ledger.submit_transaction(Transaction::transfer(
                        format!("user-{t}"),
                        format!("user-{}", t + 1),
                        b * txs + t + 1,
                    ));
                }
                if let Some(block) = ledger.mine(&miner) {
                    print_block(block, json)?;
                }
            }
            print_verification(&ledger);
        }
    }
    Ok(())
}

fn print_block(block: &Block, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(block)?);
    } else {
        println!(
            "block {} nonce {} fingerprint {}",
            block.index,
            block.nonce,
            block.fingerprint()
        );
    }
    Ok(())
}

fn print_verification(ledger: &Ledger) {
    match ledger.verify_detailed() {
        Ok(()) => println!("Blockchain valid: true"),
        Err(violation) => {
            println!("Blockchain valid: false ({violation})");
        }
    }
}
