//! `rbf`: construct and rebroadcast replace-by-fee transactions through a
//! running node's RPC interface.

use anyhow::Context;
use clap::Parser;
use rbf_core::scenarios::{bump, burn, doublespend, sendmany};
use rbf_core::{KnownScripts, NodeEndpoint};
use rbf_types::{Amount, FeeRate, Network, Txid};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rbf",
    about = "Fee bumping and replace-by-fee demonstration tools"
)]
struct Cli {
    /// Node RPC URL; defaults to localhost on the selected network's
    /// RPC port.
    #[arg(long, env = "RBF_RPC_URL")]
    rpc_url: Option<String>,

    /// Node RPC username.
    #[arg(long, env = "RBF_RPC_USER")]
    rpc_user: Option<String>,

    /// Node RPC password.
    #[arg(long, env = "RBF_RPC_PASS")]
    rpc_pass: Option<String>,

    /// Network: "main", "test", or "regtest".
    /// When a config file is provided, defaults to the file's value.
    #[arg(long, env = "RBF_NETWORK")]
    network: Option<Network>,

    /// Path to a TOML configuration file. CLI flags and env vars
    /// override its settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dry run: print the final transaction(s) instead of broadcasting.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Bump the fee of an unconfirmed transaction.
    BumpFee {
        /// Ratio of new fee rate to old fee rate.
        #[arg(short, long, default_value = "10")]
        ratio: FeeRate,

        /// Dust threshold in satoshis.
        #[arg(long, default_value_t = 10_000)]
        dust: u64,

        /// Transaction id to bump.
        txid: Txid,
    },

    /// Pay an address, then broadcast a conflicting transaction at a
    /// higher fee rate.
    DoubleSpend {
        /// Seconds between payment and double-spend broadcasts.
        #[arg(short, long, default_value_t = 30)]
        delay: u64,

        /// Dust threshold in satoshis.
        #[arg(long, default_value_t = 10_000)]
        dust: u64,

        /// Fee rate of the payment transaction (sat/vB).
        #[arg(long, default_value = "1.1")]
        fee1: FeeRate,

        /// Fee rate of the double-spend transaction (sat/vB).
        #[arg(long, default_value = "100")]
        fee2: FeeRate,

        /// Add an OP_RETURN marker output to the payment.
        #[arg(long)]
        op_return: bool,

        /// Add a bare-multisig output to discourage propagation.
        #[arg(long)]
        multisig: bool,

        /// Signal BIP125 opt-in replaceability.
        #[arg(long)]
        opt_in_rbf: bool,

        /// Pay dust to a "bad" address to discourage propagation
        /// (repeatable).
        #[arg(long = "bad-addr")]
        bad_addrs: Vec<String>,

        /// Address to pay (and double-spend).
        address: String,

        /// Amount to send, in satoshis.
        amount: u64,
    },

    /// Pay a recipient by replacing a previous transaction, combining
    /// payments into one transaction.
    SendMany {
        /// First-seen-safe rules: do not decrease the value of any
        /// existing output.
        #[arg(short = 's', long)]
        first_seen_safe: bool,

        /// Previous txid to add the new output to; builds a fresh
        /// transaction when unset.
        #[arg(short = 'p', long)]
        prev_txid: Option<Txid>,

        /// Relay bandwidth fee rate (sat/vB).
        #[arg(long, default_value = "1.1")]
        relay_feerate: FeeRate,

        /// Dust threshold in satoshis.
        #[arg(long, default_value_t = 10_000)]
        dust: u64,

        /// Destination address.
        address: String,

        /// Amount to send, in satoshis.
        amount: u64,
    },

    /// Watch the mempool and spend outputs locked by known scripts
    /// entirely to fees.
    ScanBurn {
        /// Seconds between mempool scans.
        #[arg(short, long, default_value_t = 10)]
        delay: u64,

        /// File of known locking scripts, one per line.
        #[arg(short = 'f', long, default_value = "known-scripts")]
        scripts_file: PathBuf,
    },
}

/// Settings loadable from `--config`; every field is optional and
/// overridden by the matching CLI flag or env var.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    network: Option<Network>,
    #[serde(default)]
    rpc: RpcSection,
}

#[derive(Debug, Default, Deserialize)]
struct RpcSection {
    url: Option<String>,
    user: Option<String>,
    pass: Option<String>,
}

fn resolve_endpoint(cli: &Cli, file: &FileConfig) -> NodeEndpoint {
    let network = cli.network.or(file.network).unwrap_or_default();
    let url = cli
        .rpc_url
        .clone()
        .or_else(|| file.rpc.url.clone())
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", network.default_rpc_port()));
    NodeEndpoint {
        url,
        user: cli.rpc_user.clone().or_else(|| file.rpc.user.clone()),
        pass: cli.rpc_pass.clone().or_else(|| file.rpc.pass.clone()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    rbf_utils::init_tracing(cli.verbose);

    let file_config = match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: FileConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => FileConfig::default(),
    };

    let endpoint = resolve_endpoint(&cli, &file_config);
    tracing::debug!(url = %endpoint.url, "using node RPC endpoint");

    match cli.command {
        Command::BumpFee { ratio, dust, txid } => {
            let client = endpoint.connect()?;
            let outcome = bump::run(
                &client,
                &bump::BumpOptions {
                    txid,
                    ratio,
                    dust: Amount::new(dust),
                    dry_run: cli.dry_run,
                },
            )
            .await?;
            match outcome.broadcast_txid {
                Some(txid) => println!("{txid}"),
                None => println!("{}", outcome.tx.to_hex()),
            }
        }

        Command::DoubleSpend {
            delay,
            dust,
            fee1,
            fee2,
            op_return,
            multisig,
            opt_in_rbf,
            bad_addrs,
            address,
            amount,
        } => {
            let outcome = doublespend::run(
                &endpoint,
                &doublespend::DoubleSpendOptions {
                    address,
                    amount: Amount::new(amount),
                    delay: Duration::from_secs(delay),
                    dust: Amount::new(dust),
                    fee1,
                    fee2,
                    op_return,
                    multisig,
                    opt_in_rbf,
                    bad_addrs,
                    dry_run: cli.dry_run,
                },
            )
            .await?;
            if cli.dry_run {
                println!("{}", outcome.payment.to_hex());
                println!("{}", outcome.replacement.to_hex());
            }
        }

        Command::SendMany {
            first_seen_safe,
            prev_txid,
            relay_feerate,
            dust,
            address,
            amount,
        } => {
            let client = endpoint.connect()?;
            let outcome = sendmany::run(
                &client,
                &sendmany::SendManyOptions {
                    address,
                    amount: Amount::new(amount),
                    prev_txid,
                    first_seen_safe,
                    relay_feerate,
                    dust: Amount::new(dust),
                    dry_run: cli.dry_run,
                },
            )
            .await?;
            match outcome.broadcast_txid {
                Some(txid) => println!("{txid}"),
                None => println!("{}", outcome.tx.to_hex()),
            }
        }

        Command::ScanBurn {
            delay,
            scripts_file,
        } => {
            let known = KnownScripts::load(&scripts_file)?;
            let mut scanner =
                burn::BurnScanner::new(endpoint, known, Duration::from_secs(delay));
            scanner.run().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_bump_fee_args() {
        let cli = parse(&[
            "rbf",
            "-n",
            "bump-fee",
            "-r",
            "2.5",
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
        ]);
        assert!(cli.dry_run);
        match cli.command {
            Command::BumpFee { ratio, dust, .. } => {
                assert_eq!(ratio, "2.5".parse().unwrap());
                assert_eq!(dust, 10_000);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_malformed_txid_rejected() {
        assert!(Cli::try_parse_from(["rbf", "bump-fee", "nothex"]).is_err());
        assert!(Cli::try_parse_from(["rbf", "bump-fee", "abcd"]).is_err());
    }

    #[test]
    fn test_endpoint_resolution_precedence() {
        let cli = parse(&[
            "rbf",
            "--rpc-url",
            "http://10.0.0.1:8332",
            "scan-burn",
        ]);
        let file = FileConfig {
            network: Some(Network::Test),
            rpc: RpcSection {
                url: Some("http://filehost:18332".into()),
                user: Some("fileuser".into()),
                pass: None,
            },
        };
        let endpoint = resolve_endpoint(&cli, &file);
        assert_eq!(endpoint.url, "http://10.0.0.1:8332");
        assert_eq!(endpoint.user.as_deref(), Some("fileuser"));
    }

    #[test]
    fn test_endpoint_defaults_from_network() {
        let cli = parse(&["rbf", "--network", "regtest", "scan-burn"]);
        let endpoint = resolve_endpoint(&cli, &FileConfig::default());
        assert_eq!(endpoint.url, "http://127.0.0.1:18443");
    }

    #[test]
    fn test_config_file_parses() {
        let config: FileConfig = toml::from_str(
            "network = \"test\"\n\n[rpc]\nurl = \"http://127.0.0.1:18332\"\nuser = \"u\"\npass = \"p\"\n",
        )
        .unwrap();
        assert_eq!(config.network, Some(Network::Test));
        assert_eq!(config.rpc.user.as_deref(), Some("u"));
    }

    #[test]
    fn test_double_spend_repeatable_bad_addr() {
        let cli = parse(&[
            "rbf",
            "double-spend",
            "--bad-addr",
            "addr1",
            "--bad-addr",
            "addr2",
            "dest",
            "50000",
        ]);
        match cli.command {
            Command::DoubleSpend {
                bad_addrs, amount, ..
            } => {
                assert_eq!(bad_addrs, vec!["addr1", "addr2"]);
                assert_eq!(amount, 50_000);
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
