//! # idhub CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use idhub_cli::claim::{run_claim, ClaimArgs};
use idhub_cli::did::{run_did, DidArgs};
use idhub_cli::hub::HubArgs;
use idhub_cli::key::{run_key, KeyArgs};
use idhub_cli::logging;
use idhub_cli::root::{run_root, RootArgs};

/// Identity hub CLI.
///
/// Creates DIDs with per-identity claim trees, signs and registers content
/// credentials, and inspects the root commitment tree.
#[derive(Parser, Debug)]
#[command(name = "idhub", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    hub: HubArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// secp256k1 key generation.
    Key(KeyArgs),

    /// DID creation and inspection.
    Did(DidArgs),

    /// Content credential signing, submission and listing.
    Claim(ClaimArgs),

    /// Root commitment tree inspection.
    Root(RootArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_json) {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    tracing::debug!(data_dir = %cli.hub.data_dir.display(), "idhub starting");

    let result = match &cli.command {
        Commands::Key(args) => run_key(args),
        Commands::Did(args) => run_did(args, &cli.hub),
        Commands::Claim(args) => run_claim(args, &cli.hub),
        Commands::Root(args) => run_root(args, &cli.hub),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
