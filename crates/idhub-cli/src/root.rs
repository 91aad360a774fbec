//! # Root Subcommand
//!
//! Inspects the root commitment tree.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use idhub_claims::Claim;
use idhub_core::Did;
use idhub_crypto::Hash;

use crate::hub::HubArgs;
use crate::print_json;

/// Arguments for the `idhub root` subcommand.
#[derive(Args, Debug)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: RootCommand,
}

/// Root subcommands.
#[derive(Subcommand, Debug)]
pub enum RootCommand {
    /// Print every root pointer and the commitment root.
    List,

    /// Print the latest root pointer for one identity.
    Show {
        /// The DID.
        #[arg(long)]
        did: String,
    },
}

#[derive(Debug, Serialize)]
struct RootListing {
    root: Hash,
    claims: Vec<Claim>,
}

/// Execute the root subcommand.
pub fn run_root(args: &RootArgs, hub_args: &HubArgs) -> Result<u8> {
    let hub = hub_args.open()?;
    match &args.command {
        RootCommand::List => {
            let listing = RootListing {
                root: hub.service.root(),
                claims: hub.service.get_root_claims()?,
            };
            print_json(&listing)?;
        }
        RootCommand::Show { did } => {
            let did = Did::new(did.as_str()).context("invalid DID")?;
            match hub.service.current_root_for_identity(&did)? {
                Some(pointer) => print_json(&pointer)?,
                None => {
                    eprintln!("{did} has no published root");
                    return Ok(1);
                }
            }
        }
    }
    Ok(0)
}
