//! # DID Subcommand
//!
//! - `create` mints a `did:ethuri` identifier, stores its document and
//!   creates its claim tree with the given key authorized.
//! - `show` prints a stored document.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use idhub_core::Did;
use idhub_crypto::Secp256k1KeyPair;
use idhub_vc::{DocPublicKey, Document, DocumentStore};

use crate::hub::{Hub, HubArgs};
use crate::print_json;

/// Arguments for the `idhub did` subcommand.
#[derive(Args, Debug)]
pub struct DidArgs {
    #[command(subcommand)]
    pub command: DidCommand,
}

/// DID subcommands.
#[derive(Subcommand, Debug)]
pub enum DidCommand {
    /// Create a DID whose claim tree authorizes the given key.
    Create {
        /// secp256k1 private key hex.
        #[arg(long, env = "IDHUB_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },

    /// Print the stored DID document.
    Show {
        /// The DID.
        #[arg(long)]
        did: String,
    },
}

/// Mint a DID for `private_key_hex`, store its document and create its tree.
pub fn create_identity(hub: &Hub, private_key_hex: &str) -> Result<Did> {
    let keypair = Secp256k1KeyPair::from_hex(private_key_hex).context("invalid private key")?;
    let public_key = keypair.public_key();
    let did = Did::generate_ethuri();
    let document = Document::new_with_key(&did, DocPublicKey::secp256k1(&did, 1, &public_key))
        .context("failed to build DID document")?;
    hub.documents
        .save_document(&document)
        .with_context(|| format!("failed to store document for {did}"))?;
    let pointer = hub
        .service
        .create_tree_for_identity(&did, &public_key.to_sec1_bytes(false))
        .with_context(|| format!("failed to create claim tree for {did}"))?;
    tracing::info!(did = %did, version = pointer.version, "created identity");
    Ok(did)
}

/// Execute the DID subcommand.
pub fn run_did(args: &DidArgs, hub_args: &HubArgs) -> Result<u8> {
    let hub = hub_args.open()?;
    match &args.command {
        DidCommand::Create { private_key } => {
            let did = create_identity(&hub, private_key)?;
            println!("{did}");
        }
        DidCommand::Show { did } => {
            let did = Did::new(did.as_str()).context("invalid DID")?;
            match hub.documents.get_document(&did)? {
                Some(doc) => print_json(&doc)?,
                None => {
                    eprintln!("no document for {did}");
                    return Ok(1);
                }
            }
        }
    }
    Ok(0)
}
