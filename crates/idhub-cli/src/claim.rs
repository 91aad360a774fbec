//! # Claim Subcommand
//!
//! - `sign` builds and signs a content credential without touching the
//!   data directory.
//! - `submit` registers a signed credential in its signer's claim tree.
//! - `list` prints an identity's claims and the credentials behind them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use idhub_claims::{Claim, ClaimReceipt};
use idhub_core::Did;
use idhub_crypto::Secp256k1KeyPair;
use idhub_vc::ContentCredential;

use crate::hub::{Hub, HubArgs};
use crate::print_json;

/// Arguments for the `idhub claim` subcommand.
#[derive(Args, Debug)]
pub struct ClaimArgs {
    #[command(subcommand)]
    pub command: ClaimCommand,
}

/// Claim subcommands.
#[derive(Subcommand, Debug)]
pub enum ClaimCommand {
    /// Build and sign a content credential, printing it as JSON.
    Sign {
        /// Issuer and signer DID.
        #[arg(long)]
        did: String,
        /// secp256k1 private key hex.
        #[arg(long, env = "IDHUB_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// Credential subject as a JSON object.
        #[arg(long)]
        subject: String,
        /// Write the credential here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify a signed credential and register it.
    Submit {
        /// Path to the credential JSON.
        #[arg(long)]
        file: PathBuf,
    },

    /// List an identity's claims and resolved credentials.
    List {
        /// The DID.
        #[arg(long)]
        did: String,
    },
}

/// An identity's claims as printed by `claim list`.
#[derive(Debug, Serialize)]
pub struct ClaimListing {
    /// The identity.
    pub did: Did,
    /// Every decodable claim in its tree.
    pub claims: Vec<Claim>,
    /// Credentials behind its document registrations.
    pub credentials: Vec<ContentCredential>,
}

/// Build a content credential for `subject` issued and signed by `did`.
pub fn sign_credential(did: &str, private_key_hex: &str, subject: &str) -> Result<ContentCredential> {
    let did = Did::new(did).context("invalid DID")?;
    let keypair = Secp256k1KeyPair::from_hex(private_key_hex).context("invalid private key")?;
    let subject: Value = serde_json::from_str(subject).context("subject is not valid JSON")?;
    anyhow::ensure!(subject.is_object(), "subject must be a JSON object");
    let mut credential = ContentCredential::new(&did, subject);
    credential
        .sign_secp256k1(&keypair, &did, None)
        .context("failed to sign credential")?;
    Ok(credential)
}

/// Register the credential stored at `file`.
pub fn submit_file(hub: &Hub, file: &std::path::Path) -> Result<ClaimReceipt> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("failed to read credential file {}", file.display()))?;
    let credential: ContentCredential =
        serde_json::from_slice(&bytes).context("credential file is not a content credential")?;
    let receipt = hub
        .service
        .claim_content(&credential)
        .context("credential was rejected")?;
    Ok(receipt)
}

/// Collect `did`'s claims and the credentials they register.
pub fn list_claims(hub: &Hub, did: &str) -> Result<ClaimListing> {
    let did = Did::new(did).context("invalid DID")?;
    let claims = hub.service.get_claims_for_identity(&did)?;
    let credentials = hub.service.claims_to_credentials(&claims)?;
    Ok(ClaimListing {
        did,
        claims,
        credentials,
    })
}

/// Execute the claim subcommand.
pub fn run_claim(args: &ClaimArgs, hub_args: &HubArgs) -> Result<u8> {
    match &args.command {
        ClaimCommand::Sign {
            did,
            private_key,
            subject,
            out,
        } => {
            let credential = sign_credential(did, private_key, subject)?;
            match out {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&credential)?;
                    std::fs::write(path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("OK: wrote credential to {}", path.display());
                }
                None => print_json(&credential)?,
            }
        }
        ClaimCommand::Submit { file } => {
            let hub = hub_args.open()?;
            print_json(&submit_file(&hub, file)?)?;
        }
        ClaimCommand::List { did } => {
            let hub = hub_args.open()?;
            print_json(&list_claims(&hub, did)?)?;
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::create_identity;
    use idhub_crypto::DEFAULT_MAX_LEVELS;

    fn open(dir: &std::path::Path) -> Hub {
        HubArgs {
            data_dir: dir.to_path_buf(),
            tree_depth: DEFAULT_MAX_LEVELS,
        }
        .open()
        .unwrap()
    }

    #[test]
    fn sign_submit_list() {
        let dir = tempfile::tempdir().unwrap();
        let hub = open(dir.path());
        let kp = Secp256k1KeyPair::generate();
        let did = create_identity(&hub, &kp.secret_hex()).unwrap();

        let cred = sign_credential(did.as_str(), &kp.secret_hex(), r#"{"id":"doc1"}"#).unwrap();
        let file = dir.path().join("cred.json");
        std::fs::write(&file, serde_json::to_vec(&cred).unwrap()).unwrap();

        let receipt = submit_file(&hub, &file).unwrap();
        assert_eq!(receipt.document_version, 1);
        assert_eq!(receipt.root_pointer.version, 2);

        let listing = list_claims(&hub, did.as_str()).unwrap();
        assert_eq!(listing.claims.len(), 2);
        assert_eq!(listing.credentials, vec![cred]);
    }

    #[test]
    fn subject_must_be_a_json_object() {
        let kp = Secp256k1KeyPair::generate();
        assert!(sign_credential("did:example:abc", &kp.secret_hex(), "[1,2]").is_err());
        assert!(sign_credential("did:example:abc", &kp.secret_hex(), "{").is_err());
        assert!(sign_credential("nope", &kp.secret_hex(), "{}").is_err());
    }

    #[test]
    fn credential_from_unknown_signer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let hub = open(dir.path());
        let kp = Secp256k1KeyPair::generate();
        let cred = sign_credential("did:ethuri:unknown", &kp.secret_hex(), "{}").unwrap();
        let file = dir.path().join("cred.json");
        std::fs::write(&file, serde_json::to_vec(&cred).unwrap()).unwrap();
        assert!(submit_file(&hub, &file).is_err());
    }
}
