//! # Key Subcommand
//!
//! secp256k1 key generation.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use idhub_crypto::Secp256k1KeyPair;

use crate::print_json;

/// Arguments for the `idhub key` subcommand.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a new secp256k1 key pair.
    Generate,
}

/// A generated key pair as printed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedKey {
    /// Private key, 64 hex characters.
    pub private_key: String,
    /// Uncompressed SEC1 public key hex.
    pub public_key: String,
}

/// Generate a key pair.
pub fn generate() -> GeneratedKey {
    let kp = Secp256k1KeyPair::generate();
    GeneratedKey {
        private_key: kp.secret_hex(),
        public_key: kp.public_key().to_uncompressed_hex(),
    }
}

/// Execute the key subcommand.
pub fn run_key(args: &KeyArgs) -> Result<u8> {
    match args.command {
        KeyCommand::Generate => print_json(&generate())?,
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_private_key_reproduces_public_key() {
        let key = generate();
        let kp = Secp256k1KeyPair::from_hex(&key.private_key).unwrap();
        assert_eq!(kp.public_key().to_uncompressed_hex(), key.public_key);
        assert!(key.public_key.starts_with("04"));
    }
}
