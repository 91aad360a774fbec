//! # idhub-cli: Identity Hub Command-Line Interface
//!
//! ## Subcommands
//!
//! - `key`: secp256k1 key generation
//! - `did`: DID creation and document inspection
//! - `claim`: content credential signing, submission and listing
//! - `root`: root commitment tree inspection
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from handlers; handlers delegate to the
//!   library crates.
//! - All on-disk state lives under one data directory (see [`hub`]).
//! - Output is JSON on stdout; logs go to stderr.

pub mod claim;
pub mod did;
pub mod hub;
pub mod key;
pub mod logging;
pub mod root;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}
