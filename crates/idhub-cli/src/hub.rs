//! # Data Directory
//!
//! Global options and the on-disk stores they open.
//!
//! ```text
//! {data_dir}/tree/          claim trees and the root commitment tree
//! {data_dir}/credentials/   content-addressed credentials
//! {data_dir}/documents/     DID documents
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use idhub_claims::{ClaimsService, ClaimsServiceConfig};
use idhub_crypto::{FsStorage, Storage, DEFAULT_MAX_LEVELS};
use idhub_vc::{ContentAddressedStore, FsDocumentStore};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct HubArgs {
    /// Root directory of on-disk state.
    #[arg(
        long,
        env = "IDHUB_DATA_DIR",
        default_value = "./idhub-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Maximum Sparse Merkle Tree depth.
    #[arg(
        long,
        env = "IDHUB_TREE_DEPTH",
        default_value_t = DEFAULT_MAX_LEVELS,
        global = true
    )]
    pub tree_depth: usize,
}

/// The stores and service behind one data directory.
pub struct Hub {
    /// The claims service over `tree/`.
    pub service: ClaimsService,
    /// DID documents under `documents/`.
    pub documents: Arc<FsDocumentStore>,
    /// Credentials under `credentials/`.
    pub credentials: Arc<ContentAddressedStore>,
}

impl HubArgs {
    /// Open (creating if needed) every store under the data directory.
    pub fn open(&self) -> Result<Hub> {
        let tree_dir = self.data_dir.join("tree");
        let storage: Arc<dyn Storage> = Arc::new(
            FsStorage::open(&tree_dir)
                .with_context(|| format!("failed to open tree store {}", tree_dir.display()))?,
        );
        let credentials = Arc::new(
            ContentAddressedStore::open(self.data_dir.join("credentials"))
                .context("failed to open credential store")?,
        );
        let documents = Arc::new(
            FsDocumentStore::open(self.data_dir.join("documents"))
                .context("failed to open document store")?,
        );
        let service = ClaimsService::new(
            storage,
            credentials.clone(),
            documents.clone(),
            ClaimsServiceConfig {
                max_tree_levels: self.tree_depth,
            },
        )
        .context("failed to open claims service")?;
        tracing::debug!(
            data_dir = %self.data_dir.display(),
            tree_depth = self.tree_depth,
            "opened data directory"
        );
        Ok(Hub {
            service,
            documents,
            credentials,
        })
    }
}
