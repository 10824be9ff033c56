use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Account, CredentialItem, ItemStore};
use crate::error::{Error, Result};

/// Upper bound on accounts queried at the same time
const MAX_CONCURRENT_ACCOUNTS: usize = 4;

/// [`ItemStore`] backed by the 1Password CLI
#[derive(Debug, Clone)]
pub struct OpClient {
    binary: PathBuf,
}

/// Failure of a single `op` invocation
enum OpFailure {
    Spawn(std::io::Error),
    Exit(String),
}

impl OpClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> std::result::Result<Vec<u8>, OpFailure> {
        debug!("Running op {}", args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(OpFailure::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OpFailure::Exit(stderr));
        }

        Ok(output.stdout)
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let stdout = self.run(args).await.map_err(|e| self.unavailable(e))?;
        serde_json::from_slice(&stdout)
            .map_err(|e| Error::StoreUnavailable(format!("unexpected op output: {e}")))
    }

    fn unavailable(&self, failure: OpFailure) -> Error {
        match failure {
            OpFailure::Spawn(e) => Error::StoreUnavailable(format!(
                "failed to run {}: {e}",
                self.binary.display()
            )),
            OpFailure::Exit(stderr) => Error::StoreUnavailable(stderr),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.run_json(&["account", "list", "--format=json"]).await
    }

    async fn list_account_items(&self, account: Account) -> Result<Vec<CredentialItem>> {
        let account_id = account.user_uuid;

        self.run(&["signin", "--account", &account_id])
            .await
            .map_err(|e| self.unavailable(e))?;

        let items: Vec<CredentialItem> = self
            .run_json(&[
                "item",
                "list",
                "--long",
                "--format=json",
                "--account",
                &account_id,
            ])
            .await?;

        debug!("Account {} returned {} items", account_id, items.len());
        Ok(assign_account(items, &account_id))
    }
}

#[async_trait]
impl ItemStore for OpClient {
    async fn list_tagged_items(&self, tag: &str) -> Result<Vec<CredentialItem>> {
        let accounts = self.list_accounts().await?;
        info!("Listing 1Password items across {} accounts", accounts.len());

        let per_account: Vec<Vec<CredentialItem>> = stream::iter(accounts)
            .map(|account| self.list_account_items(account))
            .buffered(MAX_CONCURRENT_ACCOUNTS)
            .try_collect()
            .await?;

        Ok(filter_tagged(per_account.into_iter().flatten(), tag))
    }

    async fn get_item(&self, id: &str, account_id: &str) -> Result<CredentialItem> {
        let stdout = self
            .run(&["item", "get", id, "--format=json", "--account", account_id])
            .await
            .map_err(|failure| match failure {
                OpFailure::Exit(stderr) if is_not_found(&stderr) => {
                    Error::ItemNotFound(id.to_string())
                }
                other => self.unavailable(other),
            })?;

        let mut item: CredentialItem = serde_json::from_slice(&stdout)
            .map_err(|e| Error::StoreUnavailable(format!("unexpected op output: {e}")))?;
        item.owning_account_id = account_id.to_string();
        Ok(item)
    }
}

fn assign_account(items: Vec<CredentialItem>, account_id: &str) -> Vec<CredentialItem> {
    items
        .into_iter()
        .map(|mut item| {
            item.owning_account_id = account_id.to_string();
            item
        })
        .collect()
}

fn filter_tagged(items: impl IntoIterator<Item = CredentialItem>, tag: &str) -> Vec<CredentialItem> {
    items.into_iter().filter(|item| item.has_tag(tag)).collect()
}

/// Whether `op item get` stderr reports a missing item rather than an outage
fn is_not_found(stderr: &str) -> bool {
    stderr.contains("isn't an item") || stderr.contains("not found")
}
