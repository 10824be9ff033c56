use anyhow::{Context, Result};
use clap::Args;

use crate::{
    config,
    onepassword::{CredentialItem, ItemStore, OpClient},
    select::{Selector, TerminalSelector},
};

#[derive(Debug, Clone, Args)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        let config = config::load(profile).await?;
        let store = OpClient::new(&config.op_path);
        let selector = TerminalSelector::new();

        let items = store
            .list_tagged_items(&config.tag)
            .await
            .context("Failed to list 1Password items")?;

        if items.is_empty() {
            println!("No 1Password items tagged '{}' found.", config.tag);
            return Ok(());
        }

        if let Some(item) = choose(&selector, items)? {
            println!("{}", item.title);
            println!("  id:      {}", item.id);
            println!("  account: {}", item.owning_account_id);
        }
        Ok(())
    }
}

/// Present the items by title; `None` when the list is empty or dismissed
pub fn choose(
    selector: &dyn Selector,
    mut items: Vec<CredentialItem>,
) -> Result<Option<CredentialItem>> {
    let titles: Vec<String> = items.iter().map(|item| item.title.clone()).collect();

    let choice = selector.select("Which account do you want to use?", &titles)?;
    Ok(choice.filter(|&i| i < items.len()).map(|i| items.swap_remove(i)))
}
