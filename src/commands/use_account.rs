use anyhow::{Context, Result};
use clap::Args;
use std::{env, path::PathBuf};
use tracing::{info, warn};

use super::list;
use crate::{
    aws::{self, NO_ROLE_CHOICE, SecurityTokenService, StsService},
    config,
    credentials::ExtractedCredentials,
    error::Error,
    export,
    onepassword::{ItemStore, OpClient},
    select::{Selector, TerminalSelector},
    session::{self, SessionEnvironment},
};

#[derive(Debug, Clone, Args)]
pub struct UseCommand {
    #[arg(short = 'a', long, help = "1Password item ID to use")]
    pub account: Option<String>,

    #[arg(
        short = 'r',
        long,
        help = "Role label to assume from the item's Roles section (\"None\" for no role)"
    )]
    pub role: Option<String>,

    #[arg(short = 'o', long, help = "File to write the exports to")]
    pub output: Option<PathBuf>,
}

impl UseCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        let config = config::load(profile).await?;
        let store = OpClient::new(&config.op_path);
        let sts = StsService::new(config.region.clone());
        let selector = TerminalSelector::new();

        let env = resolve(
            &store,
            &sts,
            &selector,
            &config.tag,
            self.account.as_deref(),
            self.role.as_deref(),
        )
        .await?;

        let output = self.output.unwrap_or(config.output_file);
        let work_dir = env::current_dir().context("Failed to determine working directory")?;
        export::export(&env, &output, &work_dir)
            .await
            .context("Failed to write credentials")?;

        let file = output.display();
        println!("Credentials written to {file}");
        println!("Run `source {file} && rm {file}` to use the credentials");
        Ok(())
    }
}

/// Select an item and derive the environment to export for it
pub async fn resolve(
    store: &dyn ItemStore,
    sts: &dyn SecurityTokenService,
    selector: &dyn Selector,
    tag: &str,
    item_id: Option<&str>,
    role: Option<&str>,
) -> Result<SessionEnvironment> {
    let items = store
        .list_tagged_items(tag)
        .await
        .context("Failed to list 1Password items")?;

    let summary = match item_id {
        Some(id) => items
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?,
        None if items.is_empty() => {
            anyhow::bail!("No 1Password items tagged '{tag}' found")
        }
        None => list::choose(selector, items)?.ok_or(Error::SelectionCancelled)?,
    };

    let item = store
        .get_item(&summary.id, &summary.owning_account_id)
        .await?;
    info!("Using item '{}'", item.title);

    let mut creds = ExtractedCredentials::extract(&item)?;
    let identity = aws::probe(sts, &creds.key_pair()).await?;

    if let Some(label) = ignored_role(&creds, role) {
        warn!(
            "Item '{}' has no roles, ignoring requested role '{}'",
            item.title, label
        );
    }

    if let Some(roles) = &creds.roles {
        let selected = match role {
            Some(label) if label == NO_ROLE_CHOICE => None,
            Some(label) => Some(roles.find(label)?),
            None => {
                let index = selector
                    .select("Which role do you want to use?", &roles.choices())?
                    .ok_or(Error::SelectionCancelled)?;
                roles.from_choice(index)
            }
        };
        creds.select_role(selected);
    }

    Ok(session::derive(sts, &item, &creds, &identity).await?)
}

/// Role label requested on the command line that the item cannot honor
fn ignored_role<'a>(creds: &ExtractedCredentials, role: Option<&'a str>) -> Option<&'a str> {
    role.filter(|label| creds.roles.is_none() && *label != NO_ROLE_CHOICE)
}
