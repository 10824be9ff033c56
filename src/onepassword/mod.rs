use async_trait::async_trait;

use crate::error::Result;

pub mod client;
pub mod item;

pub use client::OpClient;
pub use item::{Account, CredentialItem, Field, FieldKind, ROLES_SECTION_LABEL, Section};

/// Source of credential items
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// List items carrying `tag` across every signed-in account
    async fn list_tagged_items(&self, tag: &str) -> Result<Vec<CredentialItem>>;

    /// Fetch the full record of one item
    async fn get_item(&self, id: &str, account_id: &str) -> Result<CredentialItem>;
}
