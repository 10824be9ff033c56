use anyhow::{Context, Result};
use std::slice::Iter;

use crate::onepassword::{CredentialItem, ROLES_SECTION_LABEL};

/// Label of the choice that keeps the item's own credentials
pub const NO_ROLE_CHOICE: &str = "None";

/// Assumable IAM role stored in the item's "Roles" section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRole {
    /// Display name (the field label)
    pub label: String,
    pub role_arn: String,
}

/// Roles available on an item (the empty case is excluded by type)
#[derive(Debug, Clone)]
pub enum AvailableRoles {
    Single(IamRole),
    Multiple(Vec<IamRole>),
}

impl AvailableRoles {
    /// Collect role fields from the item's "Roles" section
    pub fn from_item(item: &CredentialItem) -> Option<Self> {
        let mut roles: Vec<IamRole> = item
            .fields_in_section(ROLES_SECTION_LABEL)
            .filter_map(|field| {
                let role_arn = field.value.as_deref().filter(|v| !v.is_empty())?;
                Some(IamRole {
                    label: field.label.clone(),
                    role_arn: role_arn.to_string(),
                })
            })
            .collect();

        match roles.len() {
            0 => None,
            1 => roles.pop().map(AvailableRoles::Single),
            _ => Some(AvailableRoles::Multiple(roles)),
        }
    }

    /// Find a role by its label
    pub fn find(&self, label: &str) -> Result<IamRole> {
        self.iter()
            .find(|r| r.label == label)
            .cloned()
            .with_context(|| {
                format!(
                    "Role '{label}' not found. Available roles: {}",
                    self.labels().join(", ")
                )
            })
    }

    /// Choice list for the selector, led by the "None" sentinel
    pub fn choices(&self) -> Vec<String> {
        std::iter::once(NO_ROLE_CHOICE.to_string())
            .chain(self.iter().map(|r| r.label.clone()))
            .collect()
    }

    /// Map an index into [`Self::choices`] back to a role
    pub fn from_choice(&self, index: usize) -> Option<IamRole> {
        index
            .checked_sub(1)
            .and_then(|i| self.as_slice().get(i))
            .cloned()
    }

    pub fn as_slice(&self) -> &[IamRole] {
        match self {
            AvailableRoles::Single(role) => std::slice::from_ref(role),
            AvailableRoles::Multiple(roles) => roles.as_slice(),
        }
    }

    pub fn iter(&self) -> Iter<'_, IamRole> {
        self.as_slice().iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.iter().map(|r| r.label.as_str()).collect()
    }
}
