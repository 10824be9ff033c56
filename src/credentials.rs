use tracing::{debug, info};

use crate::{
    aws::{AvailableRoles, IamRole, KeyPair},
    constants::{ACCESS_KEY_ID_LABEL, MFA_SERIAL_LABEL, SECRET_ACCESS_KEY_LABEL},
    error::{Error, Result},
    onepassword::{CredentialItem, ROLES_SECTION_LABEL},
};

/// Typed view of an AWS credential item
#[derive(Debug, Clone)]
pub struct ExtractedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub mfa_serial: Option<String>,
    /// One-time code, read once from the item and reused for every STS call
    pub otp: Option<String>,
    pub mfa_enabled: bool,
    pub has_roles: bool,
    pub roles: Option<AvailableRoles>,
    pub selected_role: Option<IamRole>,
}

impl ExtractedCredentials {
    pub fn extract(item: &CredentialItem) -> Result<Self> {
        info!("Validating credentials of item '{}'", item.title);

        let otp = item
            .otp_field()
            .and_then(|f| f.otp_code())
            .map(str::to_string);
        let mfa_serial = item.field_value(MFA_SERIAL_LABEL).map(str::to_string);

        let access_key_id = required(item, ACCESS_KEY_ID_LABEL)?;
        let secret_access_key = required(item, SECRET_ACCESS_KEY_LABEL)?;

        let mfa_enabled = otp.is_some() && mfa_serial.is_some();
        let has_roles = item.has_section(ROLES_SECTION_LABEL);
        let roles = has_roles.then(|| AvailableRoles::from_item(item)).flatten();

        debug!(
            "MFA enabled: {}, roles available: {}",
            mfa_enabled,
            roles.as_ref().map_or(0, |r| r.as_slice().len())
        );

        Ok(Self {
            access_key_id,
            secret_access_key,
            mfa_serial,
            otp,
            mfa_enabled,
            has_roles,
            roles,
            selected_role: None,
        })
    }

    pub fn key_pair(&self) -> KeyPair {
        KeyPair {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    /// MFA serial and cached code, when both are present
    pub fn mfa(&self) -> Option<(&str, &str)> {
        match (&self.mfa_serial, &self.otp) {
            (Some(serial), Some(code)) if self.mfa_enabled => {
                Some((serial.as_str(), code.as_str()))
            }
            _ => None,
        }
    }

    pub fn select_role(&mut self, role: Option<IamRole>) {
        self.selected_role = role;
    }
}

fn required(item: &CredentialItem, label: &'static str) -> Result<String> {
    item.field_value(label)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingRequiredField {
            item: item.title.clone(),
            field: label,
        })
}
