use serde::Deserialize;

/// Section label marking fields as assumable IAM roles
pub const ROLES_SECTION_LABEL: &str = "Roles";

/// 1Password account as reported by `op account list`
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub user_uuid: String,
}

/// 1Password item, either a list overview (no fields) or a full `op item get` record
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialItem {
    pub id: String,
    pub title: String,
    /// Set by the store after fetching; `op` does not report it in item JSON
    #[serde(skip)]
    pub owning_account_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub value: Option<String>,
    /// Live one-time code, only present on OTP fields
    #[serde(default)]
    pub totp: Option<String>,
    #[serde(default)]
    pub section: Option<SectionRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "STRING")]
    Plain,
    #[serde(rename = "CONCEALED")]
    Concealed,
    #[serde(rename = "OTP")]
    Otp,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Reference from a field to the section it belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl CredentialItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// First field with the given label
    pub fn field(&self, label: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.label == label)
    }

    /// Value of the first field with the given label, ignoring empty values
    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.field(label)
            .and_then(|f| f.value.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// First one-time-password field
    pub fn otp_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.kind == FieldKind::Otp)
    }

    pub fn has_section(&self, label: &str) -> bool {
        self.sections
            .iter()
            .any(|s| s.label.as_deref() == Some(label))
    }

    /// Fields grouped under the section with the given label, in item order
    pub fn fields_in_section<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Field> {
        let section_ids: Vec<&str> = self
            .sections
            .iter()
            .filter(|s| s.label.as_deref() == Some(label))
            .map(|s| s.id.as_str())
            .collect();

        self.fields.iter().filter(move |f| {
            f.section.as_ref().is_some_and(|s| {
                s.label.as_deref() == Some(label)
                    || (!s.id.is_empty() && section_ids.contains(&s.id.as_str()))
            })
        })
    }
}

impl Field {
    /// Current one-time code of an OTP field
    pub fn otp_code(&self) -> Option<&str> {
        self.totp.as_deref().filter(|code| !code.is_empty())
    }
}
