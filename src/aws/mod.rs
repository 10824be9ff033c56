use aws_smithy_types::DateTime;

pub mod identity;
pub mod roles;
pub mod sts;

/// Long-term access key pair stored in the credential item
#[derive(Clone)]
pub struct KeyPair {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// AWS temporary credentials structure
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

/// Caller identity reported by STS for the base key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
}

pub use identity::probe;
pub use roles::{AvailableRoles, IamRole, NO_ROLE_CHOICE};
pub use sts::{SecurityTokenService, StsService};
