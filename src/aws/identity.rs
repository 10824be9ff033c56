use tracing::info;

use super::{CallerIdentity, KeyPair, SecurityTokenService};
use crate::error::{Error, Result};

/// Longest role session name STS accepts
const MAX_SESSION_NAME_LEN: usize = 64;

/// Verify the base key pair and resolve the caller's account and ARN
pub async fn probe(sts: &dyn SecurityTokenService, keys: &KeyPair) -> Result<CallerIdentity> {
    let identity = sts
        .get_caller_identity(keys)
        .await
        .map_err(|e| Error::IdentityProbeFailed(format!("{e:#}")))?;

    if identity.account_id.is_empty() || identity.arn.is_empty() {
        return Err(Error::IdentityProbeFailed(
            "AWS STS returned an incomplete caller identity".to_string(),
        ));
    }

    info!(
        "Authenticated as {} in account {}",
        identity.arn, identity.account_id
    );
    Ok(identity)
}

impl CallerIdentity {
    /// Caller name taken from the ARN resource path
    /// (`arn:aws:iam::123456789012:user/alice` -> `alice`)
    pub fn caller_name(&self) -> Option<&str> {
        self.arn.split('/').nth(1).filter(|s| !s.is_empty())
    }

    /// Role session name `<caller name>-<role label>`.
    /// Falls back to the account id for ARNs without a path (e.g. root).
    pub fn session_name(&self, role_label: &str) -> String {
        let caller = self.caller_name().unwrap_or(&self.account_id);
        format!("{caller}-{role_label}")
            .chars()
            .map(|c| match c {
                c if c.is_ascii_alphanumeric() => c,
                '+' | '=' | ',' | '.' | '@' | '-' | '_' => c,
                _ => '_',
            })
            .take(MAX_SESSION_NAME_LEN)
            .collect()
    }
}
