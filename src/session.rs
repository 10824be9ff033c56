use aws_smithy_types::date_time::Format;
use tracing::{debug, info};

use crate::{
    aws::{CallerIdentity, Credentials, IamRole, KeyPair, SecurityTokenService, sts::MfaToken},
    constants::vars,
    credentials::ExtractedCredentials,
    error::{Error, Result},
    onepassword::CredentialItem,
};

/// Ordered environment variables to export.
///
/// Setting an existing key replaces its value in place; new keys are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnvironment {
    vars: Vec<(String, String)>,
}

impl SessionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.vars.push((key.to_string(), value)),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Replace the active key triple with temporary credentials
    fn with_temporary(self, creds: &Credentials) -> Self {
        let expiration = creds
            .expiration
            .fmt(Format::DateTime)
            .unwrap_or_else(|_| "unknown".to_string());

        self.with(vars::ACCESS_KEY_ID, &creds.access_key_id)
            .with(vars::SECRET_ACCESS_KEY, &creds.secret_access_key)
            .with(vars::SESSION_TOKEN, &creds.session_token)
            .with(vars::SESSION_EXPIRATION, expiration)
    }
}

/// Environment holding the item's own credentials and identity
pub fn seed(
    item: &CredentialItem,
    creds: &ExtractedCredentials,
    identity: &CallerIdentity,
) -> SessionEnvironment {
    let mut env = SessionEnvironment::new()
        .with(vars::OP_ID, &item.id)
        .with(vars::ACCESS_KEY_ID, &creds.access_key_id)
        .with(vars::SECRET_ACCESS_KEY, &creds.secret_access_key)
        .with(vars::ACCOUNT_ID, &identity.account_id);

    if let Some(serial) = &creds.mfa_serial {
        env.set(vars::MFA_DEVICE_ARN, serial);
    }

    env.with(vars::VAULT, &item.title)
}

/// Derive the credentials to export for a selected item.
///
/// Role assumption and MFA session minting are mutually exclusive: with a
/// role selected, the MFA serial and code go to AssumeRole and the resulting
/// role credentials are exported as-is. GetSessionToken only runs without a
/// role, since STS rejects it when called with temporary credentials.
pub async fn derive(
    sts: &dyn SecurityTokenService,
    item: &CredentialItem,
    creds: &ExtractedCredentials,
    identity: &CallerIdentity,
) -> Result<SessionEnvironment> {
    let env = seed(item, creds, identity);
    let keys = creds.key_pair();
    let mfa = creds.mfa().map(|(serial_number, token_code)| MfaToken {
        serial_number,
        token_code,
    });

    let role = creds.selected_role.as_ref().filter(|_| creds.has_roles);

    if let Some(role) = role {
        let env = assume_role(sts, env, &keys, identity, role, mfa).await?;
        if mfa.is_some() {
            debug!("Skipping GetSessionToken, MFA was presented to AssumeRole");
        }
        return Ok(env);
    }

    match mfa {
        Some(mfa) => session_token(sts, env, &keys, mfa).await,
        None => {
            debug!("No role selected and MFA disabled, exporting item credentials");
            Ok(env)
        }
    }
}

async fn assume_role(
    sts: &dyn SecurityTokenService,
    env: SessionEnvironment,
    keys: &KeyPair,
    identity: &CallerIdentity,
    role: &IamRole,
    mfa: Option<MfaToken<'_>>,
) -> Result<SessionEnvironment> {
    let session_name = identity.session_name(&role.label);
    info!("Assuming role {} as {}", role.label, session_name);

    let creds = sts
        .assume_role(keys, &role.role_arn, &session_name, mfa)
        .await
        .map_err(|e| Error::RoleAssumptionFailed {
            role_arn: role.role_arn.clone(),
            reason: format!("{e:#}"),
        })?;

    Ok(env.with_temporary(&creds))
}

async fn session_token(
    sts: &dyn SecurityTokenService,
    env: SessionEnvironment,
    keys: &KeyPair,
    mfa: MfaToken<'_>,
) -> Result<SessionEnvironment> {
    info!("Requesting MFA session token");

    let creds = sts
        .get_session_token(keys, mfa)
        .await
        .map_err(|e| Error::SessionTokenFailed(format!("{e:#}")))?;

    Ok(env.with_temporary(&creds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use aws_smithy_types::DateTime;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        AssumeRole {
            signed_with: String,
            role_arn: String,
            session_name: String,
            serial: Option<String>,
            code: Option<String>,
        },
        SessionToken {
            signed_with: String,
            serial: String,
            code: String,
        },
    }

    #[derive(Default)]
    struct RecordingSts {
        calls: Mutex<Vec<Call>>,
        fail_assume_role: bool,
        fail_session_token: bool,
    }

    impl RecordingSts {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn temporary(prefix: &str) -> Credentials {
        Credentials {
            access_key_id: format!("ASIA{prefix}"),
            secret_access_key: format!("{prefix}-secret"),
            session_token: format!("{prefix}-token"),
            expiration: DateTime::from_secs(1_700_000_000),
        }
    }

    #[async_trait]
    impl SecurityTokenService for RecordingSts {
        async fn get_caller_identity(&self, _keys: &KeyPair) -> anyhow::Result<CallerIdentity> {
            bail!("not used")
        }

        async fn assume_role(
            &self,
            keys: &KeyPair,
            role_arn: &str,
            session_name: &str,
            mfa: Option<MfaToken<'_>>,
        ) -> anyhow::Result<Credentials> {
            self.calls.lock().unwrap().push(Call::AssumeRole {
                signed_with: keys.access_key_id.clone(),
                role_arn: role_arn.to_string(),
                session_name: session_name.to_string(),
                serial: mfa.map(|m| m.serial_number.to_string()),
                code: mfa.map(|m| m.token_code.to_string()),
            });
            if self.fail_assume_role {
                bail!("AccessDenied");
            }
            Ok(temporary("ROLE"))
        }

        async fn get_session_token(
            &self,
            keys: &KeyPair,
            mfa: MfaToken<'_>,
        ) -> anyhow::Result<Credentials> {
            self.calls.lock().unwrap().push(Call::SessionToken {
                signed_with: keys.access_key_id.clone(),
                serial: mfa.serial_number.to_string(),
                code: mfa.token_code.to_string(),
            });
            if self.fail_session_token {
                bail!("MultiFactorAuthentication failed");
            }
            Ok(temporary("MFA"))
        }
    }

    fn identity() -> CallerIdentity {
        CallerIdentity {
            account_id: "123".to_string(),
            arn: "arn:aws:iam::123:user/alice".to_string(),
        }
    }

    fn item(id: &str, extra_fields: Vec<Value>, sections: Value) -> CredentialItem {
        let mut fields = vec![
            json!({"label": "aws_access_key_id", "type": "STRING", "value": "AKIABASE"}),
            json!({"label": "aws_secret_access_key", "type": "CONCEALED", "value": "BASESECRET"}),
        ];
        fields.extend(extra_fields);
        serde_json::from_value(json!({
            "id": id,
            "title": "Acme Prod",
            "fields": fields,
            "sections": sections,
        }))
        .unwrap()
    }

    fn mfa_fields() -> Vec<Value> {
        vec![
            json!({"label": "mfa_serial", "type": "STRING", "value": "arn:aws:iam::123:mfa/user"}),
            json!({"label": "one-time password", "type": "OTP", "totp": "246810"}),
        ]
    }

    fn admin_role_field() -> Value {
        json!({"label": "Admin", "value": "arn:aws:iam::123:role/Admin",
               "section": {"id": "roles", "label": "Roles"}})
    }

    fn select(creds: &mut ExtractedCredentials, label: &str) {
        let role = creds.roles.as_ref().unwrap().find(label).unwrap();
        creds.select_role(Some(role));
    }

    #[test]
    fn test_environment_overwrite_keeps_position() {
        let mut env = SessionEnvironment::new().with("A", "1").with("B", "2");
        env.set("A", "3");
        env.set("C", "4");

        assert_eq!(env.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(env.get("A"), Some("3"));
        assert_eq!(env.len(), 3);
    }

    #[tokio::test]
    async fn test_no_role_no_mfa_exports_base_credentials() {
        let item = item("item1", vec![], json!([]));
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert!(sts.calls().is_empty());
        assert_eq!(
            env.keys().collect::<Vec<_>>(),
            vec![
                "AWS_OP_ID",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "AWS_ACCOUNT_ID",
                "AWS_VAULT"
            ]
        );
        assert_eq!(env.get("AWS_OP_ID"), Some("item1"));
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("AKIABASE"));
        assert_eq!(env.get("AWS_ACCOUNT_ID"), Some("123"));
        assert_eq!(env.get("AWS_VAULT"), Some("Acme Prod"));
        assert_eq!(env.get("AWS_SESSION_TOKEN"), None);
    }

    #[tokio::test]
    async fn test_mfa_serial_without_otp_is_exported_without_session() {
        let item = item(
            "item1",
            vec![json!({"label": "mfa_serial", "value": "arn:aws:iam::123:mfa/user"})],
            json!([]),
        );
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert!(sts.calls().is_empty());
        assert_eq!(env.get("AWS_MFA_DEVICE_ARN"), Some("arn:aws:iam::123:mfa/user"));
        assert_eq!(env.get("AWS_SESSION_TOKEN"), None);
        assert_eq!(env.len(), 6);
    }

    #[tokio::test]
    async fn test_mfa_session_token_replaces_base_keys() {
        let item = item("item2", mfa_fields(), json!([]));
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert_eq!(
            sts.calls(),
            vec![Call::SessionToken {
                signed_with: "AKIABASE".to_string(),
                serial: "arn:aws:iam::123:mfa/user".to_string(),
                code: "246810".to_string(),
            }]
        );
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("ASIAMFA"));
        assert_eq!(env.get("AWS_SECRET_ACCESS_KEY"), Some("MFA-secret"));
        assert_eq!(env.get("AWS_SESSION_TOKEN"), Some("MFA-token"));
        assert_eq!(
            env.get("AWS_SESSION_EXPIRATION"),
            Some("2023-11-14T22:13:20Z")
        );
    }

    #[tokio::test]
    async fn test_role_selection_assumes_role() {
        let item = item(
            "item3",
            vec![admin_role_field()],
            json!([{"id": "roles", "label": "Roles"}]),
        );
        let mut creds = ExtractedCredentials::extract(&item).unwrap();
        select(&mut creds, "Admin");
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert_eq!(
            sts.calls(),
            vec![Call::AssumeRole {
                signed_with: "AKIABASE".to_string(),
                role_arn: "arn:aws:iam::123:role/Admin".to_string(),
                session_name: "alice-Admin".to_string(),
                serial: None,
                code: None,
            }]
        );
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("ASIAROLE"));
        assert_eq!(env.get("AWS_SECRET_ACCESS_KEY"), Some("ROLE-secret"));
        assert_eq!(env.get("AWS_SESSION_TOKEN"), Some("ROLE-token"));
        assert_eq!(env.get("AWS_ACCOUNT_ID"), Some("123"));
    }

    #[tokio::test]
    async fn test_role_with_mfa_presents_code_once_and_skips_session_token() {
        let mut fields = mfa_fields();
        fields.push(admin_role_field());
        let item = item("item3", fields, json!([{"id": "roles", "label": "Roles"}]));
        let mut creds = ExtractedCredentials::extract(&item).unwrap();
        select(&mut creds, "Admin");
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert_eq!(
            sts.calls(),
            vec![Call::AssumeRole {
                signed_with: "AKIABASE".to_string(),
                role_arn: "arn:aws:iam::123:role/Admin".to_string(),
                session_name: "alice-Admin".to_string(),
                serial: Some("arn:aws:iam::123:mfa/user".to_string()),
                code: Some("246810".to_string()),
            }]
        );
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("ASIAROLE"));
    }

    #[tokio::test]
    async fn test_no_role_selected_with_mfa_uses_session_token() {
        let mut fields = mfa_fields();
        fields.push(admin_role_field());
        let item = item("item3", fields, json!([{"id": "roles", "label": "Roles"}]));
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert!(matches!(sts.calls().as_slice(), [Call::SessionToken { .. }]));
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("ASIAMFA"));
    }

    #[tokio::test]
    async fn test_selected_role_ignored_without_roles_section() {
        let item = item("item1", vec![], json!([]));
        let mut creds = ExtractedCredentials::extract(&item).unwrap();
        creds.select_role(Some(IamRole {
            label: "Admin".to_string(),
            role_arn: "arn:aws:iam::123:role/Admin".to_string(),
        }));
        let sts = RecordingSts::default();

        let env = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert!(sts.calls().is_empty());
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("AKIABASE"));
    }

    #[tokio::test]
    async fn test_role_failure_is_fatal() {
        let mut fields = mfa_fields();
        fields.push(admin_role_field());
        let item = item("item3", fields, json!([{"id": "roles", "label": "Roles"}]));
        let mut creds = ExtractedCredentials::extract(&item).unwrap();
        select(&mut creds, "Admin");
        let sts = RecordingSts {
            fail_assume_role: true,
            ..Default::default()
        };

        let err = derive(&sts, &item, &creds, &identity()).await.unwrap_err();

        assert!(matches!(err, Error::RoleAssumptionFailed { ref reason, .. } if reason.contains("AccessDenied")));
        assert_eq!(sts.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_session_token_failure_is_fatal() {
        let item = item("item2", mfa_fields(), json!([]));
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts {
            fail_session_token: true,
            ..Default::default()
        };

        let err = derive(&sts, &item, &creds, &identity()).await.unwrap_err();
        assert!(matches!(err, Error::SessionTokenFailed(_)));
    }

    #[tokio::test]
    async fn test_same_inputs_produce_same_keys() {
        let item = item("item2", mfa_fields(), json!([]));
        let creds = ExtractedCredentials::extract(&item).unwrap();
        let sts = RecordingSts::default();

        let first = derive(&sts, &item, &creds, &identity()).await.unwrap();
        let second = derive(&sts, &item, &creds, &identity()).await.unwrap();

        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            second.keys().collect::<Vec<_>>()
        );
    }
}
