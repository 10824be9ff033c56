use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::{Client as StsClient, config::Credentials as StaticCredentials};
use tracing::{debug, info};

use super::{CallerIdentity, Credentials, KeyPair};
use crate::constants::{DEFAULT_AWS_REGION, PROVIDER_NAME};

/// MFA device serial and the one-time code to present with it
#[derive(Debug, Clone, Copy)]
pub struct MfaToken<'a> {
    pub serial_number: &'a str,
    pub token_code: &'a str,
}

/// The STS operations the credential pipeline needs.
///
/// Every call takes the key pair to sign with explicitly; ambient AWS
/// credentials are never used.
#[async_trait]
pub trait SecurityTokenService: Send + Sync {
    async fn get_caller_identity(&self, keys: &KeyPair) -> Result<CallerIdentity>;

    async fn assume_role(
        &self,
        keys: &KeyPair,
        role_arn: &str,
        session_name: &str,
        mfa: Option<MfaToken<'_>>,
    ) -> Result<Credentials>;

    async fn get_session_token(&self, keys: &KeyPair, mfa: MfaToken<'_>) -> Result<Credentials>;
}

/// [`SecurityTokenService`] backed by the AWS SDK
#[derive(Debug, Clone, Default)]
pub struct StsService {
    region: Option<String>,
}

impl StsService {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }

    async fn client(&self, keys: &KeyPair) -> StsClient {
        StsClient::new(&self.load_config(keys).await)
    }

    // Priority: configured region -> ENV vars -> Config file -> DEFAULT_AWS_REGION
    async fn load_config(&self, keys: &KeyPair) -> SdkConfig {
        let loader = || {
            aws_config::defaults(BehaviorVersion::latest()).credentials_provider(
                StaticCredentials::new(
                    &keys.access_key_id,
                    &keys.secret_access_key,
                    None,
                    None,
                    PROVIDER_NAME,
                ),
            )
        };

        if let Some(region) = &self.region {
            return loader().region(Region::new(region.clone())).load().await;
        }

        let loaded = loader().load().await;
        match loaded.region() {
            Some(region) => {
                debug!("Using region: {}", region);
                loaded
            }
            None => {
                debug!(
                    "No region configured, using default {} for STS",
                    DEFAULT_AWS_REGION
                );
                loader()
                    .region(Region::new(DEFAULT_AWS_REGION))
                    .load()
                    .await
            }
        }
    }
}

#[async_trait]
impl SecurityTokenService for StsService {
    async fn get_caller_identity(&self, keys: &KeyPair) -> Result<CallerIdentity> {
        info!("Calling AWS STS GetCallerIdentity");

        let response = self
            .client(keys)
            .await
            .get_caller_identity()
            .send()
            .await
            .context("GetCallerIdentity request failed")?;

        Ok(CallerIdentity {
            account_id: response
                .account()
                .context("AWS STS returned no account id")?
                .to_string(),
            arn: response
                .arn()
                .context("AWS STS returned no caller ARN")?
                .to_string(),
        })
    }

    async fn assume_role(
        &self,
        keys: &KeyPair,
        role_arn: &str,
        session_name: &str,
        mfa: Option<MfaToken<'_>>,
    ) -> Result<Credentials> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", role_arn);
        debug!("Session name: {}", session_name);

        let response = self
            .client(keys)
            .await
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .set_serial_number(mfa.map(|m| m.serial_number.to_string()))
            .set_token_code(mfa.map(|m| m.token_code.to_string()))
            .send()
            .await
            .context("AssumeRole request failed")?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        Ok(Credentials {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration: *sts_creds.expiration(),
        })
    }

    async fn get_session_token(&self, keys: &KeyPair, mfa: MfaToken<'_>) -> Result<Credentials> {
        info!("Calling AWS STS GetSessionToken");
        debug!("MFA device: {}", mfa.serial_number);

        let response = self
            .client(keys)
            .await
            .get_session_token()
            .serial_number(mfa.serial_number)
            .token_code(mfa.token_code)
            .send()
            .await
            .context("GetSessionToken request failed")?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        Ok(Credentials {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration: *sts_creds.expiration(),
        })
    }
}
