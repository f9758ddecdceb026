//! Amazon ECR credentials.
//!
//! ECR has no long-lived registry passwords: AWS access keys are exchanged
//! for a short-lived authorization token, which is an HTTP Basic payload
//! holding the actual `docker login` username and password.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::config::Credentials as AwsCredentials;

use crate::registry::credentials::{
    decode_basic_auth, CredentialError, CredentialObtainer, Credentials,
};
use crate::util::env::HostEnv;

pub const AWS_ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Obtains registry credentials through ECR `GetAuthorizationToken`.
pub struct EcrCredentials<'a> {
    host_env: &'a HostEnv,
    region: String,
}

impl<'a> EcrCredentials<'a> {
    pub fn new(host_env: &'a HostEnv, region: &str) -> Self {
        EcrCredentials {
            host_env,
            region: region.to_string(),
        }
    }

    fn access_keys(&self) -> Result<(&'a str, &'a str), CredentialError> {
        let access_key_id = self
            .host_env
            .get(AWS_ACCESS_KEY_ID_ENV)
            .ok_or(CredentialError::NotSet(AWS_ACCESS_KEY_ID_ENV))?;
        let secret_access_key = self
            .host_env
            .get(AWS_SECRET_ACCESS_KEY_ENV)
            .ok_or(CredentialError::NotSet(AWS_SECRET_ACCESS_KEY_ENV))?;

        Ok((access_key_id, secret_access_key))
    }

    async fn fetch_token(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<String, CredentialError> {
        let credentials = AwsCredentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "dockhand-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(self.region.clone()))
            .load()
            .await;

        let client = aws_sdk_ecr::Client::new(&config);

        let resp = client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| CredentialError::Transport(Box::new(e)))?;

        match resp.authorization_data() {
            [data] => data
                .authorization_token()
                .map(str::to_string)
                .ok_or(CredentialError::InvalidTokenFormat),
            _ => Err(CredentialError::InvalidTokenFormat),
        }
    }
}

impl CredentialObtainer for EcrCredentials<'_> {
    fn obtain(&self) -> Result<Option<Credentials>, CredentialError> {
        let (access_key_id, secret_access_key) = self.access_keys()?;

        tracing::debug!("requesting ECR authorization token in {}", self.region);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CredentialError::Transport(Box::new(e)))?;

        let token = runtime.block_on(self.fetch_token(access_key_id, secret_access_key))?;

        decode_basic_auth(&token)
            .map(Some)
            .ok_or(CredentialError::InvalidTokenFormat)
    }
}
