//! Credential acquisition, kept to the shape of a provider callback.
//! The core re-fetches credentials on every
//! signing request rather than caching them, so callers can rotate keys
//! without reopening a session.

use crate::error::Result;

/// A resolved set of AWS-style credentials, plus the region they apply to.
///
/// Not cached anywhere inside the crate: a fresh [`Credentials`] is
/// requested from the [`CredentialsProvider`] immediately before every
/// signed request.
#[derive(Clone)]
pub struct Credentials {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// External collaborator: resolves credentials on demand.
///
/// Implementations must be cheap to call repeatedly — the signer invokes
/// this once per HEAD and once per range GET.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

impl<F> CredentialsProvider for F
where
    F: Fn() -> Result<Credentials> + Send + Sync,
{
    fn credentials(&self) -> Result<Credentials> {
        self()
    }
}

/// Default provider: reads the same environment variables the AWS CLI
/// and most SDKs honor. Re-reads the environment on every call so a
/// long-lived process observes external credential rotation.
pub struct EnvCredentialsProvider {
    default_region: String,
}

impl EnvCredentialsProvider {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
        }
    }
}

impl Default for EnvCredentialsProvider {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl CredentialsProvider for EnvCredentialsProvider {
    fn credentials(&self) -> Result<Credentials> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| crate::error::Error::Transport("AWS_ACCESS_KEY_ID not set".into()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            crate::error::Error::Transport("AWS_SECRET_ACCESS_KEY not set".into())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| self.default_region.clone());

        Ok(Credentials {
            region,
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// A fixed set of credentials, for tests and non-rotating deployments.
pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            credentials: Credentials {
                region: region.into(),
                access_key_id: access_key_id.into(),
                secret_access_key: secret_access_key.into(),
                session_token,
            },
        }
    }
}

impl CredentialsProvider for StaticCredentialsProvider {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}
