//! Backend credential resolution
//!
//! The API key comes from the configured environment variable, or failing
//! that from AWS Secrets Manager. Resolution happens once at startup; a
//! missing key is fatal.

use tracing::info;

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Resolve the text-backend API key from the process environment or the
/// secret store
///
/// # Errors
///
/// Returns [`Error::Secret`] if no source yields a non-empty key.
pub async fn resolve_api_key(config: &LlmConfig) -> Result<String> {
    resolve_api_key_with(config, |name| std::env::var(name).ok()).await
}

/// Like [`resolve_api_key`] with an injectable environment lookup
///
/// # Errors
///
/// Returns [`Error::Secret`] if no source yields a non-empty key.
pub async fn resolve_api_key_with<F>(config: &LlmConfig, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(&config.api_key_env).filter(|k| !k.trim().is_empty()) {
        info!(source = %config.api_key_env, "API key resolved from environment");
        return Ok(key);
    }

    let key = fetch_from_secret_store(config).await?;
    info!(secret_id = %config.secret_id, region = %config.secret_region, "API key resolved from Secrets Manager");
    Ok(key)
}

#[cfg(feature = "aws-secrets")]
async fn fetch_from_secret_store(config: &LlmConfig) -> Result<String> {
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_secretsmanager::error::DisplayErrorContext;

    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.secret_region.clone()))
        .load()
        .await;
    let client = aws_sdk_secretsmanager::Client::new(&shared);

    let output = client
        .get_secret_value()
        .secret_id(&config.secret_id)
        .send()
        .await
        .map_err(|e| {
            Error::Secret(format!(
                "{} is not set and secret '{}' could not be read: {}",
                config.api_key_env,
                config.secret_id,
                DisplayErrorContext(&e)
            ))
        })?;

    output
        .secret_string()
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            Error::Secret(format!(
                "secret '{}' has no string value",
                config.secret_id
            ))
        })
}

#[cfg(not(feature = "aws-secrets"))]
async fn fetch_from_secret_store(config: &LlmConfig) -> Result<String> {
    Err(Error::Secret(format!(
        "{} is not set and Secrets Manager support is not compiled in",
        config.api_key_env
    )))
}
