//! Authentication command handlers for the OAuth flow.
//!
//! - `budget auth` - Initial OAuth consent flow
//! - `budget auth --verify` - Verify and refresh authentication

use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::mirror::TokenProvider;
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `budget auth` command: runs the OAuth consent flow and saves the tokens to
/// `token.json`.
///
/// This is the ONLY command that asks the user to open a browser for OAuth authentication.
///
/// # Errors
/// Returns an error if the OAuth flow fails or if client_secret.json is missing
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let token_provider =
        TokenProvider::initialize(&config.client_secret_path(), &config.token_path())
            .await
            .pub_result(ErrorType::Sync)?;
    Ok(format!(
        "Authorization complete, the token is valid until {}",
        token_provider.expires_at()
    )
    .into())
}

/// Handles the `budget auth --verify` command: loads the saved tokens and refreshes them.
///
/// This command NEVER opens a browser. If the token is missing, invalid, or has the wrong scopes,
/// it fails with an error message telling the user to run `budget auth`.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider =
        TokenProvider::load(&config.client_secret_path(), &config.token_path())
            .await
            .context(
                "Unable to use the existing tokens found in the token JSON file. \n\n\
                You should run 'budget auth' (without the --verify flag).",
            )
            .pub_result(ErrorType::Sync)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Sync)?;
    Ok("Your OAuth token is valid!".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_auth_verify_without_token() {
        let env = TestEnv::new().await;
        let err = auth_verify(&env.config()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Sync);
        assert!(err.to_string().contains("budget auth"));
    }
}
