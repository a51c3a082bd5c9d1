//! Sign-in against the storefront's development session endpoint.

use serde_json::json;
use tracing::info;

use grocer_cart::{CartConfig, HttpCartApi};
use grocer_core::UserId;

use super::CliError;

/// Sign in as `user` and return an API client carrying the session cookie.
///
/// # Errors
///
/// Returns `CliError::SignIn` if the storefront is unreachable or refuses
/// the sign-in (for example when development sign-in is disabled).
pub async fn sign_in(config: &CartConfig, user: UserId) -> Result<HttpCartApi, CliError> {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .map_err(|e| CliError::SignIn(e.to_string()))?;

    let url = config
        .api_url
        .join("dev/session")
        .map_err(|e| CliError::SignIn(e.to_string()))?;

    let response = client
        .post(url)
        .json(&json!({ "userId": user }))
        .send()
        .await
        .map_err(|e| CliError::SignIn(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CliError::SignIn(format!(
            "storefront answered {}",
            response.status()
        )));
    }

    info!(%user, "Signed in");
    Ok(HttpCartApi::with_client(client, config.api_url.clone()))
}
