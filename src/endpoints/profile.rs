use super::Envelope;
use crate::{ApiClient, ApiError, UserProfile};
use reqwest::Method;

/// Fetch the profile of whoever the session's token belongs to.
pub async fn get_profile(client: &ApiClient) -> Result<UserProfile, ApiError> {
    let builder = client.request(Method::GET, "auth/profile")?;
    let response: Envelope<UserProfile> = client.execute_json(builder).await?;
    let profile = response.into_inner();

    log::debug!("Fetched the profile for {}", profile.display_name());

    Ok(profile)
}
