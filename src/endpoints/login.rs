use super::Envelope;
use crate::{ApiClient, ApiError};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};

/// Exchange a phone number and password for a new access token.
///
/// This only talks to the server. Storing the token and fetching the user's
/// profile is the caller's job (see [`crate::flows::login()`]).
pub async fn login(
    client: &ApiClient,
    phone: &str,
    password: &str,
) -> Result<String, ApiError> {
    let data = Data { phone, password };
    log::debug!("Logging in as {}", phone);
    log::trace!("Payload: {:#?}", data);

    let builder = client.request(Method::POST, "auth/login")?.json(&data);
    let response: Envelope<LoginResponse> =
        client.execute_json(builder).await?;

    interpret_response(response.into_inner())
}

fn interpret_response(response: LoginResponse) -> Result<String, ApiError> {
    match response.access_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => {
            log::error!("The login response didn't contain an access token");
            Err(ApiError::MissingToken)
        },
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

#[derive(Copy, Clone, Serialize)]
struct Data<'a> {
    phone: &'a str,
    password: &'a str,
}

impl Debug for Data<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .finish()
    }
}
