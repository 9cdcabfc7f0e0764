use crate::{ApiClient, ApiError};
use reqwest::Method;
use serde_derive::Serialize;
use std::fmt::{self, Debug, Formatter};

/// A request to replace the current user's password.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirmation: String,
}

impl Debug for PasswordChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish()
    }
}

/// Change the password of whoever the session's token belongs to.
///
/// The server invalidates the token afterwards, so callers should log out.
pub async fn update_password(
    client: &ApiClient,
    change: &PasswordChange,
) -> Result<(), ApiError> {
    log::debug!("Updating the current user's password");

    client
        .send_and_discard(Method::PUT, "auth/password", change)
        .await
}
