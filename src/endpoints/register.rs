use crate::{ApiClient, ApiError};
use reqwest::Method;
use serde_derive::Serialize;
use std::fmt::{self, Debug, Formatter};

/// Everything needed to create a new account.
#[derive(Clone, PartialEq, Serialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub password: String,
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Create a new account. The new user still has to log in afterwards.
pub async fn register(
    client: &ApiClient,
    registration: &Registration,
) -> Result<(), ApiError> {
    log::debug!("Registering {}", registration.phone);
    log::trace!("Payload: {:#?}", registration);

    client
        .send_and_discard(Method::POST, "auth/register", registration)
        .await
}
