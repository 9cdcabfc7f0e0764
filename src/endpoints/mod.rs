//! The dashboard API's authentication endpoints.

mod login;
mod password;
mod profile;
mod register;

pub use login::login;
pub use password::{update_password, PasswordChange};
pub use profile::get_profile;
pub use register::{register, Registration};

use crate::{ApiClient, ApiError, UserProfile};
use async_trait::async_trait;
use serde_derive::Deserialize;

/// The authentication endpoints, as used by the login, registration and
/// password flows.
///
/// [`ApiClient`] is the real implementation. Anything else is probably a
/// test double.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange a phone number and password for an access token.
    async fn login(&self, phone: &str, password: &str)
        -> Result<String, ApiError>;

    /// Fetch the profile belonging to the current token.
    async fn profile(&self) -> Result<UserProfile, ApiError>;

    async fn register(&self, registration: &Registration)
        -> Result<(), ApiError>;

    async fn update_password(
        &self,
        change: &PasswordChange,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(
        &self,
        phone: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        login(self, phone, password).await
    }

    async fn profile(&self) -> Result<UserProfile, ApiError> {
        get_profile(self).await
    }

    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<(), ApiError> {
        register(self, registration).await
    }

    async fn update_password(
        &self,
        change: &PasswordChange,
    ) -> Result<(), ApiError> {
        update_password(self, change).await
    }
}

/// Some endpoints wrap their payload in `{"data": ...}`, others don't.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}
