//! The things a user can do to their session: log in, log out, register and
//! change their password.
//!
//! Each flow validates its form before touching the network, and makes sure
//! the session is left consistent whichever way the server responds.

use crate::{
    endpoints::{AuthApi, PasswordChange, Registration},
    routes::Route,
    validate::{LoginForm, ValidationErrors},
    ApiError, SessionStore, UserProfile,
};

/// A successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedIn {
    pub user: UserProfile,
    /// Where to send the user next.
    pub redirect: Route,
}

/// Log in and load the user's profile.
///
/// The token is stored first so the profile request gets signed with it.
/// If anything after validation fails, the session is logged out so we're
/// never left holding a token without knowing who it belongs to.
pub async fn login<A>(
    api: &A,
    session: &SessionStore,
    form: &LoginForm,
) -> Result<LoggedIn, FlowError>
where
    A: AuthApi + ?Sized,
{
    form.validate()?;

    match try_login(api, session, form).await {
        Ok(user) => {
            log::info!("Logged in as {}", user.display_name());
            Ok(LoggedIn {
                user,
                redirect: Route::LANDING,
            })
        },
        Err(error) => {
            log::error!("Login failed: {}", error);
            session.logout();
            Err(FlowError::Api {
                fallback: "Login failed. Check your details and try again.",
                error,
            })
        },
    }
}

async fn try_login<A>(
    api: &A,
    session: &SessionStore,
    form: &LoginForm,
) -> Result<UserProfile, ApiError>
where
    A: AuthApi + ?Sized,
{
    let token = api.login(&form.phone, &form.password).await?;
    session.on_login(token);

    let user = api.profile().await?;
    session.on_profile_loaded(user.clone());

    Ok(user)
}

/// Forget the current session. Returns where to go next.
pub fn logout(session: &SessionStore) -> Route {
    session.on_logout();
    Route::LOGIN
}

/// Drop a session the server no longer accepts.
///
/// When `error` says our credentials were rejected (401 or 403) the session
/// is logged out and the login page is returned. Anything else leaves the
/// session alone.
pub fn expire_if_rejected(
    session: &SessionStore,
    error: &ApiError,
) -> Option<Route> {
    if !error.is_auth_rejected() {
        return None;
    }

    log::warn!("The server rejected our credentials: {}", error);
    Some(logout(session))
}

/// Create a new account. The session isn't touched; the new user still has
/// to log in.
pub async fn register<A>(
    api: &A,
    registration: &Registration,
) -> Result<Route, FlowError>
where
    A: AuthApi + ?Sized,
{
    registration.validate()?;

    match api.register(registration).await {
        Ok(()) => {
            log::info!("Registered {}", registration.phone);
            Ok(Route::LOGIN)
        },
        Err(error) => {
            log::error!("Registration failed: {}", error);
            Err(FlowError::Api {
                fallback:
                    "Registration failed. Check your details and try again.",
                error,
            })
        },
    }
}

/// Change the current user's password and log them out, so they have to log
/// in again with the new one.
///
/// A rejected change keeps the session as it was.
pub async fn update_password<A>(
    api: &A,
    session: &SessionStore,
    change: &PasswordChange,
) -> Result<Route, FlowError>
where
    A: AuthApi + ?Sized,
{
    change.validate()?;

    match api.update_password(change).await {
        Ok(()) => {
            log::info!("Password updated, logging out");
            Ok(logout(session))
        },
        Err(error) => {
            log::error!("Updating the password failed: {}", error);
            Err(FlowError::Api {
                fallback: "Updating the password failed.",
                error,
            })
        },
    }
}

/// Why a flow failed.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The form was rejected before anything was sent.
    #[error("The form is invalid")]
    Invalid(#[from] ValidationErrors),
    /// The server rejected the request or couldn't be reached.
    #[error("{}", fallback)]
    Api {
        fallback: &'static str,
        #[source]
        error: ApiError,
    },
}

impl FlowError {
    /// The text to show next to the form.
    ///
    /// This prefers whatever the server said, falling back to a generic
    /// message for the flow.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Invalid(errors) => errors.to_string(),
            FlowError::Api { fallback, error } => error
                .server_message()
                .map(String::from)
                .unwrap_or_else(|| String::from(*fallback)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{MemoryStorage, Snapshot, Storage},
        test_server::serve,
        ApiClient,
    };
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    /// An [`AuthApi`] which replays canned answers and remembers what it was
    /// asked.
    #[derive(Default)]
    struct FakeApi {
        session: Option<SessionStore>,
        reject_login: bool,
        empty_token: bool,
        reject_profile: bool,
        reject_changes: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn watching(session: &SessionStore) -> Self {
            FakeApi {
                session: Some(session.clone()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(String::from(call));
        }

        fn rejection(&self) -> ApiError {
            ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                message: self.reject_changes.map(String::from),
            }
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn login(
            &self,
            _phone: &str,
            password: &str,
        ) -> Result<String, ApiError> {
            self.record("login");

            if self.reject_login || password != "secret" {
                Err(ApiError::Unauthorized {
                    message: Some(String::from("Invalid phone or password")),
                })
            } else if self.empty_token {
                Err(ApiError::MissingToken)
            } else {
                Ok(String::from("xyz"))
            }
        }

        async fn profile(&self) -> Result<UserProfile, ApiError> {
            // the token must already be stored so the request is signed
            let token = self.session.as_ref().and_then(|s| s.token());
            self.record(&format!("profile:{}", token.unwrap_or_default()));

            if self.reject_profile {
                Err(ApiError::Unauthorized { message: None })
            } else {
                Ok(UserProfile::new("U1", "Alice"))
            }
        }

        async fn register(&self, _: &Registration) -> Result<(), ApiError> {
            self.record("register");

            match self.reject_changes {
                Some(_) => Err(self.rejection()),
                None => Ok(()),
            }
        }

        async fn update_password(
            &self,
            _: &PasswordChange,
        ) -> Result<(), ApiError> {
            self.record("update_password");

            match self.reject_changes {
                Some(_) => Err(self.rejection()),
                None => Ok(()),
            }
        }
    }

    fn session() -> (SessionStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        (SessionStore::restore(storage.clone()), storage)
    }

    fn logged_in() -> (SessionStore, MemoryStorage) {
        let storage = MemoryStorage::with_snapshot(Snapshot {
            token: Some(String::from("abc")),
            user: Some(UserProfile::new("U1", "Alice")),
        });
        (SessionStore::restore(storage.clone()), storage)
    }

    fn registration() -> Registration {
        Registration {
            name: String::from("Bob"),
            phone: String::from("0813"),
            email: String::from("bob@example.com"),
            address: String::from("Jl. Sudirman 2"),
            password: String::from("secret"),
        }
    }

    #[tokio::test]
    async fn successful_login() {
        let (session, storage) = session();
        let api = FakeApi::watching(&session);

        let got = login(&api, &session, &LoginForm::new("0812", "secret"))
            .await
            .unwrap();

        assert_eq!(got.redirect, Route::Dashboard);
        assert_eq!(got.user, UserProfile::new("U1", "Alice"));
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("xyz"));
        assert_eq!(api.calls(), vec!["login", "profile:xyz"]);
        assert_eq!(storage.load().unwrap().unwrap(), session.snapshot());
    }

    #[tokio::test]
    async fn failed_profile_fetch_logs_out() {
        let (session, storage) = session();
        let api = FakeApi {
            reject_profile: true,
            ..FakeApi::watching(&session)
        };

        let err = login(&api, &session, &LoginForm::new("0812", "secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Api { .. }));
        assert_eq!(session.token(), None);
        assert_eq!(session.user(), None);
        assert!(!session.is_authenticated());
        assert_eq!(storage.load().unwrap(), Some(Snapshot::default()));
    }

    #[tokio::test]
    async fn rejected_login_shows_the_server_message() {
        let (session, _) = session();
        let api = FakeApi::watching(&session);

        let err = login(&api, &session, &LoginForm::new("0812", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid phone or password");
        assert!(!session.has_token());
    }

    #[tokio::test]
    async fn missing_token_uses_the_fallback_message() {
        let (session, _) = session();
        let api = FakeApi {
            empty_token: true,
            ..FakeApi::watching(&session)
        };

        let err = login(&api, &session, &LoginForm::new("0812", "secret"))
            .await
            .unwrap_err();

        assert_eq!(
            err.user_message(),
            "Login failed. Check your details and try again."
        );
        assert_eq!(api.calls(), vec!["login"]);
    }

    #[tokio::test]
    async fn invalid_forms_never_reach_the_server() {
        let (session, _) = logged_in();
        let api = FakeApi::watching(&session);

        let err = login(&api, &session, &LoginForm::new("", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Invalid(_)));
        assert!(api.calls().is_empty());
        // nothing was attempted, so nothing was reset
        assert!(session.is_authenticated());
    }

    #[test]
    fn logout_returns_to_the_login_page() {
        let (session, storage) = logged_in();

        let got = logout(&session);

        assert_eq!(got, Route::Login);
        assert!(!session.is_authenticated());
        assert_eq!(storage.load().unwrap(), Some(Snapshot::default()));
    }

    #[tokio::test]
    async fn registering_leaves_the_session_alone() {
        let (session, storage) = session();
        let api = FakeApi::default();

        let got = register(&api, &registration()).await.unwrap();

        assert_eq!(got, Route::Login);
        assert!(!session.has_token());
        assert_eq!(storage.contents(), None);
    }

    #[tokio::test]
    async fn failed_registration() {
        let api = FakeApi {
            reject_changes: Some("Phone already registered"),
            ..Default::default()
        };

        let err = register(&api, &registration()).await.unwrap_err();

        assert_eq!(err.user_message(), "Phone already registered");
    }

    #[tokio::test]
    async fn changing_the_password_logs_out() {
        let (session, _) = logged_in();
        let api = FakeApi::default();
        let change = PasswordChange::new("secret", "new-secret", "new-secret");

        let got = update_password(&api, &session, &change).await.unwrap();

        assert_eq!(got, Route::Login);
        assert!(!session.has_token());
    }

    #[tokio::test]
    async fn rejected_password_change_keeps_the_session() {
        let (session, _) = logged_in();
        let api = FakeApi {
            reject_changes: Some("currentPassword: is wrong"),
            ..Default::default()
        };
        let change = PasswordChange::new("nope", "new-secret", "new-secret");

        let err = update_password(&api, &session, &change).await.unwrap_err();

        assert_eq!(err.user_message(), "currentPassword: is wrong");
        assert!(session.is_authenticated());
    }

    #[test]
    fn rejected_credentials_expire_the_session() {
        let rejections = vec![
            ApiError::Unauthorized { message: None },
            ApiError::Status {
                status: StatusCode::FORBIDDEN,
                message: None,
            },
        ];

        for error in rejections {
            let (session, storage) = logged_in();

            let got = expire_if_rejected(&session, &error);

            assert_eq!(got, Some(Route::LOGIN), "{:?}", error);
            assert!(!session.has_token());
            assert_eq!(storage.load().unwrap(), Some(Snapshot::default()));
        }
    }

    #[test]
    fn other_failures_keep_the_session() {
        let (session, _) = logged_in();
        let error = ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some(String::from("Boom")),
        };

        assert_eq!(expire_if_rejected(&session, &error), None);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn logging_in_against_a_real_server() {
        let (url, server) = serve(vec![
            (200, r#"{"accessToken": "fresh"}"#),
            (200, r#"{"data": {"code": "U1", "name": "Alice"}}"#),
        ])
        .await;
        let (session, storage) = session();
        let client = ApiClient::new(&url, session.clone()).unwrap();

        let got = login(&client, &session, &LoginForm::new("0812", "secret"))
            .await
            .unwrap();

        assert_eq!(got.user, UserProfile::new("U1", "Alice"));
        assert!(session.is_authenticated());
        assert_eq!(storage.load().unwrap().unwrap(), session.snapshot());

        let seen = server.await.unwrap();
        assert_eq!(seen[0].target, "/api/v1/auth/login");
        assert_eq!(
            seen[0].json(),
            json!({"phone": "0812", "password": "secret"})
        );
        assert_eq!(seen[1].target, "/api/v1/auth/profile");
        assert_eq!(seen[1].header("authorization"), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn a_rejected_profile_on_a_real_server_logs_out() {
        let (url, server) = serve(vec![
            (200, r#"{"accessToken": "fresh"}"#),
            (401, r#"{"message": "Token revoked"}"#),
        ])
        .await;
        let (session, storage) = session();
        let client = ApiClient::new(&url, session.clone()).unwrap();

        let err = login(&client, &session, &LoginForm::new("0812", "secret"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Token revoked");
        assert!(!session.has_token());
        assert_eq!(storage.load().unwrap(), Some(Snapshot::default()));
        server.await.unwrap();
    }
}
