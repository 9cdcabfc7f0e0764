use crate::SessionStore;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Client, Method, Request, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use url::Url;

/// A HTTP client for the dashboard's REST API which signs every request with
/// the session's current token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SessionStore,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url` (e.g.
    /// `https://example.com/api/v1`).
    pub fn new(
        base_url: &str,
        session: SessionStore,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(crate::DEFAULT_USER_AGENT)
            .build()?;

        ApiClient::with_client(http, base_url, session)
    }

    /// Use an existing [`reqwest::Client`].
    pub fn with_client(
        http: Client,
        base_url: &str,
        session: SessionStore,
    ) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;

        // make sure joining "auth/login" appends instead of replacing the
        // last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(ApiClient {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionStore { &self.session }

    pub fn base_url(&self) -> &Url { &self.base_url }

    /// Resolve an endpoint path relative to the base URL.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ApiError::from)
    }

    /// Start building a request. Nothing is signed until the request is
    /// dispatched.
    pub fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.url(path)?;
        Ok(self.http.request(method, url))
    }

    /// Finish building a request and sign it with whatever token the
    /// session holds *right now*.
    pub fn prepare(
        &self,
        builder: RequestBuilder,
    ) -> Result<Request, ApiError> {
        let mut request = builder.build()?;
        authorize(&self.session, &mut request);
        Ok(request)
    }

    /// Sign and send a request, turning error statuses into an [`ApiError`].
    pub async fn execute(
        &self,
        builder: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let request = self.prepare(builder)?;

        log::debug!(
            "Sending a {} request to {}",
            request.method(),
            request.url()
        );
        let response = self.http.execute(request).await?;
        log::trace!("Headers: {:#?}", response.headers());

        check_status(response).await
    }

    /// Send a request and parse the JSON response.
    pub async fn execute_json<T>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(builder).await?;
        let body = response.text().await?;
        log::trace!("Response: {}", body);

        serde_json::from_str(&body).map_err(ApiError::from)
    }

    /// `GET` some JSON, passing `query` as URL parameters.
    pub async fn get<Q, T>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        Q: Debug + Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::trace!("Query: {:#?}", query);
        let builder = self.request(Method::GET, path)?.query(query);
        self.execute_json(builder).await
    }

    /// `POST` a JSON body.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Debug + Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    /// `PUT` a JSON body.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Debug + Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    /// Send a JSON body and ignore whatever comes back.
    pub(crate) async fn send_and_discard<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let builder = self.request(method, path)?.json(body);
        self.execute(builder).await?;
        Ok(())
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Debug + Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::trace!("Payload: {:#?}", body);
        let builder = self.request(method, path)?.json(body);
        self.execute_json(builder).await
    }
}

/// Stamp `request` with the session's current token, if there is one.
///
/// The token is read when this is called, not when the request was built, so
/// a request always carries the latest credentials. Without a token the
/// request is left alone and it's up to the server to reject it.
pub fn authorize(session: &SessionStore, request: &mut Request) {
    let token = match session.token() {
        Some(token) => token,
        None => return,
    };

    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        },
        Err(_) => {
            log::warn!(
                "The session token isn't a valid header, sending the \
                 request without it"
            );
        },
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    log::trace!("Error response ({}): {}", status, body);
    let message = extract_message(&body);

    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized { message })
    } else {
        Err(ApiError::Status { status, message })
    }
}

/// Dig the human readable message out of an error response.
///
/// Field validation errors win, then `responseMessage`, then `message`.
pub fn extract_message(body: &str) -> Option<String> {
    let body: Value = serde_json::from_str(body).ok()?;

    if let Some(errors) = body.get("errors").and_then(Value::as_object) {
        let lines: Vec<String> = errors
            .iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    Value::Array(items) => items
                        .iter()
                        .map(value_as_text)
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => value_as_text(other),
                };
                format!("{}: {}", field, messages)
            })
            .collect();

        if !lines.is_empty() {
            return Some(lines.join("\n"));
        }
    }

    ["responseMessage", "message"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|msg| !msg.trim().is_empty())
        .map(String::from)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Errors that may be returned while talking to the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client encountered an error.
    #[error("Unable to send the request")]
    HttpClient(#[from] reqwest::Error),
    #[error("Invalid URL")]
    BadUrl(#[from] url::ParseError),
    /// The server didn't accept our credentials.
    #[error("The server rejected our credentials")]
    Unauthorized { message: Option<String> },
    #[error("The server responded with {}", status)]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    /// Logging in succeeded but no token came back.
    #[error("Token not found in the login response")]
    MissingToken,
    /// Unable to parse the response.
    #[error("Unable to parse the response")]
    ResponseParse(#[from] serde_json::Error),
}

impl ApiError {
    /// The message the server gave for rejecting a request, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Was this caused by missing or bad credentials?
    pub fn is_auth_rejected(&self) -> bool {
        match self {
            ApiError::Unauthorized { .. } => true,
            ApiError::Status { status, .. } => *status == StatusCode::FORBIDDEN,
            _ => false,
        }
    }
}
