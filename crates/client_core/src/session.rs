//! Authenticated identity, its persisted mirror, and the login/register calls.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use shared::{
    domain::{Session, User},
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, RegisterRequest, USER_LOGIN_PATH, USER_REGISTER_PATH},
};
use storage::{read_json, write_json, KeyValueStore};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::{
    observable::{Observable, Subscription},
    HostEnvironment, Notification, Notifier,
};

/// Storage key of the persisted user.
pub const USER_KEY: &str = "User";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid api base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    /// The server answered with a non-success status. Displays the server's
    /// message unchanged.
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response from server: {0}")]
    Decode(String),
    #[error("failed to clear stored user: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEndpoints {
    pub login: Url,
    pub register: Url,
}

impl UserEndpoints {
    pub fn from_base(base_url: &str) -> Result<Self, SessionError> {
        let invalid = |source| SessionError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        };
        let mut base = Url::parse(base_url).map_err(invalid)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            login: base.join(USER_LOGIN_PATH).map_err(invalid)?,
            register: base.join(USER_REGISTER_PATH).map_err(invalid)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum AuthFlow {
    Login,
    Register,
}

impl AuthFlow {
    fn name(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }

    fn success(self, user: &User) -> Notification {
        match self {
            Self::Login => Notification::success(
                "Login Successful",
                format!("Welcome to Foodmine {}!", user.name),
            ),
            Self::Register => Notification::success(
                "Register Successful",
                format!("Welcome to the Foodmine {}", user.name),
            ),
        }
    }

    fn failure_title(self) -> &'static str {
        match self {
            Self::Login => "Login Failed",
            Self::Register => "Register Failed",
        }
    }
}

pub struct SessionStore {
    http: Client,
    endpoints: UserEndpoints,
    storage: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    host: Arc<dyn HostEnvironment>,
    write_lock: Mutex<()>,
    session: Observable<Session>,
}

impl SessionStore {
    /// Restores the persisted user. Missing, unreadable or malformed state
    /// resolves to [`Session::Anonymous`].
    pub async fn load(
        endpoints: UserEndpoints,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        host: Arc<dyn HostEnvironment>,
    ) -> Self {
        let session = load_session(storage.as_ref()).await;
        Self {
            http: Client::new(),
            endpoints,
            storage,
            notifier,
            host,
            write_lock: Mutex::new(()),
            session: Observable::new(session),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn current(&self) -> Session {
        self.session.current()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current().user().cloned()
    }

    pub fn subscribe(&self) -> Subscription<Session> {
        self.session.subscribe()
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, SessionError> {
        let url = self.endpoints.login.clone();
        self.authenticate(AuthFlow::Login, url, request).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, SessionError> {
        let url = self.endpoints.register.clone();
        self.authenticate(AuthFlow::Register, url, request).await
    }

    /// Drops the session, forgets the persisted user and asks the host to
    /// reload so nothing keeps a reference to the old identity.
    ///
    /// When the stored user can be neither removed nor overwritten the host
    /// is not reloaded, since a reload would restore the old identity.
    pub async fn logout(&self) -> Result<(), SessionError> {
        {
            let _guard = self.write_lock.lock().await;
            self.session.publish(Session::Anonymous);
            self.forget_persisted_user().await?;
        }
        info!("session: logged out, reloading host");
        self.host.reload();
        Ok(())
    }

    async fn forget_persisted_user(&self) -> Result<(), SessionError> {
        let Err(err) = self.storage.remove_item(USER_KEY).await else {
            return Ok(());
        };
        warn!("session: failed to remove persisted user, overwriting: {err:#}");
        write_json(self.storage.as_ref(), USER_KEY, &None::<User>)
            .await
            .map_err(|err| {
                warn!("session: persisted user still present: {err:#}");
                SessionError::Storage(format!("{err:#}"))
            })
    }

    async fn authenticate<B>(
        &self,
        flow: AuthFlow,
        url: Url,
        body: &B,
    ) -> Result<User, SessionError>
    where
        B: Serialize + ?Sized,
    {
        match self.post_for_user(url, body).await {
            Ok(user) => {
                self.replace_session(&user).await;
                info!(user_id = %user.id, "session: {} succeeded", flow.name());
                self.notifier.notify(flow.success(&user));
                Ok(user)
            }
            Err(err) => {
                warn!("session: {} failed: {err}", flow.name());
                self.notifier
                    .notify(Notification::failure(flow.failure_title(), err.to_string()));
                Err(err)
            }
        }
    }

    async fn replace_session(&self, user: &User) {
        let _guard = self.write_lock.lock().await;
        if let Err(err) = write_json(self.storage.as_ref(), USER_KEY, user).await {
            warn!("session: failed to persist user, keeping in-memory copy: {err:#}");
        }
        self.session.publish(Session::Authenticated(user.clone()));
    }

    async fn post_for_user<B>(&self, url: Url, body: &B) -> Result<User, SessionError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| SessionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = read_rejection(status, &body);
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json::<User>()
            .await
            .map_err(|err| SessionError::Decode(err.to_string()))
    }
}

async fn load_session(storage: &dyn KeyValueStore) -> Session {
    // `null` is what logout leaves behind when the entry could not be removed.
    match read_json::<Option<User>>(storage, USER_KEY).await {
        Ok(Some(Some(user))) => Session::Authenticated(user),
        Ok(Some(None) | None) => Session::Anonymous,
        Err(err) => {
            warn!("session: stored user is unreadable, starting anonymous: {err:#}");
            Session::Anonymous
        }
    }
}

/// Picks the message to show for an error response: an `ApiError` body, a
/// bare JSON string, the raw text, or the status reason, in that order. Only
/// an `ApiError` body carries a code.
fn read_rejection(status: StatusCode, body: &str) -> (Option<ErrorCode>, String) {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return (api_error.code, api_error.message);
    }
    if let Ok(text) = serde_json::from_str::<String>(body) {
        return (None, text);
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return (None, trimmed.to_string());
    }
    let reason = status.canonical_reason().unwrap_or("request failed");
    (None, reason.to_string())
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
