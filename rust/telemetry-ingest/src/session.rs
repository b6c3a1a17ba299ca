//! Session correlation through a first-party cookie.
//!
//! Page requests without the cookie get a fresh session id; the log
//! endpoint reads it back to stamp entries. The ingest router only carries
//! its own routes, so an application serving the pages wraps its page
//! router with [`with_session_cookies`].

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, ORIGIN, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum::{middleware, Router};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_COOKIE_NAME: &str = "LoupeSessionId";

/// Extensions of page requests that receive a session cookie. The empty
/// string stands for paths without an extension.
pub fn default_extensions() -> Vec<String> {
    [".html", ".htm", ".aspx", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    cookie_name: String,
    extensions: Vec<String>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_NAME, default_extensions())
    }
}

impl SessionPolicy {
    pub fn new(cookie_name: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            extensions: extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Cross-origin requests never get a cookie; other requests only when
    /// their path extension is whitelisted.
    pub fn is_interested(&self, path: &str, headers: &HeaderMap) -> bool {
        if headers.contains_key(ORIGIN) {
            return false;
        }
        let extension = path_extension(path);
        self.extensions.iter().any(|e| *e == extension)
    }

    /// The session id carried by the request's cookies, if any.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.cookie_name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }

    /// Generate a new session id with its `Cookie` and `Set-Cookie` values.
    pub fn issue(&self) -> Option<IssuedSession> {
        let id = Uuid::new_v4().to_string();
        let cookie = HeaderValue::from_str(&format!("{}={}", self.cookie_name, id));
        let set_cookie =
            HeaderValue::from_str(&format!("{}={}; Path=/; HttpOnly", self.cookie_name, id));
        match (cookie, set_cookie) {
            (Ok(cookie), Ok(set_cookie)) => Some(IssuedSession {
                id,
                cookie,
                set_cookie,
            }),
            _ => {
                warn!("cookie name '{}' is not a valid header value", self.cookie_name);
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub id: String,
    pub cookie: HeaderValue,
    pub set_cookie: HeaderValue,
}

/// Lower-cased extension of the last path segment, including the dot, or
/// an empty string.
fn path_extension(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(pos) => segment[pos..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Middleware issuing the session cookie on interesting requests.
///
/// The new cookie is also added to the request so handlers further down
/// see the same session id.
pub async fn session_cookie(
    State(policy): State<Arc<SessionPolicy>>,
    mut request: Request,
    next: Next,
) -> Response {
    let issued = if policy.is_interested(request.uri().path(), request.headers())
        && policy.session_id(request.headers()).is_none()
    {
        policy.issue()
    } else {
        None
    };

    if let Some(session) = &issued {
        debug!(session = %session.id, path = %request.uri().path(), "issued session cookie");
        request.headers_mut().append(COOKIE, session.cookie.clone());
    }

    let mut response = next.run(request).await;
    if let Some(session) = issued {
        response.headers_mut().append(SET_COOKIE, session.set_cookie);
    }
    response
}

/// Layer [`session_cookie`] onto every route of `router`.
pub fn with_session_cookies<S>(router: Router<S>, policy: Arc<SessionPolicy>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(policy, session_cookie))
}
