use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

/// What kind of body a request carries, which decides the content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// JSON body; declares `application/json`.
    Json,
    /// Multipart form; the transport writes its own boundary header.
    Multipart,
    /// No body at all.
    Empty,
}

/// The operator's authentication token for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            epoch: 0,
        }
    }

    /// Stores the credential as-is; the backend is the only judge of it.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Drops the token and invalidates any login still in flight.
    pub fn clear(&mut self) {
        self.token = None;
        self.advance();
    }

    /// Counter bumped by every login attempt and every logout. A login may
    /// only store its token while the epoch it started under is current.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn advance(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Headers to attach to an outgoing request.
    pub fn auth_headers(&self, kind: BodyKind) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if kind == BodyKind::Json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = &self.token {
            // A token with bytes that cannot appear in a header is sent as
            // nothing rather than failing locally; the backend answers 401.
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("session token is not a valid header value; omitting it"),
            }
        }
        headers
    }
}
