//! Network operations against the triage backend.
//!
//! [`Backend`] is the seam the workflow controller talks to; [`HttpGateway`]
//! is the reqwest implementation. Every call receives the header set that the
//! controller captured from the session when the action was invoked.

use std::future::Future;

use reqwest::Method;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{Result, TriageError, backend_message};
use crate::models::{
    ClassifyRequest, ClassifyResponse, DetailRecord, EmailContent, EmailId, HealthStatus,
    HistoryFilter, HistoryPage, HistoryPayload, LoginGrant, MessageBody, UserProfile,
};

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const ME_PATH: &str = "/api/v1/auth/me";
pub const CHANGE_PASSWORD_PATH: &str = "/api/v1/auth/change-password";
pub const CLASSIFY_PATH: &str = "/api/v1/emails/classify";
pub const HISTORY_PATH: &str = "/api/v1/emails/history";
pub const HEALTH_PATH: &str = "/api/v1/health";

pub fn mark_responded_path(id: &EmailId) -> String {
    format!("/api/v1/emails/{id}/mark-responded")
}

pub fn detail_path(id: &EmailId) -> String {
    format!("/api/v1/emails/{id}")
}

/// One network round trip per method. Implementations must not retry.
pub trait Backend: Send + Sync {
    fn login(
        &self,
        headers: HeaderMap,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginGrant>> + Send;

    fn classify(
        &self,
        headers: HeaderMap,
        request: &ClassifyRequest,
    ) -> impl Future<Output = Result<ClassifyResponse>> + Send;

    fn mark_responded(
        &self,
        headers: HeaderMap,
        id: &EmailId,
    ) -> impl Future<Output = Result<()>> + Send;

    fn fetch_history(
        &self,
        headers: HeaderMap,
        filter: HistoryFilter,
    ) -> impl Future<Output = Result<HistoryPage>> + Send;

    fn fetch_detail(
        &self,
        headers: HeaderMap,
        id: &EmailId,
    ) -> impl Future<Output = Result<DetailRecord>> + Send;

    fn health(&self) -> impl Future<Output = Result<HealthStatus>> + Send;

    fn current_user(&self, headers: HeaderMap) -> impl Future<Output = Result<UserProfile>> + Send;

    fn change_password(
        &self,
        headers: HeaderMap,
        current: &str,
        new: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// reqwest-backed gateway rooted at the API base URL.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api_url: String,
}

impl HttpGateway {
    pub fn new(api_url: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(api_url)
            .map_err(|e| TriageError::validation(format!("Invalid API URL '{api_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TriageError::validation(format!(
                "Invalid API URL '{api_url}': scheme must be http or https"
            )));
        }
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str, headers: HeaderMap) -> Result<reqwest::RequestBuilder> {
        let url = url::Url::parse(&format!("{}{path}", self.api_url))
            .map_err(|e| TriageError::validation(format!("Invalid URL: {}{path}: {e}", self.api_url)))?;
        tracing::debug!(%method, %url, "dispatching request");
        Ok(self.client.request(method, url).headers(headers))
    }
}

/// Reads a response, mapping non-2xx to [`TriageError::Request`] and
/// decoding the body otherwise.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "backend rejected request");
        return Err(TriageError::Request {
            status: status.as_u16(),
            message: backend_message(&text),
        });
    }
    serde_json::from_str(&text).map_err(|e| TriageError::Decode(e.to_string()))
}

fn classify_form(request: &ClassifyRequest) -> Result<Form> {
    let mut form = Form::new().text("email_destinatario", request.recipient.clone());
    if let Some(subject) = &request.subject {
        form = form.text("assunto", subject.clone());
    }
    let form = match &request.content {
        EmailContent::Text(text) => form.text("email_body", text.clone()),
        EmailContent::File(file) => {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(file.mime_type())
                .map_err(|e| TriageError::validation(format!("Invalid file '{}': {e}", file.name)))?;
            form.part("arquivo", part)
        }
    };
    Ok(form)
}

impl Backend for HttpGateway {
    async fn login(&self, headers: HeaderMap, email: &str, password: &str) -> Result<LoginGrant> {
        let resp = self
            .request(Method::POST, LOGIN_PATH, headers)?
            .json(&json!({ "email": email, "senha": password }))
            .send()
            .await?;
        read_json(resp).await.map_err(|err| match err {
            TriageError::Request { status, message } => TriageError::Auth { status, message },
            other => other,
        })
    }

    async fn classify(&self, headers: HeaderMap, request: &ClassifyRequest) -> Result<ClassifyResponse> {
        let form = classify_form(request)?;
        let resp = self
            .request(Method::POST, CLASSIFY_PATH, headers)?
            .multipart(form)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn mark_responded(&self, headers: HeaderMap, id: &EmailId) -> Result<()> {
        let resp = self
            .request(Method::POST, &mark_responded_path(id), headers)?
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        Err(TriageError::Request {
            status: status.as_u16(),
            message: backend_message(&text),
        })
    }

    async fn fetch_history(&self, headers: HeaderMap, filter: HistoryFilter) -> Result<HistoryPage> {
        let mut req = self.request(Method::GET, HISTORY_PATH, headers)?;
        if let Some(responded) = filter.responded {
            req = req.query(&[("respondido", responded)]);
        }
        let payload: HistoryPayload = read_json(req.send().await?).await?;
        Ok(payload.into_page())
    }

    async fn fetch_detail(&self, headers: HeaderMap, id: &EmailId) -> Result<DetailRecord> {
        let resp = self
            .request(Method::GET, &detail_path(id), headers)?
            .send()
            .await?;
        read_json(resp).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        let resp = self
            .request(Method::GET, HEALTH_PATH, HeaderMap::new())?
            .send()
            .await?;
        read_json(resp).await
    }

    async fn current_user(&self, headers: HeaderMap) -> Result<UserProfile> {
        let resp = self.request(Method::GET, ME_PATH, headers)?.send().await?;
        read_json(resp).await
    }

    async fn change_password(&self, headers: HeaderMap, current: &str, new: &str) -> Result<String> {
        let resp = self
            .request(Method::POST, CHANGE_PASSWORD_PATH, headers)?
            .json(&json!({ "senha_atual": current, "nova_senha": new }))
            .send()
            .await?;
        let body: MessageBody = read_json(resp).await?;
        Ok(body.message)
    }
}
