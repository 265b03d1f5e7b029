#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use reqwest::header::HeaderMap;
use tokio::sync::oneshot;

use triage_core::models::{
    Classification, ClassificationResult, ClassifyRequest, ClassifyResponse, DetailRecord,
    EmailContent, EmailId, HealthStatus, HistoryEntry, HistoryFilter, HistoryPage, LoginGrant,
    Submission, UserProfile,
};
use triage_core::{Backend, Clipboard, Result, TriageError, View, WorkflowController};

/// A scripted reply: either available immediately or released by the test.
pub enum Reply<T> {
    Ready(Result<T>),
    Gated(oneshot::Receiver<Result<T>>),
}

struct Script<T>(Mutex<VecDeque<Reply<T>>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T> Script<T> {
    fn push(&self, reply: Result<T>) {
        self.0.lock().unwrap().push_back(Reply::Ready(reply));
    }

    fn gate(&self) -> oneshot::Sender<Result<T>> {
        let (tx, rx) = oneshot::channel();
        self.0.lock().unwrap().push_back(Reply::Gated(rx));
        tx
    }

    fn next(&self) -> Option<Reply<T>> {
        self.0.lock().unwrap().pop_front()
    }
}

async fn resolve<T>(reply: Option<Reply<T>>) -> Result<T> {
    match reply {
        None => Err(TriageError::Transport("no scripted reply".into())),
        Some(Reply::Ready(result)) => result,
        Some(Reply::Gated(rx)) => rx
            .await
            .unwrap_or_else(|_| Err(TriageError::Transport("gate dropped".into()))),
    }
}

#[derive(Debug, Clone)]
pub enum Call {
    Login {
        email: String,
        password: String,
        headers: HeaderMap,
    },
    Classify {
        request: ClassifyRequest,
        headers: HeaderMap,
    },
    MarkResponded {
        id: EmailId,
        headers: HeaderMap,
    },
    FetchHistory {
        filter: HistoryFilter,
    },
    FetchDetail {
        id: EmailId,
    },
    CurrentUser,
    ChangePassword {
        current: String,
        new: String,
    },
}

/// In-memory backend that records every call and answers from scripts.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    login: Script<LoginGrant>,
    classify: Script<ClassifyResponse>,
    mark: Script<()>,
    history: Script<HistoryPage>,
    detail: Script<DetailRecord>,
    me: Script<UserProfile>,
    password: Script<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn classify_calls(&self) -> Vec<(ClassifyRequest, HeaderMap)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Classify { request, headers } => Some((request, headers)),
                _ => None,
            })
            .collect()
    }

    pub fn mark_calls(&self) -> Vec<EmailId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::MarkResponded { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn detail_calls(&self) -> Vec<EmailId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::FetchDetail { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn push_login(&self, reply: Result<LoginGrant>) {
        self.login.push(reply);
    }

    pub fn gate_login(&self) -> oneshot::Sender<Result<LoginGrant>> {
        self.login.gate()
    }

    pub fn push_classify(&self, reply: Result<ClassifyResponse>) {
        self.classify.push(reply);
    }

    pub fn gate_classify(&self) -> oneshot::Sender<Result<ClassifyResponse>> {
        self.classify.gate()
    }

    pub fn push_mark(&self, reply: Result<()>) {
        self.mark.push(reply);
    }

    pub fn gate_mark(&self) -> oneshot::Sender<Result<()>> {
        self.mark.gate()
    }

    pub fn push_history(&self, reply: Result<HistoryPage>) {
        self.history.push(reply);
    }

    pub fn gate_history(&self) -> oneshot::Sender<Result<HistoryPage>> {
        self.history.gate()
    }

    pub fn push_detail(&self, reply: Result<DetailRecord>) {
        self.detail.push(reply);
    }

    pub fn gate_detail(&self) -> oneshot::Sender<Result<DetailRecord>> {
        self.detail.gate()
    }

    pub fn push_me(&self, reply: Result<UserProfile>) {
        self.me.push(reply);
    }

    pub fn push_password(&self, reply: Result<String>) {
        self.password.push(reply);
    }
}

impl Backend for FakeBackend {
    async fn login(&self, headers: HeaderMap, email: &str, password: &str) -> Result<LoginGrant> {
        self.record(Call::Login {
            email: email.to_string(),
            password: password.to_string(),
            headers,
        });
        let reply = self.login.next();
        resolve(reply).await
    }

    async fn classify(&self, headers: HeaderMap, request: &ClassifyRequest) -> Result<ClassifyResponse> {
        self.record(Call::Classify {
            request: request.clone(),
            headers,
        });
        let reply = self.classify.next();
        resolve(reply).await
    }

    async fn mark_responded(&self, headers: HeaderMap, id: &EmailId) -> Result<()> {
        self.record(Call::MarkResponded {
            id: id.clone(),
            headers,
        });
        let reply = self.mark.next();
        resolve(reply).await
    }

    async fn fetch_history(&self, _headers: HeaderMap, filter: HistoryFilter) -> Result<HistoryPage> {
        self.record(Call::FetchHistory { filter });
        let reply = self.history.next();
        resolve(reply).await
    }

    async fn fetch_detail(&self, _headers: HeaderMap, id: &EmailId) -> Result<DetailRecord> {
        self.record(Call::FetchDetail { id: id.clone() });
        let reply = self.detail.next();
        resolve(reply).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".into(),
        })
    }

    async fn current_user(&self, _headers: HeaderMap) -> Result<UserProfile> {
        self.record(Call::CurrentUser);
        let reply = self.me.next();
        resolve(reply).await
    }

    async fn change_password(&self, _headers: HeaderMap, current: &str, new: &str) -> Result<String> {
        self.record(Call::ChangePassword {
            current: current.to_string(),
            new: new.to_string(),
        });
        let reply = self.password.next();
        resolve(reply).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Loading,
    Empty,
    Result(EmailId, String),
    Reply(EmailId, String),
    History(Vec<EmailId>, u64),
    Detail(EmailId),
    Warning(String),
    Notice(String),
}

#[derive(Default)]
pub struct RecordingView {
    frames: Mutex<Vec<Rendered>>,
}

impl RecordingView {
    fn push(&self, frame: Rendered) {
        self.frames.lock().unwrap().push(frame);
    }

    pub fn frames(&self) -> Vec<Rendered> {
        self.frames.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Rendered::Warning(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Rendered::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl View for RecordingView {
    fn render_loading(&self) {
        self.push(Rendered::Loading);
    }

    fn render_empty(&self) {
        self.push(Rendered::Empty);
    }

    fn render_result(&self, result: &ClassificationResult) {
        self.push(Rendered::Result(
            result.id.clone(),
            result.suggested_reply.clone(),
        ));
    }

    fn render_reply(&self, result: &ClassificationResult) {
        self.push(Rendered::Reply(
            result.id.clone(),
            result.suggested_reply.clone(),
        ));
    }

    fn render_history(&self, entries: &[HistoryEntry], total: u64) {
        self.push(Rendered::History(
            entries.iter().map(|e| e.id.clone()).collect(),
            total,
        ));
    }

    fn render_detail(&self, record: &DetailRecord) {
        self.push(Rendered::Detail(record.id.clone()));
    }

    fn render_warning(&self, message: &str) {
        self.push(Rendered::Warning(message.to_string()));
    }

    fn render_notice(&self, message: &str) {
        self.push(Rendered::Notice(message.to_string()));
    }
}

#[derive(Default)]
pub struct MemoryClipboard {
    pub contents: std::sync::Arc<Mutex<Option<String>>>,
}

impl Clipboard for MemoryClipboard {
    fn copy(&self, text: &str) -> std::result::Result<(), String> {
        *self.contents.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

pub type TestController = WorkflowController<FakeBackend, RecordingView>;

pub fn controller(backend: FakeBackend) -> TestController {
    WorkflowController::new(backend, RecordingView::default(), Box::new(MemoryClipboard::default()))
}

pub fn text_submission(text: &str) -> Submission {
    Submission {
        text: Some(text.to_string()),
        file: None,
        recipient: "ana@example.com".to_string(),
        subject: Some("Status".to_string()),
    }
}

pub fn classified(id: &str, reply: &str) -> ClassifyResponse {
    ClassifyResponse {
        id: EmailId::new(id),
        classification: Classification::Productive,
        recipient: "ana@example.com".to_string(),
        generated_reply: Some(reply.to_string()),
    }
}

pub fn entry(id: &str) -> HistoryEntry {
    HistoryEntry {
        id: EmailId::new(id),
        recipient: format!("{id}@example.com"),
        subject: Some(format!("Subject {id}")),
        classification: Classification::Productive,
        responded: true,
        responded_at: Some("2024-05-01T10:00:00".to_string()),
        created_at: Some("2024-05-01T09:00:00".to_string()),
    }
}

pub fn page(ids: &[&str]) -> HistoryPage {
    HistoryPage {
        entries: ids.iter().map(|id| entry(id)).collect(),
        total: ids.len() as u64,
    }
}

pub fn detail(id: &str) -> DetailRecord {
    DetailRecord {
        id: EmailId::new(id),
        body: Some("original body".to_string()),
        recipient: format!("{id}@example.com"),
        subject: None,
        classification: Classification::Unproductive,
        generated_reply: Some("Thanks".to_string()),
        responded: true,
        responded_at: None,
        created_at: None,
    }
}

pub fn request_text(request: &ClassifyRequest) -> Option<&str> {
    match &request.content {
        EmailContent::Text(text) => Some(text),
        EmailContent::File(_) => None,
    }
}

/// Yields until `cond` holds, so a test can line up concurrent futures.
pub async fn until(cond: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
