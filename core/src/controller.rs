//! The workflow state machine.
//!
//! One [`WorkflowController`] owns the session, the result cache and the
//! history cache for the lifetime of the process. Each operator action maps
//! to one method (or to [`Action`] via [`WorkflowController::dispatch`]).
//! Failures never escape: they are rendered as a warning and reported back
//! as [`Outcome::Rejected`].
//!
//! Anything an in-flight request needs from shared state (target id, headers,
//! history position) is captured before the first await. Cache guards are
//! never held across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::header::HeaderMap;

use crate::cache::{HistoryCache, ResultCache, ViewState};
use crate::error::TriageError;
use crate::gateway::Backend;
use crate::models::{
    ClassificationResult, ClassifyRequest, ClassifyResponse, EmailContent, EmailId, HistoryFilter,
    HistoryPage, NO_SUBJECT, Submission,
};
use crate::session::{BodyKind, Session};
use crate::view::{Clipboard, View};

pub const MSG_MISSING_CONTENT: &str = "Provide the email text or a file";
pub const MSG_MISSING_RECIPIENT: &str = "Provide the recipient email address";
pub const MSG_MISSING_CREDENTIALS: &str = "Provide email and password";
pub const MSG_NO_ACTIVE_EMAIL: &str = "No active email";
pub const MSG_REGEN_FILE: &str = "Regeneration unavailable for file submissions";
pub const MSG_NOTHING_TO_REGENERATE: &str = "Nothing to regenerate";

const MIN_PASSWORD_LEN: usize = 6;

/// A named operator action with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Submit(Submission),
    Regenerate,
    MarkResponded,
    CopyReply,
    RefreshHistory(HistoryFilter),
    OpenDetail(usize),
    Login { email: String, password: String },
    Logout,
    ChangePassword { current: String, new: String },
    WhoAmI,
}

/// How an action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action ran and its effect is visible.
    Applied,
    /// The response arrived after a newer request for the same slot and was
    /// dropped.
    Superseded,
    /// Local validation or the backend refused; a warning was rendered.
    Rejected(TriageError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn error(&self) -> Option<&TriageError> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks a raw submission and turns it into a classify request. A file wins
/// over text when both are present.
pub fn validate_submission(submission: Submission) -> Result<ClassifyRequest, TriageError> {
    let text = non_empty(submission.text);
    if text.is_none() && submission.file.is_none() {
        return Err(TriageError::validation(MSG_MISSING_CONTENT));
    }
    let Some(recipient) = non_empty(Some(submission.recipient)) else {
        return Err(TriageError::validation(MSG_MISSING_RECIPIENT));
    };
    let content = match (submission.file, text) {
        (Some(file), _) => EmailContent::File(file),
        (None, Some(text)) => EmailContent::Text(text),
        (None, None) => return Err(TriageError::validation(MSG_MISSING_CONTENT)),
    };
    Ok(ClassifyRequest {
        recipient,
        subject: non_empty(submission.subject),
        content,
    })
}

fn build_result(resp: ClassifyResponse, request: &ClassifyRequest) -> ClassificationResult {
    let (source_text, used_file) = match &request.content {
        EmailContent::Text(text) => (Some(text.clone()), false),
        EmailContent::File(_) => (None, true),
    };
    ClassificationResult {
        id: resp.id,
        classification: resp.classification,
        recipient: resp.recipient,
        subject: request
            .subject
            .clone()
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        sent_subject: request.subject.clone(),
        source_text,
        used_file,
        suggested_reply: resp.generated_reply.unwrap_or_default(),
    }
}

pub struct WorkflowController<B, V> {
    backend: B,
    view: V,
    clipboard: Box<dyn Clipboard>,
    session: Mutex<Session>,
    result: Mutex<ResultCache>,
    history: Mutex<HistoryCache>,
}

impl<B: Backend, V: View> WorkflowController<B, V> {
    pub fn new(backend: B, view: V, clipboard: Box<dyn Clipboard>) -> Self {
        Self::with_session(backend, view, clipboard, Session::new())
    }

    pub fn with_session(backend: B, view: V, clipboard: Box<dyn Clipboard>, session: Session) -> Self {
        Self {
            backend,
            view,
            clipboard,
            session: Mutex::new(session),
            result: Mutex::new(ResultCache::new()),
            history: Mutex::new(HistoryCache::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn snapshot(&self) -> ViewState {
        lock(&self.result).snapshot()
    }

    pub fn history(&self) -> HistoryPage {
        lock(&self.history).page().clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.session).token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.session).is_authenticated()
    }

    fn headers(&self, kind: BodyKind) -> HeaderMap {
        lock(&self.session).auth_headers(kind)
    }

    fn reject(&self, err: TriageError) -> Outcome {
        tracing::debug!(error = %err, "action rejected");
        self.view.render_warning(&err.to_string());
        Outcome::Rejected(err)
    }

    fn fail(&self, context: &str, err: TriageError) -> Outcome {
        tracing::warn!(error = %err, "{context}");
        self.view.render_warning(&format!("{context}: {err}"));
        Outcome::Rejected(err)
    }

    pub async fn dispatch(&self, action: Action) -> Outcome {
        match action {
            Action::Submit(submission) => self.submit(submission).await,
            Action::Regenerate => self.regenerate().await,
            Action::MarkResponded => self.mark_responded().await,
            Action::CopyReply => self.copy_reply(),
            Action::RefreshHistory(filter) => self.refresh_history(filter).await,
            Action::OpenDetail(position) => self.open_detail(position).await,
            Action::Login { email, password } => self.login(&email, &password).await,
            Action::Logout => self.logout(),
            Action::ChangePassword { current, new } => self.change_password(&current, &new).await,
            Action::WhoAmI => self.who_am_i().await,
        }
    }

    /// Validates the input and classifies it. Concurrent submissions race;
    /// only the most recently issued one is applied.
    pub async fn submit(&self, submission: Submission) -> Outcome {
        let request = match validate_submission(submission) {
            Ok(request) => request,
            Err(err) => return self.reject(err),
        };
        let headers = self.headers(BodyKind::Multipart);
        let ticket = lock(&self.result).begin_submit();
        self.view.render_loading();
        tracing::debug!(seq = ticket.0, "classify issued");

        match self.backend.classify(headers, &request).await {
            Ok(resp) => {
                let record = build_result(resp, &request);
                let applied = lock(&self.result).complete_submit(ticket, record.clone());
                if !applied {
                    tracing::info!(seq = ticket.0, "dropping superseded classify response");
                    return Outcome::Superseded;
                }
                tracing::info!(seq = ticket.0, id = %record.id, "email classified");
                self.view.render_result(&record);
                self.view.render_notice("Email analysed");
                Outcome::Applied
            }
            Err(err) => {
                let applied = lock(&self.result).fail_submit(ticket);
                if !applied {
                    tracing::info!(seq = ticket.0, error = %err, "dropping superseded classify failure");
                    return Outcome::Superseded;
                }
                self.view.render_empty();
                self.fail("Could not process the email", err)
            }
        }
    }

    /// Asks for a fresh reply to the active email, resending its text.
    pub async fn regenerate(&self) -> Outcome {
        let prepared = {
            let mut cache = lock(&self.result);
            match cache.current() {
                None => Err(TriageError::validation(MSG_NO_ACTIVE_EMAIL)),
                Some(current) if current.used_file => Err(TriageError::validation(MSG_REGEN_FILE)),
                Some(current) if !current.can_regenerate() => {
                    Err(TriageError::validation(MSG_NOTHING_TO_REGENERATE))
                }
                Some(current) => {
                    let id = current.id.clone();
                    let request = ClassifyRequest {
                        recipient: current.recipient.clone(),
                        subject: current.subject_for_resend().map(str::to_string),
                        content: EmailContent::Text(current.source_text.clone().unwrap_or_default()),
                    };
                    Ok((cache.begin_regenerate(), id, request))
                }
            }
        };
        let (ticket, id, request) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return self.reject(err),
        };
        let headers = self.headers(BodyKind::Multipart);
        self.view.render_notice("Generating a new reply");
        tracing::debug!(seq = ticket.0, %id, "regeneration issued");

        match self.backend.classify(headers, &request).await {
            Ok(resp) => {
                let reply = resp.generated_reply.unwrap_or_default();
                let updated = {
                    let mut cache = lock(&self.result);
                    if cache.complete_regenerate(ticket, &id, reply) {
                        cache.current().cloned()
                    } else {
                        None
                    }
                };
                let Some(record) = updated else {
                    tracing::info!(seq = ticket.0, %id, "dropping superseded regeneration");
                    return Outcome::Superseded;
                };
                self.view.render_reply(&record);
                self.view.render_notice("Reply updated");
                Outcome::Applied
            }
            Err(err) => {
                if !lock(&self.result).reply_is_current(ticket, &id) {
                    tracing::info!(seq = ticket.0, %id, error = %err, "dropping superseded regeneration failure");
                    return Outcome::Superseded;
                }
                self.fail("Could not regenerate the reply", err)
            }
        }
    }

    /// Marks the active email as answered and clears it on success.
    pub async fn mark_responded(&self) -> Outcome {
        let target = lock(&self.result).current().map(|r| r.id.clone());
        let Some(id) = target else {
            return self.reject(TriageError::validation(MSG_NO_ACTIVE_EMAIL));
        };
        self.mark_responded_by_id(&id).await
    }

    /// Marks any stored email as answered. The active record is cleared
    /// only when it is the one being marked.
    pub async fn mark_responded_by_id(&self, id: &EmailId) -> Outcome {
        let headers = self.headers(BodyKind::Empty);

        match self.backend.mark_responded(headers, id).await {
            Ok(()) => {
                let discarded = lock(&self.result).discard(id);
                if discarded {
                    self.view.render_empty();
                } else {
                    tracing::info!(%id, "responded email is no longer the active one");
                }
                tracing::info!(%id, "email marked as responded");
                self.view.render_notice("Email marked as responded");
                Outcome::Applied
            }
            Err(err) => self.fail("Could not mark the email as responded", err),
        }
    }

    pub fn copy_reply(&self) -> Outcome {
        let reply = lock(&self.result)
            .current()
            .map(|r| r.suggested_reply.clone());
        let Some(reply) = reply else {
            return self.reject(TriageError::validation(MSG_NO_ACTIVE_EMAIL));
        };
        match self.clipboard.copy(&reply) {
            Ok(()) => {
                self.view.render_notice("Reply copied");
                Outcome::Applied
            }
            Err(err) => self.reject(TriageError::validation(format!("Could not copy the reply: {err}"))),
        }
    }

    /// Reloads the history listing. Failures are not surfaced to the view:
    /// the listing simply stays as it was.
    pub async fn refresh_history(&self, filter: HistoryFilter) -> Outcome {
        let headers = self.headers(BodyKind::Empty);
        let ticket = lock(&self.history).begin_refresh();

        match self.backend.fetch_history(headers, filter).await {
            Ok(page) => {
                let (applied, entries, total) = {
                    let mut cache = lock(&self.history);
                    let applied = cache.replace(ticket, page);
                    (applied, cache.entries().to_vec(), cache.total())
                };
                if !applied {
                    tracing::info!(seq = ticket.0, "dropping superseded history page");
                    return Outcome::Superseded;
                }
                self.view.render_history(&entries, total);
                Outcome::Applied
            }
            Err(err) => {
                tracing::warn!(error = %err, "history unavailable");
                Outcome::Rejected(err)
            }
        }
    }

    /// Opens the entry at `position` of the listing held right now.
    pub async fn open_detail(&self, position: usize) -> Outcome {
        let target = lock(&self.history).get(position).map(|e| e.id.clone());
        let Some(id) = target else {
            return self.reject(TriageError::validation(format!(
                "No history entry at position {position}"
            )));
        };
        self.open_detail_by_id(&id).await
    }

    /// Loads one stored email. Only the most recently issued lookup renders.
    pub async fn open_detail_by_id(&self, id: &EmailId) -> Outcome {
        let headers = self.headers(BodyKind::Empty);
        let ticket = lock(&self.history).begin_detail();
        let result = self.backend.fetch_detail(headers, id).await;
        if !lock(&self.history).is_latest_detail(ticket) {
            tracing::info!(seq = ticket.0, %id, "dropping superseded detail");
            return Outcome::Superseded;
        }
        match result {
            Ok(record) => {
                self.view.render_detail(&record);
                Outcome::Applied
            }
            Err(err) => self.fail("Could not load details", err),
        }
    }

    /// Authenticates and stores the token. The session is untouched on
    /// failure, and a login overtaken by a logout or a newer login stores
    /// nothing.
    pub async fn login(&self, email: &str, password: &str) -> Outcome {
        let (email, password) = (email.trim(), password.trim());
        if email.is_empty() || password.is_empty() {
            return self.reject(TriageError::validation(MSG_MISSING_CREDENTIALS));
        }
        let headers = Session::new().auth_headers(BodyKind::Json);
        let epoch = lock(&self.session).advance();

        let result = self.backend.login(headers, email, password).await;
        let current = {
            let mut session = lock(&self.session);
            match &result {
                Ok(grant) if session.epoch() == epoch => {
                    session.set_token(grant.token.clone());
                    true
                }
                _ => session.epoch() == epoch,
            }
        };
        if !current {
            tracing::info!(epoch, "dropping superseded login");
            return Outcome::Superseded;
        }
        match result {
            Ok(grant) => {
                tracing::info!(email, "logged in");
                self.view.render_notice("Logged in");
                if grant.must_change_password {
                    self.view
                        .render_notice("Password change required before continuing");
                }
                Outcome::Applied
            }
            Err(err @ TriageError::Auth { .. }) => {
                tracing::warn!(error = %err, "login rejected");
                self.view.render_warning("Invalid credentials");
                Outcome::Rejected(err)
            }
            Err(err) => self.fail("Could not log in", err),
        }
    }

    /// Drops the token and everything fetched under it.
    pub fn logout(&self) -> Outcome {
        lock(&self.session).clear();
        lock(&self.result).reset();
        lock(&self.history).reset();
        self.view.render_empty();
        self.view.render_notice("Logged out");
        Outcome::Applied
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Outcome {
        if current.trim().is_empty() || new.trim().is_empty() {
            return self.reject(TriageError::validation(
                "Provide the current and the new password",
            ));
        }
        if new.chars().count() < MIN_PASSWORD_LEN {
            return self.reject(TriageError::validation(format!(
                "The new password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let headers = self.headers(BodyKind::Json);
        match self.backend.change_password(headers, current, new).await {
            Ok(message) => {
                self.view.render_notice(&message);
                Outcome::Applied
            }
            Err(err) => self.fail("Could not change the password", err),
        }
    }

    pub async fn who_am_i(&self) -> Outcome {
        let headers = self.headers(BodyKind::Empty);
        match self.backend.current_user(headers).await {
            Ok(profile) => {
                self.view
                    .render_notice(&format!("Signed in as {}", profile.email));
                if profile.must_change_password {
                    self.view
                        .render_notice("Password change required before continuing");
                }
                Outcome::Applied
            }
            Err(err) => self.fail("Could not load the current user", err),
        }
    }
}
