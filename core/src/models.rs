use std::fmt;

use serde::{Deserialize, Serialize};

/// Shown wherever the operator left the subject blank.
pub const NO_SUBJECT: &str = "(sem assunto)";

/// Opaque email identifier. The backend uses integer ids; the client never
/// does arithmetic on them, so they are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct EmailId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for EmailId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        }
    }
}

impl From<EmailId> for String {
    fn from(id: EmailId) -> Self {
        id.0
    }
}

impl EmailId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification label assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Classification {
    Productive,
    Unproductive,
}

impl Classification {
    /// Parse a backend label. Anything that is not recognisably productive
    /// is treated as unproductive.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "produtivo" | "productive" => Self::Productive,
            _ => Self::Unproductive,
        }
    }

    /// Label in the backend's vocabulary.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Productive => "Produtivo",
            Self::Unproductive => "Improdutivo",
        }
    }
}

impl From<String> for Classification {
    fn from(label: String) -> Self {
        Self::parse(&label)
    }
}

impl From<Classification> for String {
    fn from(classification: Classification) -> Self {
        classification.label().to_string()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An uploaded email file (`.txt` or `.pdf`; the backend extracts the text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl EmailFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        if self.name.to_lowercase().ends_with(".pdf") {
            "application/pdf"
        } else {
            "text/plain"
        }
    }
}

/// Exactly one body source per classify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailContent {
    Text(String),
    File(EmailFile),
}

/// Fully validated classify request, as handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyRequest {
    pub recipient: String,
    pub subject: Option<String>,
    pub content: EmailContent,
}

/// Raw operator input for a submission, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub text: Option<String>,
    pub file: Option<EmailFile>,
    pub recipient: String,
    pub subject: Option<String>,
}

/// `POST /api/v1/emails/classify` success payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassifyResponse {
    pub id: EmailId,
    pub classification: Classification,
    #[serde(rename = "email_destinatario")]
    pub recipient: String,
    #[serde(rename = "generated_response", default)]
    pub generated_reply: Option<String>,
}

/// The active classification outcome held by the result cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub id: EmailId,
    pub classification: Classification,
    pub recipient: String,
    /// Subject for display; the placeholder when the operator left it blank.
    pub subject: String,
    /// Subject exactly as it went out with the submission.
    #[serde(skip)]
    pub sent_subject: Option<String>,
    pub source_text: Option<String>,
    pub used_file: bool,
    pub suggested_reply: String,
}

impl ClassificationResult {
    /// Subject to send again on regeneration, unchanged from the submission.
    pub fn subject_for_resend(&self) -> Option<&str> {
        self.sent_subject.as_deref()
    }

    pub fn can_regenerate(&self) -> bool {
        !self.used_file && self.source_text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// One row of the answered-emails history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EmailId,
    #[serde(rename = "email_destinatario")]
    pub recipient: String,
    #[serde(rename = "assunto", default)]
    pub subject: Option<String>,
    pub classification: Classification,
    #[serde(rename = "respondido", default)]
    pub responded: bool,
    #[serde(rename = "respondido_em", default)]
    pub responded_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HistoryEntry {
    /// Response time when answered, creation time otherwise.
    pub fn display_date(&self) -> &str {
        self.responded_at
            .as_deref()
            .or(self.created_at.as_deref())
            .unwrap_or("-")
    }

    pub fn display_subject(&self) -> &str {
        display_subject(self.subject.as_deref())
    }
}

/// `GET /api/v1/emails/history` payload. Older servers return a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryPayload {
    List(Vec<HistoryEntry>),
    Paged {
        #[serde(default)]
        emails: Vec<HistoryEntry>,
        #[serde(default)]
        total: Option<u64>,
    },
}

impl HistoryPayload {
    pub(crate) fn into_page(self) -> HistoryPage {
        match self {
            Self::List(entries) => HistoryPage {
                total: entries.len() as u64,
                entries,
            },
            Self::Paged { emails, total } => {
                let total = total.unwrap_or(emails.len() as u64);
                HistoryPage {
                    entries: emails,
                    total,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total: u64,
}

/// Optional filter for the history listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub responded: Option<bool>,
}

/// Full record for one email, fetched when a history row is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: EmailId,
    #[serde(rename = "email_body", default)]
    pub body: Option<String>,
    #[serde(rename = "email_destinatario")]
    pub recipient: String,
    #[serde(rename = "assunto", default)]
    pub subject: Option<String>,
    pub classification: Classification,
    #[serde(rename = "generated_response", default)]
    pub generated_reply: Option<String>,
    #[serde(rename = "respondido", default)]
    pub responded: bool,
    #[serde(rename = "respondido_em", default)]
    pub responded_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl DetailRecord {
    pub fn display_subject(&self) -> &str {
        display_subject(self.subject.as_deref())
    }
}

fn display_subject(subject: Option<&str>) -> &str {
    match subject {
        Some(s) if !s.trim().is_empty() => s,
        _ => NO_SUBJECT,
    }
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginGrant {
    #[serde(rename = "access_token")]
    pub token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
}

/// `GET /api/v1/auth/me` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: EmailId,
    pub email: String,
    #[serde(default)]
    pub must_change_password: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(rename = "mensagem")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
