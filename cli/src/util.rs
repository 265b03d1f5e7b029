use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use triage_core::{Outcome, TriageError};

/// Credentials saved by `triage login` so later invocations can reuse them.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub api_url: String,
    pub access_token: String,
    pub saved_at: DateTime<Utc>,
}

pub fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            exit_error(
                &format!("Failed to build HTTP client: {e}"),
                Some("Check TLS configuration of the host"),
            )
        })
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_else(|_| message.to_string()));
    std::process::exit(4);
}

/// Exit codes: 0=success, 1=rejected (4xx or auth), 2=server error (5xx or
/// undecodable body), 3=connection error, 4=usage error
pub fn exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Applied | Outcome::Superseded => 0,
        Outcome::Rejected(err) => error_exit_code(err),
    }
}

pub fn error_exit_code(err: &TriageError) -> i32 {
    match err {
        TriageError::Validation(_) => 4,
        TriageError::Auth { .. } => 1,
        TriageError::Request { status, .. } if *status < 500 => 1,
        TriageError::Request { .. } | TriageError::Decode(_) => 2,
        TriageError::Transport(_) => 3,
    }
}

pub fn config_path() -> std::path::PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("triage");
    config_dir.join("credentials.json")
}

pub fn load_credentials() -> Option<StoredCredentials> {
    let path = config_path();
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn save_credentials(creds: &StoredCredentials) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(creds)?;

    // Write with restricted permissions (0o600)
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    file.write_all(data.as_bytes())?;

    Ok(())
}

pub fn remove_credentials() -> Result<bool, std::io::Error> {
    let path = config_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
        return Ok(true);
    }
    Ok(false)
}

/// Resolve the token to seed the session with (priority order):
/// 1. --token / TRIAGE_API_KEY
/// 2. ~/.config/triage/credentials.json, if saved for the same API URL
/// 3. none (anonymous)
pub fn resolve_token(api_url: &str, explicit: Option<&str>) -> Option<String> {
    if let Some(token) = explicit.filter(|t| !t.trim().is_empty()) {
        return Some(token.trim().to_string());
    }
    let creds = load_credentials()?;
    if creds.api_url.trim_end_matches('/') != api_url.trim_end_matches('/') {
        tracing::debug!(
            stored = %creds.api_url,
            "ignoring stored credentials saved for a different API URL"
        );
        return None;
    }
    Some(creds.access_token)
}

/// Read text from a literal argument, or from stdin when it is "-".
pub fn read_text_arg(value: &str) -> Result<String, String> {
    if value != "-" {
        return Ok(value.to_string());
    }
    let mut buf = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
        .map_err(|e| format!("Failed to read stdin: {e}"))?;
    Ok(buf)
}

pub fn read_email_file(path: &str) -> Result<triage_core::models::EmailFile, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?;
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());
    Ok(triage_core::models::EmailFile::new(name, bytes))
}

/// Read one line from stdin after printing a prompt on stderr.
pub fn prompt_line(prompt: &str) -> Result<String, String> {
    eprint!("{prompt}");
    let _ = std::io::stderr().flush();
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .map_err(|e| format!("Failed to read stdin: {e}"))?;
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

// Unix-specific imports for file permissions
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

// Permissions are left to the platform default off unix
#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}
