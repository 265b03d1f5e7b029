use std::io::Write;

use clap::ValueEnum;
use serde_json::json;
use triage_core::models::{ClassificationResult, DetailRecord, HistoryEntry};
use triage_core::{Clipboard, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Renders controller state on the terminal. Results go to stdout,
/// progress and warnings to stderr.
pub struct TerminalView {
    format: OutputFormat,
}

impl TerminalView {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn emit(&self, value: serde_json::Value) {
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "failed to encode output"),
        }
    }
}

impl View for TerminalView {
    fn render_loading(&self) {
        if self.format == OutputFormat::Text {
            eprintln!("Analysing email...");
        }
    }

    fn render_empty(&self) {
        match self.format {
            OutputFormat::Text => eprintln!("No active email."),
            OutputFormat::Json => self.emit(json!({ "state": "empty" })),
        }
    }

    fn render_result(&self, result: &ClassificationResult) {
        match self.format {
            OutputFormat::Text => println!("{}", format_result(result)),
            OutputFormat::Json => self.emit(json!({ "state": "result", "result": result })),
        }
    }

    fn render_reply(&self, result: &ClassificationResult) {
        match self.format {
            OutputFormat::Text => {
                println!("Suggested reply (#{}):\n{}", result.id, result.suggested_reply)
            }
            OutputFormat::Json => self.emit(json!({
                "state": "reply",
                "id": result.id,
                "suggested_reply": result.suggested_reply,
            })),
        }
    }

    fn render_history(&self, entries: &[HistoryEntry], total: u64) {
        match self.format {
            OutputFormat::Text => println!("{}", format_history(entries, total)),
            OutputFormat::Json => self.emit(json!({
                "state": "history",
                "total": total,
                "emails": entries,
            })),
        }
    }

    fn render_detail(&self, record: &DetailRecord) {
        match self.format {
            OutputFormat::Text => println!("{}", format_detail(record)),
            OutputFormat::Json => self.emit(json!({ "state": "detail", "email": record })),
        }
    }

    fn render_warning(&self, message: &str) {
        match self.format {
            OutputFormat::Text => eprintln!("warning: {message}"),
            OutputFormat::Json => eprintln!("{}", json!({ "warning": message })),
        }
    }

    fn render_notice(&self, message: &str) {
        match self.format {
            OutputFormat::Text => eprintln!("{message}"),
            OutputFormat::Json => eprintln!("{}", json!({ "notice": message })),
        }
    }
}

pub fn format_result(result: &ClassificationResult) -> String {
    let mut out = format!(
        "#{} [{}] to {}\nSubject: {}\n",
        result.id,
        result.classification.label(),
        result.recipient,
        result.subject
    );
    if result.used_file {
        out.push_str("Source: attached file\n");
    }
    out.push_str("\nSuggested reply:\n");
    out.push_str(&result.suggested_reply);
    out
}

pub fn format_history(entries: &[HistoryEntry], total: u64) -> String {
    if entries.is_empty() {
        return "No responded emails yet.".to_string();
    }
    let mut out = String::new();
    for (pos, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{pos:>3}  {:<19}  {:<11}  {:<28}  {}\n",
            entry.display_date(),
            entry.classification.label(),
            entry.recipient,
            entry.display_subject()
        ));
    }
    out.push_str(&format!("Total: {total}"));
    out
}

pub fn format_detail(record: &DetailRecord) -> String {
    let mut out = format!(
        "#{} [{}] to {}\nSubject: {}\n",
        record.id,
        record.classification.label(),
        record.recipient,
        record.display_subject()
    );
    if let Some(at) = record.responded_at.as_deref().or(record.created_at.as_deref()) {
        out.push_str(&format!("Date: {at}\n"));
    }
    out.push_str(&format!(
        "Responded: {}\n",
        if record.responded { "yes" } else { "no" }
    ));
    if let Some(body) = record.body.as_deref() {
        out.push_str(&format!("\n{body}\n"));
    }
    if let Some(reply) = record.generated_reply.as_deref() {
        out.push_str(&format!("\nReply:\n{reply}"));
    }
    out.trim_end().to_string()
}

/// Copies through whichever clipboard tool the host provides.
pub struct SystemClipboard;

const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("pbcopy", &[]),
    ("clip", &[]),
];

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), String> {
        for (cmd, args) in CLIPBOARD_COMMANDS {
            if pipe_to(cmd, args, text) {
                tracing::debug!(tool = cmd, "copied to clipboard");
                return Ok(());
            }
        }
        Err("no clipboard tool available (tried wl-copy, xclip, xsel, pbcopy, clip)".to_string())
    }
}

/// Feeds `text` to the command's stdin. The child is always reaped.
fn pipe_to(cmd: &str, args: &[&str], text: &str) -> bool {
    let mut child = match std::process::Command::new(cmd)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            tracing::debug!(tool = cmd, error = %e, "clipboard tool closed its input");
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return false;
        }
    }
    child.wait().map(|s| s.success()).unwrap_or(false)
}
