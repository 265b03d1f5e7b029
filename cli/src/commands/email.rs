use clap::Args;
use triage_core::models::{EmailId, HistoryFilter, Submission};
use triage_core::{Outcome, View};

use crate::commands::App;
use crate::util::{exit_code, exit_error, read_email_file, read_text_arg};

#[derive(Args, Debug, Default)]
pub struct SubmitArgs {
    /// Recipient of the reply
    #[arg(long)]
    pub to: Option<String>,
    /// Subject line (optional)
    #[arg(long)]
    pub subject: Option<String>,
    /// Email text, or "-" to read it from stdin
    #[arg(long, conflicts_with = "words")]
    pub text: Option<String>,
    /// Read the email from a .txt or .pdf file (takes precedence over text)
    #[arg(long)]
    pub file: Option<String>,
    /// Email text given as plain words
    #[arg(trailing_var_arg = true)]
    pub words: Vec<String>,
}

impl SubmitArgs {
    pub fn into_submission(self) -> Result<Submission, String> {
        let text = match self.text.as_deref() {
            Some(value) => Some(read_text_arg(value)?),
            None if !self.words.is_empty() => Some(self.words.join(" ")),
            None => None,
        };
        let file = self.file.as_deref().map(read_email_file).transpose()?;
        Ok(Submission {
            text,
            file,
            recipient: self.to.unwrap_or_default(),
            subject: self.subject,
        })
    }
}

pub async fn classify(app: &App, args: SubmitArgs, copy: bool, mark_responded: bool) -> i32 {
    let submission = args
        .into_submission()
        .unwrap_or_else(|e| exit_error(&e, Some("Pass --text, --file or the email text itself")));

    let outcome = app.submit(submission).await;
    if !outcome.is_applied() {
        return exit_code(&outcome);
    }
    if copy {
        let copied = app.copy_reply();
        if !copied.is_applied() {
            return exit_code(&copied);
        }
    }
    if mark_responded {
        return exit_code(&app.mark_responded().await);
    }
    0
}

pub async fn respond(app: &App, id: String) -> i32 {
    exit_code(&app.mark_responded_by_id(&EmailId::new(id)).await)
}

pub async fn history(app: &App, responded: Option<bool>) -> i32 {
    let outcome = app.refresh_history(HistoryFilter { responded }).await;
    report_history_failure(app, &outcome);
    exit_code(&outcome)
}

pub async fn detail(app: &App, position: Option<usize>, id: Option<String>) -> i32 {
    if let Some(id) = id {
        return exit_code(&app.open_detail_by_id(&EmailId::new(id)).await);
    }
    let Some(position) = position else {
        exit_error(
            "Either a history position or --id is required",
            Some("Run `triage history` to list positions"),
        );
    };
    // Positions index the listing, so it has to be loaded first.
    let listing = app.refresh_history(HistoryFilter::default()).await;
    if !listing.is_applied() {
        report_history_failure(app, &listing);
        return exit_code(&listing);
    }
    exit_code(&app.open_detail(position).await)
}

/// History failures stay silent inside the workflow. A one-shot command
/// still has to say why it produced nothing.
pub fn report_history_failure(app: &App, outcome: &Outcome) {
    if let Some(err) = outcome.error() {
        app.view()
            .render_warning(&format!("Could not load history: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_become_text() {
        let args = SubmitArgs {
            to: Some("ana@example.com".into()),
            words: vec!["Any".into(), "update?".into()],
            ..Default::default()
        };
        let submission = args.into_submission().unwrap();
        assert_eq!(submission.text.as_deref(), Some("Any update?"));
        assert_eq!(submission.recipient, "ana@example.com");
        assert!(submission.file.is_none());
    }

    #[test]
    fn missing_recipient_is_left_for_validation() {
        let args = SubmitArgs {
            text: Some("Hello".into()),
            ..Default::default()
        };
        let submission = args.into_submission().unwrap();
        assert_eq!(submission.recipient, "");
    }

    #[test]
    fn unreadable_file_is_reported() {
        let args = SubmitArgs {
            file: Some("/nonexistent/mail.pdf".into()),
            ..Default::default()
        };
        assert!(args.into_submission().unwrap_err().contains("mail.pdf"));
    }
}
