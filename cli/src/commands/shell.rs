use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use triage_core::models::HistoryFilter;
use triage_core::{Action, Outcome, View, ViewState};

use crate::commands::App;
use crate::commands::auth::{forget_token, persist_token};
use crate::commands::email::{SubmitArgs, report_history_failure};
use crate::terminal::format_result;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "triage", disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Classify an email and generate a reply
    Submit(SubmitArgs),
    /// Ask for a new reply to the active email
    Regenerate,
    /// Mark the active email as responded
    Respond,
    /// Copy the suggested reply to the clipboard
    Copy,
    /// Reload the history listing
    History {
        /// Filter on responded state
        #[arg(long)]
        responded: Option<bool>,
    },
    /// Open an entry of the last listing
    Detail {
        /// Position shown by `history`
        position: usize,
    },
    /// Log in and remember the token
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Drop the token and all loaded data
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change the account password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Show the active email and listing size
    State,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

/// Reads commands from stdin until EOF or `quit`. Network actions run as
/// background tasks so a slow request never blocks the prompt.
pub async fn run(app: Arc<App>) -> i32 {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks: JoinSet<Outcome> = JoinSet::new();

    eprintln!("triage shell on {}. Type 'help' for commands.", app.backend().api_url());

    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                break;
            }
        };
        while let Some(joined) = tasks.try_join_next() {
            log_finished(joined);
        }

        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(e) => {
                app.view().render_warning(&e);
                continue;
            }
        };
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };

        let action = match command {
            ShellCommand::Quit => break,
            ShellCommand::State => {
                print_state(&app);
                continue;
            }
            ShellCommand::Copy => {
                app.copy_reply();
                continue;
            }
            ShellCommand::Logout => {
                forget_token(&app);
                app.logout();
                continue;
            }
            ShellCommand::Login { email, password } => {
                let password = match password {
                    Some(p) => p,
                    None => {
                        eprint!("Password: ");
                        let _ = std::io::stderr().flush();
                        match lines.next_line().await {
                            Ok(Some(p)) => p,
                            _ => break,
                        }
                    }
                };
                if app.login(&email, &password).await.is_applied() {
                    persist_token(&app);
                }
                continue;
            }
            ShellCommand::Submit(args) => {
                if matches!(app.snapshot(), ViewState::Loading) {
                    app.view()
                        .render_warning("An email is already being analysed");
                    continue;
                }
                match args.into_submission() {
                    Ok(submission) => Action::Submit(submission),
                    Err(e) => {
                        app.view().render_warning(&e);
                        continue;
                    }
                }
            }
            ShellCommand::Regenerate => Action::Regenerate,
            ShellCommand::Respond => Action::MarkResponded,
            ShellCommand::History { responded } => {
                Action::RefreshHistory(HistoryFilter { responded })
            }
            ShellCommand::Detail { position } => Action::OpenDetail(position),
            ShellCommand::Whoami => Action::WhoAmI,
            ShellCommand::Passwd { current, new } => Action::ChangePassword { current, new },
        };

        let app = Arc::clone(&app);
        tasks.spawn(async move {
            let history = matches!(action, Action::RefreshHistory(_));
            let outcome = app.dispatch(action).await;
            if history {
                report_history_failure(&app, &outcome);
            }
            outcome
        });
    }

    while let Some(joined) = tasks.join_next().await {
        log_finished(joined);
    }
    0
}

fn prompt() {
    eprint!("triage> ");
    let _ = std::io::stderr().flush();
}

fn log_finished(joined: Result<Outcome, tokio::task::JoinError>) {
    match joined {
        Ok(Outcome::Superseded) => tracing::debug!("action superseded by a newer one"),
        Ok(outcome) => tracing::debug!(applied = outcome.is_applied(), "action finished"),
        Err(e) => tracing::error!(error = %e, "action task failed"),
    }
}

fn print_state(app: &App) {
    match app.snapshot() {
        ViewState::Empty => eprintln!("No active email."),
        ViewState::Loading => eprintln!("Analysing email..."),
        ViewState::Error => eprintln!("Last submission failed."),
        ViewState::Result(result) => println!("{}", format_result(&result)),
    }
    let history = app.history();
    eprintln!(
        "History: {} loaded of {}. {}",
        history.entries.len(),
        history.total,
        if app.is_authenticated() {
            "Signed in."
        } else {
            "Not signed in."
        }
    );
}

/// Splits a command line into words. Single and double quotes group words,
/// a backslash escapes the next character outside single quotes.
fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "Trailing backslash".to_string())?;
                current.push(escaped);
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err("Unterminated quote".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            split_words("  history   --responded true ").unwrap(),
            vec!["history", "--responded", "true"]
        );
    }

    #[test]
    fn quotes_group_words() {
        assert_eq!(
            split_words(r#"submit --to ana@example.com --subject "Weekly status" 'Any news?'"#)
                .unwrap(),
            vec![
                "submit",
                "--to",
                "ana@example.com",
                "--subject",
                "Weekly status",
                "Any news?"
            ]
        );
    }

    #[test]
    fn empty_quotes_yield_empty_word() {
        assert_eq!(split_words(r#"submit --subject """#).unwrap(), vec!["submit", "--subject", ""]);
    }

    #[test]
    fn backslash_escapes() {
        assert_eq!(
            split_words(r#"say \"hi\" "a \" b" 'c \ d'"#).unwrap(),
            vec!["say", "\"hi\"", "a \" b", "c \\ d"]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(split_words("submit 'oops").unwrap_err(), "Unterminated quote");
    }

    #[test]
    fn parses_submit_with_trailing_text() {
        let words = split_words("submit --to ana@example.com Any update on the invoice?").unwrap();
        let parsed = ShellLine::try_parse_from(words).unwrap();
        let ShellCommand::Submit(args) = parsed.command else {
            panic!("expected submit");
        };
        assert_eq!(args.to.as_deref(), Some("ana@example.com"));
        assert_eq!(args.words.join(" "), "Any update on the invoice?");
    }

    #[test]
    fn exit_is_an_alias_for_quit() {
        let parsed = ShellLine::try_parse_from(["exit"]).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Quit));
    }

    #[test]
    fn detail_needs_a_position() {
        assert!(ShellLine::try_parse_from(["detail"]).is_err());
        let parsed = ShellLine::try_parse_from(["detail", "2"]).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Detail { position: 2 }));
    }
}
