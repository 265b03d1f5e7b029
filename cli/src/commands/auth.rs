use triage_core::View;

use crate::commands::App;
use crate::util::{
    StoredCredentials, config_path, exit_code, exit_error, prompt_line, remove_credentials,
    save_credentials,
};

pub async fn login(app: &App, email: &str, password: Option<String>) -> i32 {
    let password = match password {
        Some(p) => p,
        None => prompt_line("Password: ").unwrap_or_else(|e| exit_error(&e, None)),
    };

    let outcome = app.login(email, &password).await;
    if outcome.is_applied() {
        persist_token(app);
    }
    exit_code(&outcome)
}

/// Saves the session token so the next invocation starts authenticated.
pub fn persist_token(app: &App) {
    let Some(access_token) = app.token() else {
        return;
    };
    let creds = StoredCredentials {
        api_url: app.backend().api_url().to_string(),
        access_token,
        saved_at: chrono::Utc::now(),
    };
    match save_credentials(&creds) {
        Ok(()) => eprintln!("Credentials saved to {}", config_path().display()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to save credentials");
            app.view()
                .render_warning(&format!("Could not save credentials: {e}"));
        }
    }
}

pub fn logout(app: &App) -> i32 {
    forget_token(app);
    exit_code(&app.logout())
}

pub fn forget_token(app: &App) {
    match remove_credentials() {
        Ok(true) => tracing::debug!(path = %config_path().display(), "credentials removed"),
        Ok(false) => {}
        Err(e) => app
            .view()
            .render_warning(&format!("Could not remove credentials: {e}")),
    }
}

pub async fn whoami(app: &App) -> i32 {
    exit_code(&app.who_am_i().await)
}

pub async fn change_password(app: &App, current: Option<String>, new: Option<String>) -> i32 {
    let current = match current {
        Some(p) => p,
        None => prompt_line("Current password: ").unwrap_or_else(|e| exit_error(&e, None)),
    };
    let new = match new {
        Some(p) => p,
        None => prompt_line("New password: ").unwrap_or_else(|e| exit_error(&e, None)),
    };
    exit_code(&app.change_password(&current, &new).await)
}
