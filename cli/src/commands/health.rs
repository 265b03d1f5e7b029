use serde_json::json;
use triage_core::Backend;

use crate::commands::App;
use crate::util::error_exit_code;

pub async fn run(app: &App) -> i32 {
    match app.backend().health().await {
        Ok(status) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).unwrap_or(status.status)
            );
            0
        }
        Err(e) => {
            let body = json!({
                "error": e.code(),
                "message": e.to_string(),
                "api_url": app.backend().api_url(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| e.to_string()));
            error_exit_code(&e)
        }
    }
}
