pub mod auth;
pub mod email;
pub mod health;
pub mod shell;

use triage_core::{HttpGateway, WorkflowController};

use crate::terminal::TerminalView;

pub type App = WorkflowController<HttpGateway, TerminalView>;
