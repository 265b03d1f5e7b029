//! Client-side core of the email triage tool: session, caches, backend
//! gateway and the workflow controller that ties them together.

pub mod cache;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod models;
pub mod session;
pub mod view;

pub use cache::{HistoryCache, ResultCache, Ticket, ViewState};
pub use controller::{Action, Outcome, WorkflowController, validate_submission};
pub use error::{Result, TriageError};
pub use gateway::{Backend, HttpGateway};
pub use session::{BodyKind, Session};
pub use view::{Clipboard, View};
