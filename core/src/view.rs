//! Presentation seam. The controller pushes snapshots through these traits;
//! implementations only render and never hand state back.

use crate::models::{ClassificationResult, DetailRecord, HistoryEntry};

pub trait View: Send + Sync {
    fn render_loading(&self);

    /// "No result" panel: initial state, after a failed submit, and after the
    /// active email was marked as responded.
    fn render_empty(&self);

    fn render_result(&self, result: &ClassificationResult);

    /// The suggested reply of the shown result changed in place.
    fn render_reply(&self, result: &ClassificationResult);

    fn render_history(&self, entries: &[HistoryEntry], total: u64);

    fn render_detail(&self, record: &DetailRecord);

    /// Transient, non-fatal problem.
    fn render_warning(&self, message: &str);

    /// Transient confirmation.
    fn render_notice(&self, message: &str);
}

/// Destination for `copy reply`.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<(), String>;
}
