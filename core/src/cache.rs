//! In-memory holders for the active classification and the history listing.
//!
//! Both caches are replaced wholesale. Every request that may write to a
//! cache is issued a ticket carrying a sequence number; a completion is only
//! applied while its ticket is still the newest one for that slot, so a slow
//! response can never overwrite a more recently issued one.

use serde::Serialize;

use crate::models::{ClassificationResult, EmailId, HistoryEntry, HistoryPage};

/// What the result panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum ViewState {
    Empty,
    Loading,
    Result(ClassificationResult),
    Error,
}

/// Sequence number handed out per classify or history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Debug, Default)]
pub struct ResultCache {
    state: ResultSlot,
    next_seq: u64,
    latest_submit: Option<Ticket>,
    latest_reply: Option<Ticket>,
}

#[derive(Debug, Default)]
enum ResultSlot {
    #[default]
    Empty,
    Loading,
    Ready(ClassificationResult),
    Failed,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket(self.next_seq)
    }

    pub fn snapshot(&self) -> ViewState {
        match &self.state {
            ResultSlot::Empty => ViewState::Empty,
            ResultSlot::Loading => ViewState::Loading,
            ResultSlot::Ready(result) => ViewState::Result(result.clone()),
            ResultSlot::Failed => ViewState::Error,
        }
    }

    pub fn current(&self) -> Option<&ClassificationResult> {
        match &self.state {
            ResultSlot::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Starts a new submission. The panel switches to loading and whatever
    /// record was shown stops being actionable.
    pub fn begin_submit(&mut self) -> Ticket {
        let ticket = self.issue();
        self.latest_submit = Some(ticket);
        self.state = ResultSlot::Loading;
        ticket
    }

    /// Applies a classify completion. Returns `false` if a newer submission
    /// was issued in the meantime and the result was dropped.
    pub fn complete_submit(&mut self, ticket: Ticket, result: ClassificationResult) -> bool {
        if self.latest_submit != Some(ticket) {
            return false;
        }
        self.state = ResultSlot::Ready(result);
        true
    }

    /// Marks the newest submission as failed. Stale failures are ignored.
    pub fn fail_submit(&mut self, ticket: Ticket) -> bool {
        if self.latest_submit != Some(ticket) {
            return false;
        }
        self.state = ResultSlot::Failed;
        true
    }

    /// Reserves a ticket for a reply regeneration against the active record.
    pub fn begin_regenerate(&mut self) -> Ticket {
        let ticket = self.issue();
        self.latest_reply = Some(ticket);
        ticket
    }

    /// Whether a regeneration under `ticket` still targets the active record.
    pub fn reply_is_current(&self, ticket: Ticket, id: &EmailId) -> bool {
        self.latest_reply == Some(ticket) && self.current().is_some_and(|r| &r.id == id)
    }

    /// Replaces only the suggested reply, and only when the record with
    /// `id` is still active and no newer regeneration was issued.
    pub fn complete_regenerate(&mut self, ticket: Ticket, id: &EmailId, reply: String) -> bool {
        if !self.reply_is_current(ticket, id) {
            return false;
        }
        match &mut self.state {
            ResultSlot::Ready(result) if &result.id == id => {
                result.suggested_reply = reply;
                true
            }
            _ => false,
        }
    }

    /// Discards the active record if it is still the one with `id`.
    pub fn discard(&mut self, id: &EmailId) -> bool {
        match &self.state {
            ResultSlot::Ready(result) if &result.id == id => {
                self.state = ResultSlot::Empty;
                true
            }
            _ => false,
        }
    }

    /// Forgets everything, including in-flight tickets.
    pub fn reset(&mut self) {
        self.state = ResultSlot::Empty;
        self.latest_submit = None;
        self.latest_reply = None;
    }
}

#[derive(Debug, Default)]
pub struct HistoryCache {
    page: HistoryPage,
    next_seq: u64,
    latest: Option<Ticket>,
    latest_detail: Option<Ticket>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket(self.next_seq)
    }

    pub fn begin_refresh(&mut self) -> Ticket {
        let ticket = self.issue();
        self.latest = Some(ticket);
        ticket
    }

    /// Reserves a ticket for a detail lookup. Only the newest lookup renders.
    pub fn begin_detail(&mut self) -> Ticket {
        let ticket = self.issue();
        self.latest_detail = Some(ticket);
        ticket
    }

    pub fn is_latest_detail(&self, ticket: Ticket) -> bool {
        self.latest_detail == Some(ticket)
    }

    /// Replaces the listing wholesale if `ticket` is still the newest refresh.
    pub fn replace(&mut self, ticket: Ticket, page: HistoryPage) -> bool {
        if self.latest != Some(ticket) {
            return false;
        }
        self.page = page;
        true
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.page.entries
    }

    pub fn total(&self) -> u64 {
        self.page.total
    }

    pub fn page(&self) -> &HistoryPage {
        &self.page
    }

    /// Resolves a position against the listing held right now.
    pub fn get(&self, position: usize) -> Option<&HistoryEntry> {
        self.page.entries.get(position)
    }

    pub fn reset(&mut self) {
        self.page = HistoryPage::default();
        self.latest = None;
        self.latest_detail = None;
    }
}
