// 🧭 Session - Adapter between the verifier and whatever displays it
// Owns the Verifier and the History, pushes display events to a sink

use tracing::{debug, info, warn};

use crate::history::{EntryStatus, History, HistoryEntry};
use crate::verifier::{Outcome, Policy, Snapshot, Verifier};

// ============================================================================
// DISPLAY EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    /// Short banner text, e.g. "DUPLICATE TICKET!"
    pub headline: String,
    /// Longer toast text
    pub detail: String,
}

impl StatusMessage {
    pub fn new(level: StatusLevel, headline: impl Into<String>, detail: impl Into<String>) -> Self {
        StatusMessage {
            level,
            headline: headline.into(),
            detail: detail.into(),
        }
    }

    pub fn info(headline: impl Into<String>) -> Self {
        let headline = headline.into();
        Self::new(StatusLevel::Info, headline.clone(), headline)
    }
}

/// What the display collaborator is told
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Recorded(HistoryEntry),
    Counters(Snapshot),
    Cleared,
    Status(StatusMessage),
}

pub trait DisplaySink {
    fn emit(&mut self, event: DisplayEvent);
}

impl DisplaySink for Vec<DisplayEvent> {
    fn emit(&mut self, event: DisplayEvent) {
        self.push(event);
    }
}

/// Sink that drops everything (batch mode)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn emit(&mut self, _event: DisplayEvent) {}
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session<S: DisplaySink> {
    verifier: Verifier,
    history: History,
    sink: S,
}

impl<S: DisplaySink> Session<S> {
    pub fn new(verifier: Verifier, history_limit: usize, sink: S) -> Self {
        info!(
            policy = %verifier.policy(),
            universe = verifier.universe().len(),
            history_limit,
            "verification session started"
        );

        Session {
            verifier,
            history: History::new(history_limit),
            sink,
        }
    }

    /// Verify one raw code from manual entry or the scanner
    ///
    /// Surrounding whitespace is stripped before verification.
    pub fn submit(&mut self, raw: &str) -> Outcome {
        let code = raw.trim();
        let outcome = self.verifier.verify(code);
        let policy = self.verifier.policy();

        debug!(code, outcome = %outcome, "verified code");

        if outcome.records_history() {
            if let Some(status) = EntryStatus::from_outcome(outcome) {
                let entry = HistoryEntry::new(code, status);
                self.history.record(entry.clone());
                self.sink.emit(DisplayEvent::Recorded(entry));
            }
        }

        if outcome.mutates_state() {
            self.sink.emit(DisplayEvent::Counters(self.verifier.snapshot()));
        }

        self.sink.emit(DisplayEvent::Status(StatusMessage::new(
            status_level(outcome),
            headline(policy, outcome),
            outcome.message(policy, code),
        )));

        outcome
    }

    /// Clear the session if the operator confirmed
    ///
    /// Returns whether the reset happened. A declined confirmation leaves
    /// every piece of state untouched and emits nothing.
    pub fn request_reset(&mut self, confirmed: bool) -> bool {
        if !confirmed {
            debug!("reset declined");
            return false;
        }

        self.verifier.reset();
        self.history.clear();
        info!("session history cleared");

        self.sink.emit(DisplayEvent::Cleared);
        self.sink.emit(DisplayEvent::Counters(self.verifier.snapshot()));
        self.sink.emit(DisplayEvent::Status(StatusMessage::info("History cleared")));
        true
    }

    /// Decoder could not start or stopped with an error
    pub fn report_decoder_failure(&mut self, message: &str) {
        warn!(error = message, "decoder failure");
        self.sink.emit(DisplayEvent::Status(StatusMessage::new(
            StatusLevel::Error,
            format!("Error: {}", message),
            format!("Scanner error: {}", message),
        )));
    }

    pub fn notify(&mut self, status: StatusMessage) {
        self.sink.emit(DisplayEvent::Status(status));
    }

    pub fn snapshot(&self) -> Snapshot {
        self.verifier.snapshot()
    }

    pub fn policy(&self) -> Policy {
        self.verifier.policy()
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn status_level(outcome: Outcome) -> StatusLevel {
    match outcome {
        Outcome::Valid => StatusLevel::Success,
        Outcome::EmptyInput => StatusLevel::Warning,
        Outcome::Invalid | Outcome::Duplicate | Outcome::InvalidFormat => StatusLevel::Error,
    }
}

fn headline(policy: Policy, outcome: Outcome) -> String {
    let text = match (policy, outcome) {
        (Policy::Ticket, Outcome::Valid) => "Valid Ticket",
        (Policy::Ticket, Outcome::Duplicate) => "DUPLICATE TICKET!",
        (_, Outcome::InvalidFormat) => "Invalid ticket! Must be 5 digits",
        (Policy::Lookup, Outcome::Valid) => "Valid Serial Number",
        (Policy::Lookup, Outcome::Duplicate) => "DUPLICATE SERIAL NUMBER!",
        (_, Outcome::Invalid) => "Invalid Serial Number",
        (_, Outcome::EmptyInput) => "Enter a serial number",
    };
    text.to_string()
}

// ============================================================================
// TESTS
// ============================================================================
