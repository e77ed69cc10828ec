// Ticket Verifier - Core Library
// Exposes all modules for use in the interactive UI, batch mode, and tests

pub mod universe;  // Code universe: generated range or loaded list
pub mod verifier;  // Verifier state: outcomes, counters, seen list
pub mod history;   // Scan history and search filter
pub mod session;   // Adapter: verifier + history + display events
pub mod scanner;   // Decoder boundary and replay decoder
pub mod report;    // Batch check over a list of codes
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use universe::CodeUniverse;
pub use verifier::{is_ticket_code, Counters, Outcome, Policy, Snapshot, Verifier, TICKET_CODE_LEN};
pub use history::{filter, EntryStatus, History, HistoryEntry, SearchFilter};
pub use session::{DisplayEvent, DisplaySink, NullSink, Session, StatusLevel, StatusMessage};
pub use scanner::{Decoder, DecoderError, ReplayDecoder, ScanEvent, Scanner, UnavailableDecoder};
pub use report::{run_check, CheckReport, CheckRow};
pub use config::{Config, ScannerConfig};
pub use logging::{init_logging, LogTarget};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
