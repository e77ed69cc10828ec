// 📷 Scan Ingestion - Boundary to the external barcode decoder
// The decoder runs on its own schedule; detections cross over a channel and
// are forwarded into the session synchronously by whoever owns it.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{DisplaySink, Session, StatusMessage};
use crate::verifier::Outcome;

// ============================================================================
// DECODER CONTRACT
// ============================================================================

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("decoder initialization failed: {0}")]
    Init(String),

    #[error("decoder is not available: {0}")]
    Unavailable(String),
}

/// Emitted by a decoder on its own schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// One decoded string per detection
    Detected(String),
    /// Human-readable failure after start
    Failed(String),
}

/// External barcode decoder
///
/// `start` hands the decoder the sending half of the event channel. `stop`
/// must make the decoder cease emitting; it is only called after a
/// successful `start`.
pub trait Decoder: Send {
    fn start(&mut self, events: Sender<ScanEvent>) -> Result<(), DecoderError>;
    fn stop(&mut self);
}

// ============================================================================
// SCANNER
// ============================================================================

/// Owns a decoder and its event subscription
pub struct Scanner {
    decoder: Box<dyn Decoder>,
    events: Option<Receiver<ScanEvent>>,
}

impl Scanner {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Scanner {
            decoder,
            events: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.events.is_some()
    }

    /// Start the decoder; a failure is surfaced as a status message
    ///
    /// Verification state is never touched here. Opening while already
    /// scanning does nothing.
    pub fn open<S: DisplaySink>(&mut self, session: &mut Session<S>) -> bool {
        if self.is_scanning() {
            return true;
        }

        session.notify(StatusMessage::info("Initializing camera..."));

        let (tx, rx) = mpsc::channel();
        match self.decoder.start(tx) {
            Ok(()) => {
                info!("scanner started");
                self.events = Some(rx);
                session.notify(StatusMessage::info(
                    "Scanning... Position barcode within the frame",
                ));
                true
            }
            Err(e) => {
                session.report_decoder_failure(&e.to_string());
                false
            }
        }
    }

    /// Stop the decoder and drop the subscription
    ///
    /// Closing an idle scanner does nothing.
    pub fn close<S: DisplaySink>(&mut self, session: &mut Session<S>) {
        if self.events.take().is_none() {
            return;
        }

        self.decoder.stop();
        info!("scanner stopped");
        session.notify(StatusMessage::info("Scanning stopped"));
    }

    /// Forward every pending detection into the session
    ///
    /// Returns the outcomes in arrival order. A disconnected channel means
    /// the decoder is gone; the scanner is marked idle.
    pub fn poll<S: DisplaySink>(&mut self, session: &mut Session<S>) -> Vec<Outcome> {
        self.forward(session, usize::MAX)
    }

    /// Forward at most one pending detection
    ///
    /// Later detections stay queued until the next poll, or are discarded
    /// by `close`.
    pub fn poll_one<S: DisplaySink>(&mut self, session: &mut Session<S>) -> Option<Outcome> {
        self.forward(session, 1).pop()
    }

    fn forward<S: DisplaySink>(&mut self, session: &mut Session<S>, limit: usize) -> Vec<Outcome> {
        let mut outcomes = Vec::new();

        while outcomes.len() < limit {
            let Some(events) = self.events.as_ref() else {
                break;
            };

            match events.try_recv() {
                Ok(ScanEvent::Detected(code)) => {
                    debug!(code = code.as_str(), "code detected");
                    outcomes.push(session.submit(&code));
                }
                Ok(ScanEvent::Failed(message)) => {
                    session.report_decoder_failure(&message);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("decoder channel closed");
                    self.events = None;
                    self.decoder.stop();
                    session.notify(StatusMessage::info("Scanning stopped"));
                    break;
                }
            }
        }

        outcomes
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        if self.events.take().is_some() {
            self.decoder.stop();
        }
    }
}

// ============================================================================
// REPLAY DECODER
// ============================================================================

/// Emits codes read from a file, one per non-blank line, at a fixed interval
///
/// Stands in for a camera decoder: the codes are "detected" on a background
/// thread, exactly as a real decoder would deliver them.
pub struct ReplayDecoder {
    path: PathBuf,
    interval: Duration,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ReplayDecoder {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        ReplayDecoder {
            path: path.into(),
            interval,
            stop: None,
            worker: None,
        }
    }
}

impl Decoder for ReplayDecoder {
    fn start(&mut self, events: Sender<ScanEvent>) -> Result<(), DecoderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            DecoderError::Init(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let codes: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;

        let worker = thread::Builder::new()
            .name("replay-decoder".to_string())
            .spawn(move || {
                for code in codes {
                    // A stop request or a dropped stop sender ends the replay
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                    if events.send(ScanEvent::Detected(code)).is_err() {
                        return;
                    }
                }
            })
            .map_err(|e| DecoderError::Init(format!("cannot spawn decoder thread: {}", e)))?;

        self.stop = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("replay decoder thread panicked");
            }
        }
    }
}

/// Decoder used when no input source is configured
pub struct UnavailableDecoder {
    reason: String,
}

impl UnavailableDecoder {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableDecoder {
            reason: reason.into(),
        }
    }
}

impl Decoder for UnavailableDecoder {
    fn start(&mut self, _events: Sender<ScanEvent>) -> Result<(), DecoderError> {
        Err(DecoderError::Unavailable(self.reason.clone()))
    }

    fn stop(&mut self) {}
}

// ============================================================================
// TESTS
// ============================================================================
