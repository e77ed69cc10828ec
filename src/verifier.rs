// ✅ Verifier State - Classify incoming codes, track duplicates
// Pure logic: no rendering, no decoder, no clock

use crate::universe::CodeUniverse;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Ticket codes are exactly this many ASCII digits
pub const TICKET_CODE_LEN: usize = 5;

// ============================================================================
// POLICY
// ============================================================================

/// How a first-seen code is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Any 5-digit code is a valid ticket; the format check is the validity check
    #[default]
    Ticket,

    /// Any non-blank code is accepted for lookup; valid iff in the universe
    Lookup,
}

impl Policy {
    pub fn name(&self) -> &str {
        match self {
            Policy::Ticket => "ticket",
            Policy::Lookup => "lookup",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ticket" => Ok(Policy::Ticket),
            "lookup" => Ok(Policy::Lookup),
            other => Err(format!("unknown policy '{}' (expected ticket or lookup)", other)),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Classification result of one verification attempt
///
/// Every variant is an expected result, none of them is a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Valid,
    Invalid,
    Duplicate,
    InvalidFormat,
    EmptyInput,
}

impl Outcome {
    pub fn name(&self) -> &str {
        match self {
            Outcome::Valid => "valid",
            Outcome::Invalid => "invalid",
            Outcome::Duplicate => "duplicate",
            Outcome::InvalidFormat => "invalid_format",
            Outcome::EmptyInput => "empty_input",
        }
    }

    /// Whether this outcome produces a history entry
    ///
    /// Only first-sight classifications are recorded. Under `Ticket` the only
    /// first-sight result is `Valid`, so the rule holds for both policies.
    pub fn records_history(&self) -> bool {
        matches!(self, Outcome::Valid | Outcome::Invalid)
    }

    /// Whether this outcome changed counters or the seen list
    pub fn mutates_state(&self) -> bool {
        matches!(self, Outcome::Valid | Outcome::Invalid | Outcome::Duplicate)
    }

    /// Operator-facing message for this outcome
    pub fn message(&self, policy: Policy, code: &str) -> String {
        match (policy, self) {
            (Policy::Ticket, Outcome::Valid) => format!("Ticket {} is valid! Entry granted.", code),
            (Policy::Ticket, Outcome::Duplicate) => {
                format!("Ticket {} has already been scanned!", code)
            }
            (_, Outcome::InvalidFormat) => {
                format!("Ticket code must be exactly {} digits", TICKET_CODE_LEN)
            }
            (Policy::Lookup, Outcome::Valid) => format!("Serial number {} is valid", code),
            (Policy::Lookup, Outcome::Duplicate) => {
                format!("Serial number {} has already been scanned", code)
            }
            (_, Outcome::Invalid) => format!("Serial number {} is invalid", code),
            (_, Outcome::EmptyInput) => "Serial number is required".to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// COUNTERS & SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub valid: u64,
    pub invalid: u64,
    pub duplicate: u64,
}

impl Counters {
    pub fn total(&self) -> u64 {
        self.valid + self.invalid + self.duplicate
    }
}

/// Read-only view of the verifier after some sequence of operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub policy: Policy,
    pub counters: Counters,
    pub total_scanned: usize,
    /// Universe codes not yet verified (lookup policy only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_valid: Option<usize>,
}

// ============================================================================
// VERIFIER
// ============================================================================

pub struct Verifier {
    policy: Policy,
    universe: CodeUniverse,
    seen: Vec<String>,
    seen_index: HashSet<String>,
    counters: Counters,
}

impl Verifier {
    pub fn new(policy: Policy, universe: CodeUniverse) -> Self {
        Verifier {
            policy,
            universe,
            seen: Vec::new(),
            seen_index: HashSet::new(),
            counters: Counters::default(),
        }
    }

    /// Classify `code` and update counters and seen list
    pub fn verify(&mut self, code: &str) -> Outcome {
        match self.policy {
            Policy::Ticket if !is_ticket_code(code) => return Outcome::InvalidFormat,
            Policy::Lookup if code.trim().is_empty() => return Outcome::EmptyInput,
            _ => {}
        }

        if self.seen_index.contains(code) {
            self.counters.duplicate += 1;
            return Outcome::Duplicate;
        }

        self.seen.push(code.to_string());
        self.seen_index.insert(code.to_string());

        let valid = match self.policy {
            Policy::Ticket => true,
            Policy::Lookup => self.universe.contains(code),
        };

        if valid {
            self.counters.valid += 1;
            Outcome::Valid
        } else {
            self.counters.invalid += 1;
            Outcome::Invalid
        }
    }

    /// Clear the seen list and all counters
    pub fn reset(&mut self) {
        self.seen.clear();
        self.seen_index.clear();
        self.counters = Counters::default();
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Codes seen this session, in first-seen order
    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    pub fn has_seen(&self, code: &str) -> bool {
        self.seen_index.contains(code)
    }

    pub fn universe(&self) -> &CodeUniverse {
        &self.universe
    }

    pub fn snapshot(&self) -> Snapshot {
        let remaining_valid = match self.policy {
            Policy::Ticket => None,
            Policy::Lookup => Some(
                self.universe
                    .len()
                    .saturating_sub(self.counters.valid as usize),
            ),
        };

        Snapshot {
            policy: self.policy,
            counters: self.counters,
            total_scanned: self.seen.len(),
            remaining_valid,
        }
    }
}

/// Exactly five ASCII digits
pub fn is_ticket_code(code: &str) -> bool {
    code.len() == TICKET_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// TESTS
// ============================================================================
