// 📋 Batch Check - Verify a list of codes in one session and report
// One CSV row per input line, plus a summary of the final counters

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufRead, Write};

use crate::session::{DisplaySink, Session};
use crate::verifier::{Outcome, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRow {
    pub line: usize,
    pub code: String,
    pub outcome: Outcome,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub rows: Vec<CheckRow>,
    pub summary: Snapshot,
}

impl CheckReport {
    /// Rows as CSV with a `line,code,outcome,message` header
    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        for row in &self.rows {
            writer.serialize(row).context("Failed to write report row")?;
        }
        writer.flush().context("Failed to flush report")?;
        Ok(())
    }

    pub fn summary_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.summary)?)
    }

    pub fn summary_line(&self) -> String {
        let c = self.summary.counters;
        let mut line = format!(
            "{} codes checked ({} policy): {} valid, {} invalid, {} duplicate, {} rejected",
            self.rows.len(),
            self.summary.policy,
            c.valid,
            c.invalid,
            c.duplicate,
            self.rejected(),
        );
        if let Some(remaining) = self.summary.remaining_valid {
            line.push_str(&format!(", {} remaining", remaining));
        }
        line
    }

    /// Rows that never reached the seen list
    pub fn rejected(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| !row.outcome.mutates_state())
            .count()
    }
}

/// Verify every line of `input` in order
///
/// Blank lines are verified too: under the lookup policy they count as
/// empty input, matching manual entry.
pub fn run_check<R: BufRead, S: DisplaySink>(
    session: &mut Session<S>,
    input: R,
) -> Result<CheckReport> {
    let mut rows = Vec::new();
    let policy = session.policy();

    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", index + 1))?;
        let code = line.trim().to_string();
        let outcome = session.submit(&code);

        rows.push(CheckRow {
            line: index + 1,
            message: outcome.message(policy, &code),
            code,
            outcome,
        });
    }

    Ok(CheckReport {
        rows,
        summary: session.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NullSink;
    use crate::universe::CodeUniverse;
    use crate::verifier::{Policy, Verifier};
    use std::io::Cursor;

    fn session(policy: Policy) -> Session<NullSink> {
        Session::new(
            Verifier::new(policy, CodeUniverse::from_range(1, 20000, 5)),
            100,
            NullSink,
        )
    }

    #[test]
    fn test_check_lookup_list() {
        let mut session = session(Policy::Lookup);
        let input = Cursor::new("20000\n20001\n20001\n\n");

        let report = run_check(&mut session, input).unwrap();
        let outcomes: Vec<Outcome> = report.rows.iter().map(|r| r.outcome).collect();

        assert_eq!(
            outcomes,
            vec![
                Outcome::Valid,
                Outcome::Invalid,
                Outcome::Duplicate,
                Outcome::EmptyInput
            ]
        );
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.summary.remaining_valid, Some(19999));
    }

    #[test]
    fn test_csv_output() {
        let mut session = session(Policy::Ticket);
        let report = run_check(&mut session, Cursor::new("00007\n123\n")).unwrap();

        let mut out = Vec::new();
        report.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "line,code,outcome,message");
        assert_eq!(lines[1], "1,00007,valid,Ticket 00007 is valid! Entry granted.");
        assert_eq!(lines[2], "2,123,invalid_format,Ticket code must be exactly 5 digits");
    }

    #[test]
    fn test_summary_line() {
        let mut session = session(Policy::Ticket);
        let report = run_check(&mut session, Cursor::new("00001\n00001\nx\n")).unwrap();

        assert_eq!(
            report.summary_line(),
            "3 codes checked (ticket policy): 1 valid, 0 invalid, 1 duplicate, 1 rejected"
        );
    }

    #[test]
    fn test_summary_json() {
        let mut session = session(Policy::Lookup);
        let report = run_check(&mut session, Cursor::new("00001\n")).unwrap();

        let value: serde_json::Value = serde_json::from_str(&report.summary_json().unwrap()).unwrap();
        assert_eq!(value["policy"], "lookup");
        assert_eq!(value["counters"]["valid"], 1);
        assert_eq!(value["total_scanned"], 1);
    }
}
