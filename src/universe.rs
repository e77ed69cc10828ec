// 🎫 Code Universe - The fixed set of codes considered valid
// Generated once at startup from a numeric range, or loaded from a file

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// CODE UNIVERSE
// ============================================================================

/// Ordered, immutable set of valid codes
///
/// Order is kept for display and export; lookups go through the hash index.
#[derive(Debug, Clone)]
pub struct CodeUniverse {
    codes: Vec<String>,
    index: HashSet<String>,
}

impl CodeUniverse {
    /// Zero-padded codes for every number in `start..=end`
    ///
    /// `from_range(1, 20000, 5)` yields "00001" through "20000".
    pub fn from_range(start: u64, end: u64, width: usize) -> Self {
        let codes: Vec<String> = (start..=end)
            .map(|n| format!("{:0width$}", n, width = width))
            .collect();
        Self::from_codes(codes)
    }

    /// Build from an explicit list, dropping blanks and repeated entries
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashSet::new();

        for code in codes {
            let code: String = code.into();
            let code = code.trim().to_string();
            if code.is_empty() {
                continue;
            }
            if index.insert(code.clone()) {
                ordered.push(code);
            }
        }

        CodeUniverse {
            codes: ordered,
            index,
        }
    }

    /// Load codes from a file
    ///
    /// The first column of each record is taken as the code, so both a plain
    /// one-code-per-line list and a CSV export work. A leading header row
    /// ("code", "serial", "serial_number", "ticket") is skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open universe file {}", path.display()))?;

        let mut codes = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Failed to read {} at record {}", path.display(), line + 1))?;

            let Some(first) = record.get(0) else {
                continue;
            };

            if line == 0 && is_header(first) {
                continue;
            }

            codes.push(first.to_string());
        }

        let universe = Self::from_codes(codes);
        if universe.is_empty() {
            return Err(anyhow!("Universe file {} contains no codes", path.display()));
        }

        Ok(universe)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

fn is_header(field: &str) -> bool {
    matches!(
        field.to_lowercase().as_str(),
        "code" | "codes" | "serial" | "serial_number" | "ticket"
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_range_is_zero_padded() {
        let universe = CodeUniverse::from_range(1, 20000, 5);

        assert_eq!(universe.len(), 20000);
        assert_eq!(universe.iter().next(), Some("00001"));
        assert_eq!(universe.iter().last(), Some("20000"));
        assert!(universe.contains("00042"));
        assert!(!universe.contains("42"));
        assert!(!universe.contains("20001"));
    }

    #[test]
    fn test_from_codes_skips_blanks_and_repeats() {
        let universe = CodeUniverse::from_codes(vec!["A1", " ", "B2", "A1", " C3 "]);

        let codes: Vec<&str> = universe.iter().collect();
        assert_eq!(codes, vec!["A1", "B2", "C3"]);
    }

    #[test]
    fn test_from_file_plain_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00010").unwrap();
        writeln!(file, "00011").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "00012").unwrap();

        let universe = CodeUniverse::from_file(file.path()).unwrap();
        assert_eq!(universe.len(), 3);
        assert!(universe.contains("00011"));
    }

    #[test]
    fn test_from_file_csv_with_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,holder").unwrap();
        writeln!(file, "00100,Ada").unwrap();
        writeln!(file, "00101,Grace").unwrap();

        let universe = CodeUniverse::from_file(file.path()).unwrap();
        assert_eq!(universe.len(), 2);
        assert!(universe.contains("00100"));
        assert!(!universe.contains("code"));
    }

    #[test]
    fn test_from_file_empty_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(CodeUniverse::from_file(file.path()).is_err());
    }

    #[test]
    fn test_from_file_missing_is_error() {
        let result = CodeUniverse::from_file(Path::new("/nonexistent/codes.csv"));
        assert!(result.is_err());
    }
}
