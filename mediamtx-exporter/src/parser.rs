//! Parser for the Prometheus text exposition format served by MediaMTX.
//!
//! Parsing is best-effort per line: a malformed line is logged and skipped,
//! it never aborts the batch.

use thiserror::Error;
use tracing::debug;

use crate::snapshot::{SampleKey, SampleValue, Snapshot};

/// Reasons a sample line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("unbalanced label braces")]
    UnbalancedBraces,
    #[error("missing metric name before label set")]
    EmptyName,
    #[error("missing value after label set")]
    MissingValue,
    #[error("expected 2 whitespace-separated tokens, found {0}")]
    TokenCount(usize),
}

/// Result of parsing one exposition body.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Samples that parsed successfully.
    pub snapshot: Snapshot,
    /// Number of sample lines accepted (duplicates included).
    pub parsed: usize,
    /// Number of malformed lines skipped.
    pub skipped: usize,
}

/// Parse a raw exposition body into a snapshot.
pub fn parse(text: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for (idx, raw) in text.lines().enumerate() {
        match parse_line(raw) {
            Ok(Some((key, value))) => {
                report.snapshot.insert(key, value);
                report.parsed += 1;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(line = idx + 1, reason = %e, text = raw, "Skipping malformed metric line");
                report.skipped += 1;
            }
        }
    }

    report
}

/// Parse a single line.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(raw: &str) -> Result<Option<(SampleKey, SampleValue)>, LineError> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    if line.contains('{') || line.contains('}') {
        parse_labeled(line).map(Some)
    } else {
        parse_unlabeled(line).map(Some)
    }
}

/// `name{label="v",...} value`; the key is the whole line.
fn parse_labeled(line: &str) -> Result<(SampleKey, SampleValue), LineError> {
    let (open, close) = match (line.find('{'), line.rfind('}')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return Err(LineError::UnbalancedBraces),
    };

    if line[..open].trim().is_empty() {
        return Err(LineError::EmptyName);
    }

    let value = line[close + 1..].trim();
    if value.is_empty() {
        return Err(LineError::MissingValue);
    }

    Ok((SampleKey::new(line), SampleValue::parse(value)))
}

/// `name value`
fn parse_unlabeled(line: &str) -> Result<(SampleKey, SampleValue), LineError> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(name), Some(value), None) => Ok((SampleKey::new(name), SampleValue::parse(value))),
        _ => Err(LineError::TokenCount(line.split_whitespace().count())),
    }
}
