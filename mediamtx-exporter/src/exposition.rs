//! Rendering of a [`Snapshot`] in Prometheus exposition format.

use std::fmt::Write;

use crate::snapshot::{SampleValue, Snapshot};

const BANNER: &str = "# MediaMTX metrics exported by mediamtx-exporter\n\
# HELP mediamtx_exporter_up Exporter status (1=up, 0=down)\n\
# TYPE mediamtx_exporter_up gauge\n";

/// Body served when the last refresh produced no data.
pub const DOWN_STANZA: &str = "# MediaMTX metrics exported by mediamtx-exporter\n\
# HELP mediamtx_exporter_up Exporter status (1=up, 0=down)\n\
# TYPE mediamtx_exporter_up gauge\n\
mediamtx_exporter_up 0\n\
# HELP mediamtx_exporter_scrape_duration_seconds Time spent scraping MediaMTX\n\
# TYPE mediamtx_exporter_scrape_duration_seconds gauge\n\
mediamtx_exporter_scrape_duration_seconds 0\n";

/// Replace the characters MediaMTX uses in names that Prometheus rejects.
///
/// Only `-` and `.` are substituted; anything else is passed through as is.
pub fn sanitize_metric_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// Format a sample value.
///
/// Integral floats keep a trailing `.0` so a value reads back the same way it
/// was scraped.
pub fn format_value(value: &SampleValue) -> String {
    match value {
        SampleValue::Number(v) if v.is_nan() => "NaN".to_string(),
        SampleValue::Number(v) if v.is_infinite() => {
            if v.is_sign_positive() {
                "+Inf".to_string()
            } else {
                "-Inf".to_string()
            }
        }
        SampleValue::Number(v) => format!("{:?}", v),
        SampleValue::Text(s) => s.clone(),
    }
}

/// Render a snapshot.
///
/// Labeled samples are written back verbatim; unlabeled ones get a
/// HELP/TYPE/value triple under their sanitized name.
pub fn render(snapshot: &Snapshot) -> Result<String, std::fmt::Error> {
    if snapshot.is_empty() {
        return Ok(DOWN_STANZA.to_string());
    }

    let mut output = String::with_capacity(BANNER.len() + snapshot.len() * 100);
    output.push_str(BANNER);
    writeln!(output, "mediamtx_exporter_up 1")?;

    for (key, value) in snapshot.iter() {
        if key.is_labeled() {
            writeln!(output, "{}", key)?;
            continue;
        }

        let clean = sanitize_metric_name(key.as_str());
        writeln!(output, "# HELP {} MediaMTX metric: {}", clean, key)?;
        writeln!(output, "# TYPE {} gauge", clean)?;
        writeln!(output, "{} {}", clean, format_value(value))?;
    }

    Ok(output)
}
