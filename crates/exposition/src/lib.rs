//! Parser for the pull-based metrics exposition text served by the
//! uptime server.
//!
//! The parser is total: malformed or unrecognized input is dropped line by
//! line, never raised. Only two metric families are meaningful; monitor
//! records are reconstructed by merging partial metric lines keyed on the
//! monitor ID label.

use std::collections::HashMap;

use primitives::{Monitor, MonitorStatus};
use tracing::debug;

/// Metric family carrying the status gauge.
const STATUS_METRIC: &str = "monitor_status";
/// Metric family carrying the response time gauge.
const RESPONSE_TIME_METRIC: &str = "monitor_response_time";

const ID_LABEL: &str = "monitor_id";
const NAME_LABEL: &str = "monitor_name";
const URL_LABEL: &str = "monitor_url";

/// Accumulator for one monitor while its metric lines are being merged.
/// Fields update whenever a matching line carries them (last value wins).
#[derive(Debug, Default)]
struct PartialRecord {
    name: Option<String>,
    url: Option<String>,
    status: Option<MonitorStatus>,
    response_time_ms: Option<f64>,
}

/// Parses exposition text into an ordered monitor list.
///
/// Comment and blank lines are skipped, as are lines that do not match the
/// sample grammar or that carry a non-integer monitor ID. A monitor is only
/// emitted when both its name and URL were observed across the matching
/// lines; output is sorted ascending by ID regardless of input order.
pub fn parse_monitors(text: &str) -> Vec<Monitor> {
    let mut partials: HashMap<i64, PartialRecord> = HashMap::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(sample) = parse_sample_line(line) else { continue };
        if sample.metric != STATUS_METRIC && sample.metric != RESPONSE_TIME_METRIC {
            continue;
        }
        let Some(id) = sample.labels.get(ID_LABEL).and_then(|v| v.parse::<i64>().ok()) else {
            continue;
        };

        let partial = partials.entry(id).or_default();
        if let Some(name) = sample.labels.get(NAME_LABEL) {
            partial.name = Some(name.clone());
        }
        if let Some(url) = sample.labels.get(URL_LABEL) {
            partial.url = Some(url.clone());
        }

        if sample.metric == STATUS_METRIC {
            // Unrecognized or non-integer codes mean "status unknown", not
            // an error; the record itself is kept.
            partial.status =
                sample.value.parse::<i64>().ok().and_then(MonitorStatus::from_code);
        } else {
            // Negative sentinel values pass through unchanged.
            partial.response_time_ms = sample.value.parse::<f64>().ok();
        }
    }

    let mut monitors: Vec<Monitor> = partials
        .into_iter()
        .filter_map(|(id, partial)| {
            let (Some(name), Some(url)) = (partial.name, partial.url) else { return None };
            Some(Monitor {
                id,
                name,
                url,
                status: partial.status,
                response_time_ms: partial.response_time_ms,
            })
        })
        .collect();
    monitors.sort_unstable_by_key(|m| m.id);

    debug!(count = monitors.len(), "parsed monitors from exposition text");
    monitors
}

/// One parsed sample line: `metric{label="value",...} value [timestamp]`
/// or the label-less `metric value [timestamp]`.
#[derive(Debug)]
struct Sample<'a> {
    metric: &'a str,
    labels: HashMap<String, String>,
    value: &'a str,
}

fn parse_sample_line(line: &str) -> Option<Sample<'_>> {
    if let Some(brace) = line.find('{') {
        let metric = &line[..brace];
        if metric.is_empty() {
            return None;
        }
        // The label scanner is quote-aware, so label values containing
        // spaces, commas or '}' do not confuse the split.
        let (labels, consumed) = parse_labels(&line[brace + 1..])?;
        let rest = &line[brace + 1 + consumed..];
        let value = rest.split_ascii_whitespace().next()?;
        Some(Sample { metric, labels, value })
    } else {
        let mut parts = line.split_ascii_whitespace();
        let metric = parts.next()?;
        let value = parts.next()?;
        Some(Sample { metric, labels: HashMap::new(), value })
    }
}

/// Scans a label section like `key="value",k2="v2"}` up to and including the
/// closing brace. Returns the labels and the number of bytes consumed, or
/// `None` when the buffer ends before the brace (unterminated input is
/// swallowed, not raised).
fn parse_labels(s: &str) -> Option<(HashMap<String, String>, usize)> {
    let mut labels = HashMap::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        if bytes[i] == b'}' {
            return Some((labels, i + 1));
        }
        if bytes[i] == b',' {
            i += 1;
            continue;
        }

        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && bytes[i] != b',' && bytes[i] != b'}' {
            i += 1;
        }
        let key = s[key_start..i].trim();
        if i >= bytes.len() || bytes[i] != b'=' {
            // Key without a value; resume at whatever follows.
            continue;
        }
        i += 1;

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'"' {
            return None;
        }
        i += 1;

        let mut value = String::new();
        let mut terminated = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() => {
                    // \" and \\ unescape; any other escaped character passes
                    // through literally after dropping the backslash.
                    let ch = s[i + 1..].chars().next()?;
                    value.push(ch);
                    i += 1 + ch.len_utf8();
                }
                b'"' => {
                    i += 1;
                    terminated = true;
                    break;
                }
                _ => {
                    let ch = s[i..].chars().next()?;
                    value.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        if !terminated {
            // Unterminated quoted value: the line yields nothing.
            return None;
        }

        if !key.is_empty() {
            labels.insert(key.to_owned(), value);
        }
    }
}
