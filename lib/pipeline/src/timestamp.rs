use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Whether `raw` is an ISO-8601 date-time, with or without an offset.
pub fn is_iso8601(raw: &str) -> bool {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).is_ok()
        || NAIVE_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(raw, fmt).is_ok())
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Keep a valid draft timestamp, otherwise use `now`.
pub fn normalize_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> String {
    match raw.map(str::trim) {
        Some(ts) if is_iso8601(ts) => ts.to_string(),
        _ => now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
