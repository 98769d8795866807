use chrono::{DateTime, Datelike, Utc};

/// Overrides the clock with a fixed RFC 3339 instant, for reproducible snapshots.
pub const FIXED_TIME_ENV: &str = "STASIS_FIXED_TIME";

pub fn now_utc() -> DateTime<Utc> {
    if let Ok(value) = std::env::var(FIXED_TIME_ENV) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
            return dt.with_timezone(&Utc);
        }
    }
    Utc::now()
}

/// Two-digit year used in actor identifiers.
pub fn short_year(at: DateTime<Utc>) -> u32 {
    at.year().rem_euclid(100) as u32
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DDTHH:MM:SS[.ffffff][Z]` shapes that
/// upstream feeds tend to emit. Naive values are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    chrono::NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
