use sha2::{Digest, Sha256};

use crate::core::error::{IntelError, ValidationError};
use crate::core::time::{now_utc, short_year};

pub const ACTOR_CATEGORIES: [&str; 3] = ["APT", "CRM", "HAC"];

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `TA<yy><country>-<category><hash3>` for the current year.
///
/// `hash3` is the uppercased first three hex digits of the name's SHA-256, so IDs differ
/// from those minted by MD5-based tooling for the same name.
pub fn generate_actor_id(name: &str, country_code: &str, category: &str) -> Result<String, IntelError> {
    actor_id_for_year(name, country_code, category, short_year(now_utc()))
}

pub fn actor_id_for_year(
    name: &str,
    country_code: &str,
    category: &str,
    year: u32,
) -> Result<String, IntelError> {
    if !is_country_code(country_code) {
        return Err(ValidationError::Invariant(format!(
            "country code must be ISO 3166-1 alpha-3: {}",
            country_code
        ))
        .into());
    }
    if !ACTOR_CATEGORIES.contains(&category) {
        return Err(ValidationError::Invariant(format!(
            "category must be one of {}: {}",
            ACTOR_CATEGORIES.join("/"),
            category
        ))
        .into());
    }
    let sequence = sha256_hex(name.as_bytes())[..3].to_uppercase();
    Ok(format!(
        "TA{:02}{}-{}{}",
        year % 100,
        country_code,
        category,
        sequence
    ))
}

fn is_country_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
