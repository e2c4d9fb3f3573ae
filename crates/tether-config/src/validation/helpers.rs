//! Shared validation helpers.

use regex::Regex;
use std::sync::OnceLock;

/// Push an error if `value` is outside `[min, max]` (integer).
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

fn ice_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(stun|stuns|turn|turns):\S+$").unwrap_or_else(|_| unreachable!())
    })
}

/// True for `stun:`, `stuns:`, `turn:` and `turns:` URLs.
pub(crate) fn is_ice_url(url: &str) -> bool {
    ice_url_pattern().is_match(url)
}
