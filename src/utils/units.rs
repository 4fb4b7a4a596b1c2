//! Unit conversion utilities

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Case-insensitive substring test.
///
/// An empty needle never matches, so a rule can't be satisfied by accident.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// True if `haystack` contains any of `needles`, ignoring ASCII case.
pub fn contains_any_ignore_case(haystack: &str, needles: &[&str]) -> bool {
    needles
        .iter()
        .any(|needle| contains_ignore_case(haystack, needle))
}

/// Normalize a byte-sized value to bytes based on its unit string.
///
/// "kb", "mb" and "gb" anywhere in `units` scale by 1024, 1024² and 1024³,
/// checked in that order. Anything else passes through unchanged.
pub fn apply_unit_scale(value: f64, units: &str) -> f64 {
    if contains_ignore_case(units, "kb") {
        value * KIB
    } else if contains_ignore_case(units, "mb") {
        value * MIB
    } else if contains_ignore_case(units, "gb") {
        value * GIB
    } else {
        value
    }
}
