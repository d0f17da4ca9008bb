/// Country-code prefixes, tried in this order; only the first match is removed.
const PREFIXES: [&str; 4] = ["+92", "0092", "92", "0"];

pub const PHONE_KEY_LEN: usize = 10;

/// Canonical dedup key for a raw phone number: drop a leading country-code
/// variant, keep digits only, then keep the last ten.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let digits: Vec<char> = stripped.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(PHONE_KEY_LEN);
    digits[start..].iter().collect()
}
