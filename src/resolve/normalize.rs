/// Canonicalize a raw phone candidate into dialable form.
///
/// A string already carrying a leading plus keeps the plus and its digits;
/// anything else is reduced to digits, then 10-digit numbers get the NANP
/// country code and 11-digit numbers starting with 1 get a plus. Whatever is
/// left just gets a plus prefixed. Pure and idempotent: normalizing its own
/// output is a no-op.
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix('+') {
        let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
        return format!("+{}", digits);
    }
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        format!("+1{}", digits)
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{}", digits)
    } else {
        format!("+{}", digits)
    }
}
