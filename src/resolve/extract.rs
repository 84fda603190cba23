use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Field names probed on profile and metadata records, in priority order.
/// First present value wins. Matching ignores case and `_`/`-`/space
/// separators, so `phoneNumber`, `phone_number` and "Phone Number" all hit
/// the same entry.
const PHONE_FIELDS: &[&str] = &["phone", "phonenumber", "cellphone", "mobilephone"];

/// Container key holding the nested personal-info record, probed last.
const PERSONAL_INFO_FIELD: &str = "personalinfo";

/// Phone-shaped text: optional 1-2 digit international prefix, then grouped
/// digit runs in the common 3-3-4 layout. Known best-effort heuristic; an
/// order number that happens to be phone-shaped will match, and first match
/// wins by design.
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,2}[\s.\-]?)?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}").unwrap()
});

fn canon_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lookup<'a>(data: &'a Value, canon: &str) -> Option<&'a Value> {
    data.as_object()?
        .iter()
        .find(|(key, _)| canon_key(key) == canon)
        .map(|(_, value)| value)
}

/// Probe a record for the fixed, ordered phone field names, then the nested
/// personal-info record.
pub fn from_named_fields(data: &Value) -> Option<String> {
    for field in PHONE_FIELDS {
        if let Some(text) = lookup(data, field).and_then(value_as_text) {
            return Some(text);
        }
    }
    let personal = lookup(data, PERSONAL_INFO_FIELD)?;
    for field in PHONE_FIELDS {
        if let Some(text) = lookup(personal, field).and_then(value_as_text) {
            return Some(text);
        }
    }
    None
}

/// Scan any structured question/answer list in the payload for a question
/// whose label mentions a phone number, and take its answer.
pub fn from_survey_answers(data: &Value) -> Option<String> {
    match data {
        Value::Array(items) => items.iter().find_map(|item| {
            question_answer(item).or_else(|| from_survey_answers(item))
        }),
        Value::Object(map) => map.values().find_map(from_survey_answers),
        _ => None,
    }
}

fn question_answer(item: &Value) -> Option<String> {
    let question = lookup(item, "question")
        .or_else(|| lookup(item, "label"))
        .and_then(value_as_text)?;
    let question = question.to_lowercase();
    if !question.contains("phone") && !question.contains("number") {
        return None;
    }
    lookup(item, "answer")
        .or_else(|| lookup(item, "value"))
        .and_then(value_as_text)
}

/// Pull the line texts out of a transcript delivery. The payload is either a
/// bare array of lines or an object wrapping one under `lines`.
pub fn transcript_lines(data: &Value) -> Vec<String> {
    let lines = data
        .as_array()
        .or_else(|| lookup(data, "lines").and_then(Value::as_array));
    let Some(lines) = lines else {
        return Vec::new();
    };
    lines
        .iter()
        .map(|line| match line {
            Value::String(s) => s.clone(),
            other => lookup(other, "text").and_then(value_as_text).unwrap_or_default(),
        })
        .collect()
}

/// First phone-shaped run in the text whose digit count lands in the 10-11
/// range. Runs embedded in longer digit strings are rejected so a 16-digit
/// account number does not yield its first ten digits.
pub fn phone_in_text(text: &str) -> Option<String> {
    for found in PHONE_PATTERN.find_iter(text) {
        let digits = found.as_str().chars().filter(|c| c.is_ascii_digit()).count();
        if !(10..=11).contains(&digits) {
            continue;
        }
        let before = text[..found.start()].chars().next_back();
        let after = text[found.end()..].chars().next();
        if before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        return Some(found.as_str().to_string());
    }
    None
}
