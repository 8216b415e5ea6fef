//! Field extraction from OCR text of an Emirates ID card.
//!
//! The scanners work on raw OCR output, which is noisy: labels may be
//! missing, words split or merged, English and Arabic interleaved.

use serde::{Deserialize, Serialize};

/// Nationalities recognised by plain keyword match.
const NATIONALITIES: [&str; 10] = [
    "Filipino",
    "Indian",
    "Pakistani",
    "Bangladeshi",
    "Egyptian",
    "Lebanese",
    "Emirati",
    "Jordanian",
    "Syrian",
    "Nepali",
];

/// Words that end a name run when they follow the `Name` label.
const NAME_STOP_WORDS: [&str; 10] = [
    "nationality",
    "date",
    "birth",
    "sex",
    "gender",
    "expiry",
    "issue",
    "issuing",
    "card",
    "number",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Fields read off one side of the card. Dates are kept as printed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_arabic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
}

/// Extract front-side fields.
pub fn parse_front(text: &str) -> IdFields {
    let mut fields = IdFields {
        id_number: find_id_number(text),
        ..IdFields::default()
    };

    let dates = find_dates(text);
    match dates.as_slice() {
        [] => {}
        [only] => {
            if text.to_ascii_lowercase().contains("exp") {
                fields.expiry_date = Some(only.to_string());
            } else {
                fields.date_of_birth = Some(only.to_string());
            }
        }
        [first, second, ..] => {
            fields.date_of_birth = Some(first.to_string());
            fields.expiry_date = Some(second.to_string());
        }
    }

    fields.name = find_name(text);
    fields.name_arabic = find_arabic_name(text);
    fields.nationality = find_nationality(text);
    fields.gender = find_gender(text);
    fields.issue_date = find_issue_date(text);
    fields
}

/// Extract back-side fields.
pub fn parse_back(text: &str) -> IdFields {
    IdFields {
        card_number: find_card_number(text),
        id_number: find_id_number(text),
        ..IdFields::default()
    }
}

/// Whether `s` is exactly one ID number (`784-XXXX-XXXXXXX-X`, separators
/// optional).
pub fn is_valid_id_number(s: &str) -> bool {
    let b = s.trim().as_bytes();
    matches!(match_id_at(b, 0), Some((_, end)) if end == b.len())
}

/// First ID number in `text`, normalized to dashed form.
pub fn find_id_number(text: &str) -> Option<String> {
    let b = text.as_bytes();
    (0..b.len()).find_map(|i| match_id_at(b, i).map(|(id, _)| id))
}

/// All `D{1,2}[/-]D{1,2}[/-]D{4}` dates, left to right, non-overlapping.
pub fn find_dates(text: &str) -> Vec<&str> {
    let b = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < b.len() {
        match match_date_at(b, i) {
            Some(end) => {
                out.push(&text[i..end]);
                i = end;
            }
            None => i += 1,
        }
    }
    out
}

#[inline]
fn is_sep(c: u8) -> bool {
    c == b'-' || c.is_ascii_whitespace()
}

#[inline]
fn digits_at(b: &[u8], i: usize, n: usize) -> bool {
    i + n <= b.len() && b[i..i + n].iter().all(u8::is_ascii_digit)
}

fn match_id_at(b: &[u8], start: usize) -> Option<(String, usize)> {
    if !b[start..].starts_with(b"784") {
        return None;
    }
    let mut i = start + 3;
    let mut groups = Vec::with_capacity(3);
    for len in [4usize, 7, 1] {
        if i < b.len() && is_sep(b[i]) {
            i += 1;
        }
        if !digits_at(b, i, len) {
            return None;
        }
        groups.push(std::str::from_utf8(&b[i..i + len]).ok()?);
        i += len;
    }
    Some((format!("784-{}", groups.join("-")), i))
}

fn match_date_at(b: &[u8], i: usize) -> Option<usize> {
    let day_month = |at: usize| -> Vec<usize> {
        [2usize, 1]
            .into_iter()
            .filter(|&n| digits_at(b, at, n))
            .map(|n| at + n)
            .filter(|&j| j < b.len() && (b[j] == b'/' || b[j] == b'-'))
            .map(|j| j + 1)
            .collect()
    };
    for j in day_month(i) {
        for k in day_month(j) {
            if digits_at(b, k, 4) {
                return Some(k + 4);
            }
        }
    }
    None
}

fn is_name_word(w: &str) -> bool {
    let mut chars = w.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_uppercase()
        && w.len() >= 2
        && chars.all(|c| c.is_ascii_alphabetic())
        && !NAME_STOP_WORDS.contains(&w.to_ascii_lowercase().as_str())
}

fn name_run<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<String> {
    let words: Vec<&str> = tokens.take_while(|w| is_name_word(w)).collect();
    (words.len() >= 2).then(|| words.join(" "))
}

fn find_name(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, tok) in tokens.iter().enumerate() {
        let label = tok.trim_end_matches(':');
        if label.eq_ignore_ascii_case("name") || label == "اسم" {
            let rest = tokens[i + 1..]
                .iter()
                .copied()
                .skip_while(|t| *t == ":");
            if let Some(name) = name_run(rest) {
                return Some(name);
            }
        }
    }
    name_run(tokens.into_iter())
}

#[inline]
fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

fn find_arabic_name(text: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    for run in text.split(|c: char| !(is_arabic(c) || c.is_whitespace())) {
        let run = run.trim();
        if best.is_none_or(|b| run.chars().count() > b.chars().count()) {
            best = Some(run);
        }
    }
    best.filter(|b| b.chars().count() > 3).map(str::to_string)
}

fn find_nationality(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    NATIONALITIES
        .iter()
        .find(|n| lower.contains(&n.to_lowercase()))
        .map(|n| n.to_string())
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

fn find_gender(text: &str) -> Option<Gender> {
    let has = |options: &[&str]| {
        words(text).any(|w| options.iter().any(|o| w.to_lowercase() == *o))
    };
    if has(&["male", "m", "ذكر"]) {
        Some(Gender::Male)
    } else if has(&["female", "f", "أنثى"]) {
        Some(Gender::Female)
    } else {
        None
    }
}

fn find_issue_date(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let b = lower.as_bytes();
    for label in ["issued", "issue", "الإصدار"] {
        for (pos, _) in lower.match_indices(label) {
            let mut i = pos + label.len();
            let gap = i;
            while i < b.len() && (b[i] == b':' || b[i].is_ascii_whitespace()) {
                i += 1;
            }
            if i == gap {
                continue;
            }
            if let Some(end) = match_date_at(b, i) {
                return Some(text[i..end].to_string());
            }
        }
    }
    None
}

fn find_card_number(text: &str) -> Option<String> {
    words(text)
        .filter(|w| w.len() >= 9 && w.bytes().all(|c| c.is_ascii_digit()))
        .fold(None::<&str>, |best, w| match best {
            Some(b) if b.len() >= w.len() => Some(b),
            _ => Some(w),
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONT: &str = "United Arab Emirates Resident Identity Card \
        ID Number 784-1990-1234567-1 Name: Ahmed Khan Nationality: Pakistani \
        Date of Birth 12/03/1990 Sex: M Expiry Date 05/11/2027 محمد احمد خان";

    #[test]
    fn front_fields_are_extracted() {
        let f = parse_front(FRONT);
        assert_eq!(f.id_number.as_deref(), Some("784-1990-1234567-1"));
        assert_eq!(f.name.as_deref(), Some("Ahmed Khan"));
        assert_eq!(f.nationality.as_deref(), Some("Pakistani"));
        assert_eq!(f.gender, Some(Gender::Male));
        assert_eq!(f.date_of_birth.as_deref(), Some("12/03/1990"));
        assert_eq!(f.expiry_date.as_deref(), Some("05/11/2027"));
        assert_eq!(f.name_arabic.as_deref(), Some("محمد احمد خان"));
    }

    #[test]
    fn id_number_separators_are_optional_and_normalized() {
        assert_eq!(
            find_id_number("no 784 1985 7654321 9 here").as_deref(),
            Some("784-1985-7654321-9")
        );
        assert_eq!(
            find_id_number("x784198576543219").as_deref(),
            Some("784-1985-7654321-9")
        );
        assert_eq!(find_id_number("785-1985-7654321-9"), None);
        assert!(is_valid_id_number("784-1985-7654321-9"));
        assert!(!is_valid_id_number("784-1985-7654321-99"));
        assert!(!is_valid_id_number("784-1985-765432-9"));
    }

    #[test]
    fn single_date_is_expiry_only_with_expiry_context() {
        let f = parse_front("Card Exp 01-02-2030");
        assert_eq!(f.expiry_date.as_deref(), Some("01-02-2030"));
        assert_eq!(f.date_of_birth, None);

        let f = parse_front("Born 1/2/1988");
        assert_eq!(f.date_of_birth.as_deref(), Some("1/2/1988"));
        assert_eq!(f.expiry_date, None);
    }

    #[test]
    fn dates_match_leftmost_and_do_not_overlap() {
        assert_eq!(find_dates("123/4/20201 and 7-8-1999"), vec!["23/4/2020", "7-8-1999"]);
        assert!(find_dates("12/2020").is_empty());
    }

    #[test]
    fn issue_date_follows_label() {
        let f = parse_front("Issued: 14/06/2022 Expiry 13/06/2027");
        assert_eq!(f.issue_date.as_deref(), Some("14/06/2022"));
        assert_eq!(find_issue_date("issuedate 14/06/2022"), None);
    }

    #[test]
    fn name_falls_back_to_leading_words() {
        assert_eq!(find_name("Sara Ali Hassan 784").as_deref(), Some("Sara Ali Hassan"));
        assert_eq!(find_name("Resident 12"), None);
    }

    #[test]
    fn gender_matches_whole_words_only() {
        assert_eq!(find_gender("Sex: Female"), Some(Gender::Female));
        assert_eq!(find_gender("Sex F"), Some(Gender::Female));
        assert_eq!(find_gender("الجنس ذكر"), Some(Gender::Male));
        assert_eq!(find_gender("formal"), None);
    }

    #[test]
    fn back_takes_longest_digit_run_as_card_number() {
        let f = parse_back("Card Number 123456789 ref 12345678901 ILARE<<<<<<<<");
        assert_eq!(f.card_number.as_deref(), Some("12345678901"));
        assert_eq!(f.id_number, None);

        let f = parse_back("short 12345678 only");
        assert_eq!(f.card_number, None);
    }
}
