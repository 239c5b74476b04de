// Free-text field extraction over the whole-page OCR output.
//
// Each field is read by an ordered rule table: the first rule whose
// post-processor accepts a match wins. Fields are independent; a field that
// finds nothing is simply left empty.

use crate::models::{Sex, TextFields};
use crate::processing::mrz::contains_header_vocabulary;
use crate::processing::transliteration::{count_cyrillic, count_latin, count_vowels};
use crate::utils::is_similar;
use crate::validation::{FormatValidator, IinValidator};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// One extraction rule: a pattern plus the post-processor that turns a
/// match into a value, or rejects it.
pub struct ExtractionRule<T> {
    pub pattern: Regex,
    pub extract: fn(&Captures) -> Option<T>,
}

impl<T> ExtractionRule<T> {
    fn new(pattern: &str, extract: fn(&Captures) -> Option<T>) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            extract,
        }
    }
}

/// Evaluate rules in order over every match; the first accepted value wins.
pub fn first_match<T>(rules: &[ExtractionRule<T>], text: &str) -> Option<T> {
    rules.iter().find_map(|rule| {
        rule.pattern
            .captures_iter(text)
            .find_map(|caps| (rule.extract)(&caps))
    })
}

fn group(caps: &Captures, idx: usize) -> String {
    caps.get(idx).map(|m| m.as_str().to_uppercase()).unwrap_or_default()
}

fn doc_with_n_prefix(caps: &Captures) -> Option<String> {
    Some(format!("N{}", group(caps, 1)))
}

fn doc_after_numero(caps: &Captures) -> Option<String> {
    let raw = group(caps, 1);
    if raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("N{}", raw))
    } else {
        Some(raw)
    }
}

fn doc_with_digits(caps: &Captures) -> Option<String> {
    let raw = group(caps, 1);
    raw.chars().any(|c| c.is_ascii_digit()).then_some(raw)
}

fn date_from_groups(caps: &Captures) -> Option<NaiveDate> {
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn sex_from_marker(caps: &Captures) -> Option<Sex> {
    let marker = caps.get(1)?.as_str().chars().next()?;
    let sex = Sex::from_marker(marker);
    sex.is_known().then_some(sex)
}

fn female_word(_: &Captures) -> Option<Sex> {
    Some(Sex::Female)
}

fn male_word(_: &Captures) -> Option<Sex> {
    Some(Sex::Male)
}

fn country_code(caps: &Captures) -> Option<String> {
    let code = match group(caps, 1).as_str() {
        "UZBEKISTAN" | "УЗБЕКИСТАН" | "O'ZBEKISTON" => "UZB",
        "KAZAKHSTAN" | "КАЗАХСТАН" | "ҚАЗАҚСТАН" => "KAZ",
        "KYRGYZSTAN" | "КЫРГЫЗСТАН" => "KGZ",
        "TAJIKISTAN" | "ТАДЖИКИСТАН" => "TJK",
        "TURKMENISTAN" | "ТУРКМЕНИСТАН" => "TKM",
        _ => return None,
    };
    Some(code.to_string())
}

fn whole_match(caps: &Captures) -> Option<String> {
    caps.get(1).map(|m| m.as_str().trim().to_string())
}

lazy_static! {
    static ref IIN_PATTERN: Regex = Regex::new(r"\b(\d{12})\b").unwrap();

    static ref BARE_DATE: Regex =
        Regex::new(r"\b(\d{2})[./-](\d{2})[./-](\d{4})\b").unwrap();

    static ref DOCUMENT_NUMBER_RULES: Vec<ExtractionRule<String>> = vec![
        // Kazakh: N + 8 digits
        ExtractionRule::new(r"\bN\s?(\d{8})\b", doc_with_n_prefix),
        ExtractionRule::new(r"№\s*([A-Za-z0-9]{8,9})\b", doc_after_numero),
        ExtractionRule::new(r"(?i)PASSPORT[^A-Za-z0-9\n]*\n?[^A-Za-z0-9\n]*([A-Za-z0-9]{8,9})\b", doc_with_digits),
        // Uzbek and Kyrgyz: two letters + 7 digits
        ExtractionRule::new(r"\b([A-Z]{2}\d{7})\b", doc_with_digits),
    ];

    static ref BIRTH_DATE_RULES: Vec<ExtractionRule<NaiveDate>> = vec![
        ExtractionRule::new(
            r"(?i)(?:DATE\s*OF\s*BIRTH|ТУҒАН\s*КҮНІ|ДАТА\s*РОЖДЕНИЯ|TUG'?ILGAN\s*SANASI)[^\d]{0,40}?(\d{2})[.\s/-](\d{2})[.\s/-](\d{4})",
            date_from_groups,
        ),
    ];

    static ref EXPIRY_DATE_RULES: Vec<ExtractionRule<NaiveDate>> = vec![
        ExtractionRule::new(
            r"(?i)(?:DATE\s*OF\s*EXPIRY|EXPIRY\s*DATE|VALID\s*UNTIL|ЖАРАМДЫЛЫҚ\s*МЕРЗІМІ|СРОК\s*ДЕЙСТВИЯ|AMAL\s*QILISH\s*MUDDATI)[^\d]{0,40}?(\d{2})[.\s/-](\d{2})[.\s/-](\d{4})",
            date_from_groups,
        ),
    ];

    // Bare single letters are not trusted; only labelled markers and full words
    static ref SEX_RULES: Vec<ExtractionRule<Sex>> = vec![
        ExtractionRule::new(r"(?i)\b(?:SEX|ЖЫНЫСЫ|ПОЛ)[\s:/]*([MFМЖ])\b", sex_from_marker),
        ExtractionRule::new(r"(?i)\bFEMALE\b", female_word),
        ExtractionRule::new(r"(?i)\bMALE\b", male_word),
    ];

    static ref NATIONALITY_RULES: Vec<ExtractionRule<String>> = vec![
        ExtractionRule::new(
            r"(?i)\b(UZBEKISTAN|O'ZBEKISTON|УЗБЕКИСТАН|KAZAKHSTAN|КАЗАХСТАН|ҚАЗАҚСТАН|KYRGYZSTAN|КЫРГЫЗСТАН|TAJIKISTAN|ТАДЖИКИСТАН|TURKMENISTAN|ТУРКМЕНИСТАН)\b",
            country_code,
        ),
    ];

    static ref PHONE_RULES: Vec<ExtractionRule<String>> = vec![
        ExtractionRule::new(
            r"(?:^|[^\d+])((?:\+7|8)\s?\(?\d{3}\)?\s?\d{3}[\s-]?\d{2}[\s-]?\d{2})(?:[^\d]|$)",
            whole_match,
        ),
    ];

    static ref SURNAME_LABEL: Regex =
        Regex::new(r"(?i)\b(?:SURNAME|ФАМИЛИЯ|ТЕГІ|ТЕГI|FAMILIYASI|FAMILIYA)\b").unwrap();
    static ref GIVEN_NAME_LABEL: Regex =
        Regex::new(r"(?i)\b(?:GIVEN\s*NAMES?|ИМЯ|АТЫ|ISMI)\b").unwrap();
    static ref PATRONYMIC_LABEL: Regex =
        Regex::new(r"(?i)\b(?:ӘКЕСІНІҢ|ОТЧЕСТВО|PATRONYMIC|OTASINING)\b").unwrap();
    /// Any field label; a candidate value never contains one.
    static ref ANY_LABEL: Regex = Regex::new(
        r"(?i)\b(?:SURNAME|ФАМИЛИЯ|ТЕГІ|FAMILIYASI|GIVEN|NAMES?|ИМЯ|АТЫ|ISMI|ОТЧЕСТВО|ӘКЕСІНІҢ|DATE|BIRTH|ТУҒАН|КҮНІ|ДАТА|РОЖДЕНИЯ|SEX|ПОЛ|ЖЫНЫСЫ|NATIONALITY|ҰЛТЫ|НАЦИОНАЛЬНОСТЬ|PLACE|ISSUE|EXPIRY|AUTHORITY)\b"
    ).unwrap();
}

/// Words that mark a line as institutional print rather than a name.
const INSTITUTIONAL_KEYWORDS: &[&str] = &[
    "TYPE", "TYPI", "PASSPORT", "CODE", "STATE", "GIVEN", "NAMES", "DATE", "BIRTH", "PLACE",
    "ISSUE", "EXPIRY", "AUTHORITY", "MINISTRY", "INTERNAL", "AFFAIRS", "KAZAKHSTAN",
    "REPUBLIC", "NATIONALITY", "SURNAME", "SEX",
];

/// Tokens OCR lifts from labels into name values.
const NOISE_TOKENS: &[&str] = &[
    "SURNAME", "GIVEN", "NAMES", "NAME", "FAMILIYASI", "ISMI", "ТЕГІ", "АТЫ", "ФАМИЛИЯ", "ИМЯ",
];

/// Heuristic extractor for the unstructured page text.
pub struct TextExtractor;

impl TextExtractor {
    pub fn parse_text(text: &str) -> TextFields {
        let mut fields = TextFields {
            national_id: Self::extract_national_id(text),
            document_number: first_match(&DOCUMENT_NUMBER_RULES, text)
                .filter(|d| FormatValidator::is_plausible_document_number(d)),
            nationality: first_match(&NATIONALITY_RULES, text),
            phone: first_match(&PHONE_RULES, text),
            ..Default::default()
        };

        // Only a checksum-valid IIN is trusted for derived fields
        let valid_iin = fields
            .national_id
            .as_deref()
            .filter(|iin| IinValidator::validate_checksum(iin));

        let iin_sex = valid_iin
            .map(IinValidator::get_gender_from_iin)
            .filter(Sex::is_known);
        fields.sex = iin_sex.or_else(|| first_match(&SEX_RULES, text));

        let iin_birth = valid_iin.and_then(IinValidator::extract_date_from_iin);
        let labelled_birth = first_match(&BIRTH_DATE_RULES, text);
        fields.birth_date_from_id = labelled_birth.is_none() && iin_birth.is_some();
        fields.birth_date = labelled_birth
            .or(iin_birth)
            .or_else(|| Self::bare_dates(text).into_iter().next());

        fields.expiry_date = Self::extract_expiry(text, fields.birth_date);

        let (last_name, first_name) = Self::extract_names(text);
        fields.last_name = last_name;
        fields.first_name = first_name;

        log::debug!("Free-text fields: {:?}", fields);
        fields
    }

    /// First checksum-valid 12-digit run, else the first 12-digit run.
    fn extract_national_id(text: &str) -> Option<String> {
        let runs: Vec<&str> = IIN_PATTERN
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        runs.iter()
            .find(|run| IinValidator::validate_checksum(run))
            .or_else(|| runs.first())
            .map(|run| run.to_string())
    }

    fn bare_dates(text: &str) -> Vec<NaiveDate> {
        BARE_DATE
            .captures_iter(text)
            .filter_map(|caps| date_from_groups(&caps))
            .collect()
    }

    /// Labelled expiry first, else the latest bare date that is not the
    /// birth date.
    fn extract_expiry(text: &str, birth_date: Option<NaiveDate>) -> Option<NaiveDate> {
        let not_birth = |d: &NaiveDate| Some(*d) != birth_date;

        EXPIRY_DATE_RULES
            .iter()
            .find_map(|rule| {
                rule.pattern
                    .captures_iter(text)
                    .filter_map(|caps| (rule.extract)(&caps))
                    .find(not_birth)
            })
            .or_else(|| Self::bare_dates(text).into_iter().filter(not_birth).max())
    }

    fn extract_names(text: &str) -> (Option<String>, Option<String>) {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();

        let mut last_name = Self::labelled_value(&lines, &SURNAME_LABEL);
        let mut first_name = Self::labelled_value(&lines, &GIVEN_NAME_LABEL);

        if last_name.is_none() && first_name.is_none() {
            let (first, last) = Self::scan_latin_lines(&lines);
            first_name = first;
            last_name = last;
        }

        let last_name = last_name.and_then(|v| Self::clean_name_value(&v));
        let first_name = first_name.and_then(|v| Self::clean_name_value(&v));
        Self::smart_split(last_name, first_name)
    }

    /// The best name line following a label (or the label line's own
    /// remainder), scored by Latin letters over Cyrillic ones.
    fn labelled_value(lines: &[&str], label: &Regex) -> Option<String> {
        let idx = lines
            .iter()
            .position(|line| label.is_match(line) && !PATRONYMIC_LABEL.is_match(line))?;

        let mut candidates: Vec<String> = Vec::new();

        let remainder = ANY_LABEL.replace_all(lines[idx], " ").replace(['/', ':'], " ");
        if Self::is_plausible_name_line(&remainder) {
            candidates.push(remainder);
        }

        for line in lines.iter().skip(idx + 1).filter(|l| !l.is_empty()).take(3) {
            if ANY_LABEL.is_match(line) {
                break;
            }
            if Self::is_plausible_name_line(line) {
                candidates.push(line.to_string());
            }
        }

        let mut best: Option<(i64, usize, String)> = None;
        for candidate in candidates {
            let score = count_latin(&candidate) as i64 * 2 - count_cyrillic(&candidate) as i64;
            let vowels = count_vowels(&candidate);
            let better = match &best {
                None => true,
                Some((best_score, best_vowels, _)) => {
                    score > *best_score || (score == *best_score && vowels > *best_vowels)
                }
            };
            if better {
                best = Some((score, vowels, candidate));
            }
        }

        best.map(|(_, _, value)| value)
    }

    fn is_plausible_name_line(line: &str) -> bool {
        let line = line.trim();
        let letters = line.chars().filter(|c| c.is_alphabetic()).count();
        (2..=40).contains(&letters)
            && line
                .chars()
                .all(|c| c.is_alphabetic() || c == ' ' || c == '-')
            && !contains_header_vocabulary(line)
    }

    /// Without labels: the first standalone Latin word becomes the given
    /// name, the next different one the surname.
    fn scan_latin_lines(lines: &[&str]) -> (Option<String>, Option<String>) {
        let mut found: Vec<String> = Vec::new();
        for line in lines {
            if found.len() == 2 {
                break;
            }
            let upper = line.to_uppercase();
            if INSTITUTIONAL_KEYWORDS.iter().any(|k| upper.contains(k)) {
                continue;
            }
            let is_token = (2..=30).contains(&line.len())
                && line.chars().all(|c| c.is_ascii_uppercase())
                && count_vowels(line) > 0;
            if is_token && !found.iter().any(|f| f == line) {
                found.push(line.to_string());
            }
        }

        let mut found = found.into_iter();
        (found.next(), found.next())
    }

    /// Uppercase, drop label noise, and collapse words OCR read twice.
    fn clean_name_value(value: &str) -> Option<String> {
        let upper = value.to_uppercase();
        let tokens: Vec<&str> = upper
            .split(|c: char| c.is_whitespace() || c == '/')
            .filter(|t| !t.is_empty() && !NOISE_TOKENS.contains(t))
            .collect();

        let merged = Self::merge_near_duplicates(&tokens);
        if merged.is_empty() {
            None
        } else {
            Some(merged.join(" "))
        }
    }

    /// Collapse tokens that are near-duplicates of an earlier token, keeping
    /// whichever variant has more uppercase Latin letters. Duplicates must
    /// also agree in length within one character, so a surname and a
    /// given name sharing a stem (IVANOV IVAN) stay apart.
    pub fn merge_near_duplicates(tokens: &[&str]) -> Vec<String> {
        fn latin_upper(t: &str) -> usize {
            t.chars().filter(|c| c.is_ascii_uppercase()).count()
        }
        fn is_duplicate(a: &str, b: &str) -> bool {
            a.chars().count().abs_diff(b.chars().count()) <= 1 && is_similar(a, b)
        }

        let mut kept: Vec<String> = Vec::new();
        for token in tokens {
            match kept.iter_mut().find(|k| is_duplicate(k.as_str(), token)) {
                Some(existing) => {
                    if latin_upper(token) > latin_upper(existing.as_str()) {
                        *existing = token.to_string();
                    }
                }
                None => kept.push(token.to_string()),
            }
        }
        kept
    }

    /// A lone multi-word name field is read as surname followed by given
    /// names.
    fn smart_split(
        last_name: Option<String>,
        first_name: Option<String>,
    ) -> (Option<String>, Option<String>) {
        fn split(value: &str) -> Option<(String, String)> {
            let mut tokens = value.split_whitespace();
            let head = tokens.next()?;
            let rest = tokens.collect::<Vec<_>>().join(" ");
            (!rest.is_empty()).then(|| (head.to_string(), rest))
        }

        match (last_name, first_name) {
            (Some(last), None) => match split(&last) {
                Some((surname, given)) => (Some(surname), Some(given)),
                None => (Some(last), None),
            },
            (None, Some(first)) => match split(&first) {
                Some((surname, given)) => (Some(surname), Some(given)),
                None => (None, Some(first)),
            },
            other => other,
        }
    }
}
