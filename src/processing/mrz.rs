use crate::models::{MrzFields, NameCandidate, Sex};
use crate::processing::transliteration::{clean_name_token, is_cyrillic, to_digits, to_latin};
use crate::validation::{CheckDigitStatus, FormatValidator, MrzValidator};
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

/// Canonical TD3 line length is 44; OCR routinely drops a few characters,
/// so anything with at least this many MRZ characters is a candidate line.
const MIN_MRZ_LINE_CHARS: usize = 25;

/// Words printed in the visual zone of the document. A "MRZ" line that
/// contains one of them is a header the crop caught, not the MRZ band.
pub const HEADER_VOCABULARY: &[&str] = &[
    "MINISTRY",
    "PASSPORT",
    "NATIONALITY",
    "REPUBLIC",
    "SURNAME",
    "GIVEN",
    "AUTHORITY",
    "BIRTH",
    "KAZAKHSTAN",
    "ПАСПОРТ",
];

pub fn contains_header_vocabulary(text: &str) -> bool {
    let upper = text.to_uppercase();
    HEADER_VOCABULARY.iter().any(|word| upper.contains(word))
}

/// Which name groups a shevron pattern captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShevronShape {
    SurnameAndGiven,
    Fragment,
}

lazy_static! {
    // OCR splits "<<" into "< <" or escapes it as "\<"
    static ref SPLIT_FILLER: Regex = Regex::new(r"<\s+<").unwrap();

    /// Name patterns searched in the raw text when no MRZ block could be
    /// located. First match wins.
    static ref SHEVRON_PATTERNS: Vec<(Regex, ShevronShape)> = vec![
        (
            Regex::new(r"[PР]<[A-Z\p{Cyrillic}]{3}([A-Z\p{Cyrillic}]+(?:<[A-Z\p{Cyrillic}]+)*)<<+([A-Z\p{Cyrillic}]+(?:<[A-Z\p{Cyrillic}]+)*)").unwrap(),
            ShevronShape::SurnameAndGiven,
        ),
        (
            Regex::new(r"([A-Z\p{Cyrillic}]{2,}(?:<[A-Z\p{Cyrillic}]+)*)<<+([A-Z\p{Cyrillic}]+(?:<[A-Z\p{Cyrillic}]+)*)").unwrap(),
            ShevronShape::SurnameAndGiven,
        ),
        (
            Regex::new(r"[PР]<[A-Z\p{Cyrillic}]{3}([A-Z\p{Cyrillic}]+(?:<[A-Z\p{Cyrillic}]+)*)<<").unwrap(),
            ShevronShape::Fragment,
        ),
        (
            Regex::new(r"(?m)(?:^|<)([A-Z\p{Cyrillic}]{3,}(?:<[A-Z\p{Cyrillic}]+)*)<<<").unwrap(),
            ShevronShape::Fragment,
        ),
    ];
}

/// Parser for the TD3 Machine-Readable Zone.
///
/// Never fails: every field it cannot read is simply left out of the
/// returned [`MrzFields`].
pub struct MrzParser;

impl MrzParser {
    /// Parse the MRZ from the dedicated MRZ-pass text when there is one,
    /// otherwise (or when that yields nothing) from the full-page text.
    pub fn parse_mrz(primary_text: &str, mrz_text: Option<&str>) -> MrzFields {
        if let Some(specialized) = mrz_text.filter(|t| !t.trim().is_empty()) {
            let fields = Self::parse_source(specialized, true);
            if !fields.is_empty() {
                return fields;
            }
            log::debug!("MRZ-pass text yielded nothing, retrying on full-page text");
        }
        Self::parse_source(primary_text, false)
    }

    fn parse_source(text: &str, specialized: bool) -> MrzFields {
        let lines = Self::candidate_lines(text, specialized);
        log::debug!("MRZ candidate lines: {:?}", lines);

        if lines.len() < 2 {
            return Self::parse_shevron_fallback(text);
        }

        let line1 = &lines[lines.len() - 2];
        let line2 = &lines[lines.len() - 1];

        let mut fields = MrzFields::default();
        Self::parse_name_line(line1, &mut fields);
        Self::parse_number_line(line2, &mut fields);
        fields
    }

    /// Lines that look like MRZ lines, whitespace removed, uppercased, with
    /// header lines already rejected.
    fn candidate_lines(text: &str, specialized: bool) -> Vec<String> {
        text.lines()
            .map(Self::compact_line)
            .filter(|line| {
                let mrz_chars = line
                    .chars()
                    .filter(|c| {
                        c.is_ascii_alphanumeric() || *c == '<' || (!specialized && is_cyrillic(*c))
                    })
                    .count();
                mrz_chars >= MIN_MRZ_LINE_CHARS
            })
            .filter(|line| {
                let header = contains_header_vocabulary(line);
                if header {
                    log::debug!("Rejecting header line in MRZ band: {}", line);
                }
                !header
            })
            .collect()
    }

    fn compact_line(line: &str) -> String {
        line.replace("\\<", "<")
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_uppercase())
            .collect()
    }

    /// Line 1: `P<` + issuing state + `SURNAME<<GIVEN<NAMES<<<...`
    fn parse_name_line(line: &str, fields: &mut MrzFields) {
        let chars: Vec<char> = line.chars().collect();
        let has_prefix = chars.len() >= 5
            && to_latin(&chars[0].to_string()) == "P"
            && chars[1] == '<';
        let names: String = if has_prefix {
            chars[5..].iter().collect()
        } else {
            line.to_string()
        };

        let (surname, given) = match names.find("<<") {
            Some(idx) => {
                let surname = names[..idx].to_string();
                let given = names[idx..]
                    .trim_start_matches('<')
                    .split("<<")
                    .next()
                    .unwrap_or("")
                    .to_string();
                (surname, given)
            }
            None => {
                let spaced = names.replace('<', " ");
                let mut tokens = spaced.split_whitespace();
                let surname = tokens.next().unwrap_or("").to_string();
                let given = tokens.collect::<Vec<_>>().join(" ");
                (surname, given)
            }
        };

        fields.last_name = Self::name_candidate(&surname);
        fields.first_name = Self::name_candidate(&given);
    }

    /// Line 2: document number, nationality, birth date, sex, expiry, each
    /// numeric field followed by its check digit.
    fn parse_number_line(line: &str, fields: &mut MrzFields) {
        let chars: Vec<char> = line.chars().collect();

        if let Some(raw) = Self::slice(&chars, 0, 9) {
            let raw = to_latin(&raw);
            let value = raw.replace('<', "");
            if !value.is_empty() {
                let status = MrzValidator::verify(&raw, Self::check_char(&chars, 9));
                log::debug!("MRZ document number {} check digit {:?}", value, status);
                fields.document_number = Some(value);
                fields.document_number_verified = status == CheckDigitStatus::Valid;
            }
        }

        if let Some(raw) = Self::slice(&chars, 10, 13) {
            let code = to_latin(&raw);
            if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
                fields.nationality = Some(code);
            }
        }

        if let Some((date, status)) = Self::date_field(&chars, 13, Self::resolve_birth_year) {
            fields.birth_date = Some(date);
            fields.birth_date_verified = status == CheckDigitStatus::Valid;
        }

        if let Some(marker) = chars.get(20) {
            let sex = Sex::from_marker(*marker);
            if sex.is_known() {
                fields.sex = Some(sex);
            }
        }

        if let Some((date, status)) = Self::date_field(&chars, 21, |yy| 2000 + yy) {
            log::debug!("MRZ expiry {} check digit {:?}", date, status);
            fields.expiry_date = Some(date);
            fields.expiry_verified = status == CheckDigitStatus::Valid;
        }
    }

    /// YYMMDD at `start`, check digit right after it.
    fn date_field(
        chars: &[char],
        start: usize,
        century: impl Fn(i32) -> i32,
    ) -> Option<(NaiveDate, CheckDigitStatus)> {
        let raw = to_digits(&Self::slice(chars, start, start + 6)?);
        if !FormatValidator::is_plausible_date(&raw) || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let yy: i32 = raw[0..2].parse().ok()?;
        let mm: u32 = raw[2..4].parse().ok()?;
        let dd: u32 = raw[4..6].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(century(yy), mm, dd)?;

        let status = MrzValidator::verify(&raw, Self::check_char(chars, start + 6));
        Some((date, status))
    }

    /// Birth years in the future belong to the previous century.
    fn resolve_birth_year(yy: i32) -> i32 {
        let current = chrono::Utc::now().year() % 100;
        if yy > current {
            1900 + yy
        } else {
            2000 + yy
        }
    }

    fn slice(chars: &[char], start: usize, end: usize) -> Option<String> {
        if chars.len() < end {
            return None;
        }
        Some(chars[start..end].iter().collect())
    }

    fn check_char(chars: &[char], idx: usize) -> Option<char> {
        chars
            .get(idx)
            .and_then(|c| to_digits(&c.to_string()).chars().next())
    }

    fn name_candidate(raw: &str) -> Option<NameCandidate> {
        let (value, had_issues) = clean_name_token(raw);
        if value.is_empty() {
            return None;
        }
        if !FormatValidator::is_plausible_mrz_name(&value) {
            return None;
        }
        Some(NameCandidate::new(value, had_issues))
    }

    /// Search the unfiltered text for a shevron-delimited name when no
    /// two-line MRZ block was found.
    fn parse_shevron_fallback(text: &str) -> MrzFields {
        let normalized = Self::normalize_fillers(text);
        let mut fields = MrzFields::default();

        for (pattern, shape) in SHEVRON_PATTERNS.iter() {
            for caps in pattern.captures_iter(&normalized) {
                let first = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let second = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                if contains_header_vocabulary(first) || contains_header_vocabulary(second) {
                    continue;
                }

                log::debug!("Shevron pattern matched ({:?}): '{}' / '{}'", shape, first, second);
                match shape {
                    ShevronShape::SurnameAndGiven => {
                        fields.last_name = Self::name_candidate(first);
                        fields.first_name = Self::name_candidate(second);
                    }
                    ShevronShape::Fragment => {
                        fields.last_name = Self::name_candidate(first);
                    }
                }
                return fields;
            }
        }

        fields
    }

    /// Uppercase, undo OCR filler splitting, and drop spaces from lines that
    /// carry filler characters.
    fn normalize_fillers(text: &str) -> String {
        text.lines()
            .map(|line| {
                let line = line.to_uppercase().replace("\\<", "<");
                if line.contains('<') {
                    let joined = SPLIT_FILLER.replace_all(&line, "<<").into_owned();
                    // A second pass catches "< < <" runs
                    let joined = SPLIT_FILLER.replace_all(&joined, "<<").into_owned();
                    joined.chars().filter(|c| !c.is_whitespace()).collect()
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
