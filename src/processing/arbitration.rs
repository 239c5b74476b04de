// Field arbitration: turn the two candidate sets collected for a document
// into one record.
//
// Names go through an ordered rule list. MRZ values are grammar-constrained
// and trusted by default; Cyrillic leakage, label noise in the free text or an
// MRZ token that needed repair shift trust the other way.

use crate::models::{DocumentRecord, FieldCandidates, NameCandidate, Sex};
use crate::processing::mrz::contains_header_vocabulary;
use crate::processing::transliteration::{contains_cyrillic, count_vowels};
use crate::utils::{is_similar, levenshtein_distance};
use crate::validation::FormatValidator;
use serde::Serialize;

/// Quality score at which a name is considered trustworthy on its own.
const TRUSTED_SCORE: f64 = 4.0;

/// Where an arbitrated value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateSource {
    Text,
    Mrz,
    Inferred,
    None,
}

/// One arbitration outcome, reported to the parse observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecision {
    pub field: &'static str,
    pub source: CandidateSource,
    pub value: String,
    pub reason: &'static str,
}

/// Score a name by how much it looks like a real name: total token length,
/// minus 1.5 per token of two characters or fewer, minus 0.5 per token
/// beyond the second, minus 1 if any token contains a non-letter.
pub fn quality_score(value: &str) -> f64 {
    let tokens: Vec<&str> = value.split_whitespace().collect();

    let mut score: f64 = tokens.iter().map(|t| t.chars().count() as f64).sum();
    score -= 1.5 * tokens.iter().filter(|t| t.chars().count() <= 2).count() as f64;
    score -= 0.5 * tokens.len().saturating_sub(2) as f64;
    if tokens.iter().any(|t| !t.chars().all(char::is_alphabetic)) {
        score -= 1.0;
    }
    score
}

/// Free-text readings that are label or background debris rather than a
/// name.
pub fn is_structural_noise(value: &str) -> bool {
    if contains_header_vocabulary(value) {
        return true;
    }

    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if count_vowels(&compact) == 0 && compact.chars().count() > 4 {
        return true;
    }

    let single_token = !value.trim().contains(char::is_whitespace);
    single_token && compact.chars().count() >= 10 && has_char_run(&compact, 3)
}

fn has_char_run(value: &str, min_run: usize) -> bool {
    let mut run = 0;
    let mut prev = None;
    for c in value.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            run = 1;
            prev = Some(c);
        }
        if run >= min_run {
            return true;
        }
    }
    false
}

/// Decide between the free-text and MRZ readings of one name field. The
/// first matching rule wins.
pub fn choose_name(
    text: Option<&str>,
    mrz: Option<&NameCandidate>,
) -> (Option<String>, CandidateSource, &'static str) {
    let text = text.filter(|t| !t.is_empty());
    let mrz = mrz.filter(|m| !m.value.is_empty());

    let (text, mrz) = match (text, mrz) {
        (None, None) => return (None, CandidateSource::None, "no candidate"),
        (Some(t), None) => return (Some(t.to_string()), CandidateSource::Text, "no MRZ value"),
        (None, Some(m)) => return (Some(m.value.clone()), CandidateSource::Mrz, "no text value"),
        (Some(t), Some(m)) => (t, m),
    };

    let take_text = (Some(text.to_string()), CandidateSource::Text);
    let take_mrz = (Some(mrz.value.clone()), CandidateSource::Mrz);

    if contains_cyrillic(text) || is_structural_noise(text) {
        return (take_mrz.0, take_mrz.1, "text is Cyrillic or noise");
    }

    let text_score = quality_score(text);
    let mrz_score = quality_score(&mrz.value);

    if !mrz.had_issues && mrz_score >= TRUSTED_SCORE {
        let text_is_trimmed_mrz = text.chars().count() < mrz.value.chars().count()
            && text_score >= TRUSTED_SCORE
            && (mrz.value.contains(text) || levenshtein_distance(text, &mrz.value) <= 1);
        if text_is_trimmed_mrz {
            return (take_text.0, take_text.1, "MRZ carries a spurious trailing character");
        }
        return (take_mrz.0, take_mrz.1, "clean MRZ");
    }

    if mrz.had_issues && text_score >= TRUSTED_SCORE {
        return (take_text.0, take_text.1, "MRZ needed repair, text is clean");
    }

    if is_similar(text, &mrz.value) {
        if mrz_score > text_score {
            return (take_mrz.0, take_mrz.1, "similar, MRZ scores higher");
        }
    } else if mrz_score - text_score >= 2.0 {
        return (take_mrz.0, take_mrz.1, "dissimilar, MRZ scores much higher");
    }

    (take_text.0, take_text.1, "text kept")
}

const FEMALE_ENDINGS: &[&str] = &["a", "ya", "ia", "na", "ra", "la", "ma", "ta", "sa"];

const FEMALE_NAMES: &[&str] = &[
    "aisha", "aiman", "ainur", "aiya", "akmaral", "aliya", "alma", "altynai", "anar", "asem",
    "asiya", "aygerim", "aynur", "azhar", "diana", "dinara", "farida", "fatima", "gaukhar",
    "gulnara", "gulzhan", "indira", "kamila", "karlygash", "karina", "kulyaim", "laura", "madina",
    "malika", "mariam", "nazira", "raya", "saule", "symbat", "togzhan", "ulzhan", "zarina",
    "zhanna",
];

/// Guess sex from the first given name. Only used when nothing on the
/// document said it.
pub fn infer_sex_from_given_name(first_name: &str) -> Sex {
    let Some(name) = first_name.split_whitespace().next() else {
        return Sex::Unknown;
    };
    let name = name.to_lowercase();
    if FEMALE_ENDINGS.iter().any(|e| name.ends_with(e)) || FEMALE_NAMES.contains(&name.as_str()) {
        Sex::Female
    } else {
        Sex::Male
    }
}

/// Options that change arbitration outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrationOptions {
    pub infer_sex_from_given_name: bool,
}

/// Apply the arbitration policy to every field at once.
pub fn arbitrate(
    candidates: &FieldCandidates,
    options: ArbitrationOptions,
) -> (DocumentRecord, Vec<FieldDecision>) {
    let text = &candidates.text;
    let mrz = &candidates.mrz;
    let mut decisions = Vec::new();

    let mut decide = |field: &'static str, value: Option<String>, source, reason| {
        decisions.push(FieldDecision {
            field,
            source: if value.is_some() { source } else { CandidateSource::None },
            value: value.clone().unwrap_or_default(),
            reason,
        });
        value
    };

    let (last, source, reason) = choose_name(text.last_name.as_deref(), mrz.last_name.as_ref());
    let last_name = decide("last_name", last, source, reason);

    let (first, source, reason) = choose_name(text.first_name.as_deref(), mrz.first_name.as_ref());
    let first_name = decide("first_name", first, source, reason);

    // Checksum-valid MRZ values override; free text next; unverified MRZ last
    let (document_number, source, reason) = match (&mrz.document_number, &text.document_number) {
        (Some(m), _) if mrz.document_number_verified => {
            (Some(m.clone()), CandidateSource::Mrz, "MRZ check digit valid")
        }
        (_, Some(t)) => (Some(t.clone()), CandidateSource::Text, "free text"),
        (Some(m), None) => (Some(m.clone()), CandidateSource::Mrz, "unverified MRZ fills gap"),
        (None, None) => (None, CandidateSource::None, "no candidate"),
    };
    let document_number = document_number.filter(|d| FormatValidator::is_plausible_document_number(d));
    let document_number = decide("document_number", document_number, source, reason);

    let (expiry_date, source, reason) = match (mrz.expiry_date, text.expiry_date) {
        (Some(m), _) if mrz.expiry_verified => (Some(m), CandidateSource::Mrz, "MRZ check digit valid"),
        (_, Some(t)) => (Some(t), CandidateSource::Text, "free text"),
        (Some(m), None) => (Some(m), CandidateSource::Mrz, "unverified MRZ fills gap"),
        (None, None) => (None, CandidateSource::None, "no candidate"),
    };
    decide("expiry_date", expiry_date.map(|d| d.to_string()), source, reason);

    // A checksum-valid IIN beats a verified MRZ, which beats a printed label
    let (birth_date, source, reason) = match (text.birth_date, mrz.birth_date) {
        (Some(t), _) if text.birth_date_from_id => (Some(t), CandidateSource::Text, "checksum-valid IIN"),
        (_, Some(m)) if mrz.birth_date_verified => (Some(m), CandidateSource::Mrz, "MRZ check digit valid"),
        (Some(t), _) => (Some(t), CandidateSource::Text, "free text"),
        (None, Some(m)) => (Some(m), CandidateSource::Mrz, "unverified MRZ fills gap"),
        (None, None) => (None, CandidateSource::None, "no candidate"),
    };
    decide("birth_date", birth_date.map(|d| d.to_string()), source, reason);

    let (mut sex, mut sex_source) = match (text.sex, mrz.sex) {
        (Some(t), _) if t.is_known() => (t, CandidateSource::Text),
        (_, Some(m)) if m.is_known() => (m, CandidateSource::Mrz),
        _ => (Sex::Unknown, CandidateSource::None),
    };
    if !sex.is_known() && options.infer_sex_from_given_name {
        if let Some(first) = first_name.as_deref() {
            sex = infer_sex_from_given_name(first);
            sex_source = CandidateSource::Inferred;
        }
    }
    let sex_value = sex.is_known().then(|| sex.code().to_string());
    decide("sex", sex_value, sex_source, "free text first");

    let nationality = match (&mrz.nationality, &text.nationality) {
        (Some(m), _) if m.len() == 3 => Some(m.clone()),
        (_, Some(t)) => Some(t.clone()),
        _ => None,
    };

    let record = DocumentRecord {
        last_name: last_name.unwrap_or_default(),
        first_name: first_name.unwrap_or_default(),
        sex,
        birth_date,
        national_id: text.national_id.clone().unwrap_or_default(),
        document_number: document_number.unwrap_or_default(),
        expiry_date,
        phone: text.phone.clone(),
        nationality,
        mrz_last_name: mrz.last_name.as_ref().map(|n| n.value.clone()),
        mrz_first_name: mrz.first_name.as_ref().map(|n| n.value.clone()),
    };

    (record, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MrzFields, TextFields};
    use crate::processing::extractors::TextExtractor;
    use chrono::NaiveDate;

    fn mrz_name(value: &str, had_issues: bool) -> NameCandidate {
        NameCandidate::new(value, had_issues)
    }

    #[test]
    fn test_quality_score() {
        assert_eq!(quality_score("IVANOV IVAN"), 10.0);
        assert_eq!(quality_score("AB"), 0.5);
        assert_eq!(quality_score("RAYA ALTYBAEVNA K"), 15.0 - 1.5 - 0.5);
        assert_eq!(quality_score("T0LEU"), 4.0);
    }

    #[test]
    fn test_structural_noise() {
        assert!(is_structural_noise("PASSPORT"));
        assert!(is_structural_noise("KRTPSK"));
        assert!(is_structural_noise("SOOOCCCKKKL"));
        assert!(!is_structural_noise("NASSIPKHAN"));
        assert!(!is_structural_noise("TOLEU"));
    }

    #[test]
    fn test_rules_one_and_two() {
        let (v, s, _) = choose_name(Some("IVANOV"), None);
        assert_eq!((v.as_deref(), s), (Some("IVANOV"), CandidateSource::Text));

        let m = mrz_name("IVANOV", false);
        let (v, s, _) = choose_name(None, Some(&m));
        assert_eq!((v.as_deref(), s), (Some("IVANOV"), CandidateSource::Mrz));
    }

    #[test]
    fn test_cyrillic_text_loses_to_mrz() {
        let m = mrz_name("TOLEU", true);
        let (v, _, _) = choose_name(Some("ТОЛЕУ"), Some(&m));
        assert_eq!(v.as_deref(), Some("TOLEU"));
    }

    #[test]
    fn test_clean_mrz_preferred() {
        let m = mrz_name("NASSIPKHAN", false);
        let (v, s, _) = choose_name(Some("NASIPHAN"), Some(&m));
        assert_eq!((v.as_deref(), s), (Some("NASSIPKHAN"), CandidateSource::Mrz));
    }

    #[test]
    fn test_spurious_trailing_mrz_character() {
        let m = mrz_name("TOLEUK", false);
        let (v, s, _) = choose_name(Some("TOLEU"), Some(&m));
        assert_eq!((v.as_deref(), s), (Some("TOLEU"), CandidateSource::Text));
    }

    #[test]
    fn test_clean_text_beats_repaired_mrz() {
        let m = mrz_name("IV4N", true);
        let (v, s, _) = choose_name(Some("IVANOV IVAN"), Some(&m));
        assert_eq!((v.as_deref(), s), (Some("IVANOV IVAN"), CandidateSource::Text));
    }

    #[test]
    fn test_low_quality_fallthrough() {
        // Both short: similar and MRZ scores higher
        let m = mrz_name("ALI", true);
        let (v, _, _) = choose_name(Some("AL"), Some(&m));
        assert_eq!(v.as_deref(), Some("ALI"));

        // Dissimilar and MRZ not far enough ahead
        let m = mrz_name("BEK", true);
        let (v, _, _) = choose_name(Some("XUE"), Some(&m));
        assert_eq!(v.as_deref(), Some("XUE"));
    }

    #[test]
    fn test_noisy_text_goes_to_mrz_even_when_mrz_was_repaired() {
        let m = mrz_name("TOLEU", true);
        assert_eq!(
            choose_name(Some("KRTPSK"), Some(&m)),
            (Some("TOLEU".to_string()), CandidateSource::Mrz, "text is Cyrillic or noise")
        );
        assert_eq!(
            choose_name(Some("ТОЛЕУ"), Some(&m)),
            (Some("TOLEU".to_string()), CandidateSource::Mrz, "text is Cyrillic or noise")
        );
    }

    #[test]
    fn test_dissimilar_low_quality_text_loses_to_much_better_mrz() {
        let m = mrz_name("BEKZHANOV", true);
        assert_eq!(
            choose_name(Some("OL"), Some(&m)),
            (
                Some("BEKZHANOV".to_string()),
                CandidateSource::Mrz,
                "dissimilar, MRZ scores much higher"
            )
        );
    }

    fn candidates() -> FieldCandidates {
        FieldCandidates {
            text: TextFields {
                last_name: Some("NASSIPKHAN".to_string()),
                first_name: Some("TOLEU".to_string()),
                national_id: Some("031214500014".to_string()),
                sex: Some(Sex::Male),
                birth_date: NaiveDate::from_ymd_opt(2003, 12, 14),
                birth_date_from_id: true,
                document_number: Some("N87654321".to_string()),
                expiry_date: NaiveDate::from_ymd_opt(2031, 1, 1),
                nationality: Some("KAZ".to_string()),
                phone: None,
            },
            mrz: MrzFields {
                last_name: Some(mrz_name("NASSIPKHAN", false)),
                first_name: Some(mrz_name("TOLEU", false)),
                document_number: Some("N12345678".to_string()),
                document_number_verified: true,
                expiry_date: NaiveDate::from_ymd_opt(2032, 9, 6),
                expiry_verified: false,
                birth_date: NaiveDate::from_ymd_opt(1999, 1, 1),
                birth_date_verified: true,
                sex: Some(Sex::Female),
                nationality: Some("UZB".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_verified_mrz_overrides_unverified_does_not() {
        let (record, decisions) = arbitrate(&candidates(), ArbitrationOptions::default());
        assert_eq!(record.document_number, "N12345678");
        assert_eq!(record.expiry_date, NaiveDate::from_ymd_opt(2031, 1, 1));
        assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(2003, 12, 14));
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.nationality.as_deref(), Some("UZB"));
        assert_eq!(record.mrz_last_name.as_deref(), Some("NASSIPKHAN"));
        assert!(record.is_valid());
        assert!(decisions.iter().any(|d| d.field == "document_number" && d.source == CandidateSource::Mrz));
    }

    #[test]
    fn test_verified_mrz_birth_date_beats_printed_date() {
        let mut c = candidates();
        c.text.birth_date_from_id = false;
        let (record, decisions) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(1999, 1, 1));
        assert!(decisions.iter().any(|d| d.field == "birth_date" && d.source == CandidateSource::Mrz));

        c.mrz.birth_date_verified = false;
        let (record, _) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(2003, 12, 14));
    }

    #[test]
    fn test_invalid_iin_yields_to_mrz_birth_and_sex() {
        let c = FieldCandidates {
            text: TextExtractor::parse_text("SEX: F\nИИН 850101300609"),
            mrz: MrzFields {
                birth_date: NaiveDate::from_ymd_opt(1985, 1, 2),
                birth_date_verified: true,
                sex: Some(Sex::Female),
                ..Default::default()
            },
        };
        let (record, _) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.national_id, "850101300609");
        assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(1985, 1, 2));
        assert_eq!(record.sex, Sex::Female);
    }

    #[test]
    fn test_mrz_fills_gaps() {
        let mut c = candidates();
        c.text = TextFields::default();
        let (record, _) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.expiry_date, NaiveDate::from_ymd_opt(2032, 9, 6));
        assert_eq!(record.birth_date, NaiveDate::from_ymd_opt(1999, 1, 1));
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.national_id, "");
    }

    #[test]
    fn test_garbage_document_number_dropped() {
        let mut c = candidates();
        c.mrz.document_number = Some("<<<<6<<<".to_string());
        c.text.document_number = None;
        c.mrz.document_number_verified = false;
        let (record, _) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.document_number, "");
    }

    #[test]
    fn test_sex_inference_is_opt_in() {
        let c = FieldCandidates {
            text: TextFields {
                first_name: Some("KULYAIM".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (record, _) = arbitrate(&c, ArbitrationOptions::default());
        assert_eq!(record.sex, Sex::Unknown);

        let options = ArbitrationOptions {
            infer_sex_from_given_name: true,
        };
        let (record, _) = arbitrate(&c, options);
        assert_eq!(record.sex, Sex::Female);
    }

    #[test]
    fn test_infer_sex_from_given_name() {
        assert_eq!(infer_sex_from_given_name("DINARA"), Sex::Female);
        assert_eq!(infer_sex_from_given_name("KULYAIM"), Sex::Female);
        assert_eq!(infer_sex_from_given_name("TOLEU"), Sex::Male);
        assert_eq!(infer_sex_from_given_name(""), Sex::Unknown);
    }
}
