// Garbage filters for values that survived extraction but still look like
// OCR debris (runs of filler characters, letter soup in a date).

pub struct FormatValidator;

impl FormatValidator {
    fn ratio(count: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    }

    /// Rejects values like `<<<<<6<<<`: more than half filler, or fewer than
    /// three alphanumerics.
    pub fn is_plausible_document_number(doc_num: &str) -> bool {
        if doc_num.is_empty() {
            return false;
        }

        let total = doc_num.chars().count();
        let fillers = doc_num.chars().filter(|c| *c == '<').count();
        if Self::ratio(fillers, total) > 0.5 {
            log::debug!("Document number '{}' rejected: {}/{} filler", doc_num, fillers, total);
            return false;
        }

        let alphanumeric = doc_num.chars().filter(|c| c.is_alphanumeric()).count();
        if alphanumeric < 3 {
            log::debug!("Document number '{}' rejected: only {} alphanumerics", doc_num, alphanumeric);
            return false;
        }

        true
    }

    /// Rejects date strings like `EVA<<K`: more than 30% filler, fewer than
    /// four digits, or more than two letters.
    pub fn is_plausible_date(date_str: &str) -> bool {
        if date_str.is_empty() {
            return false;
        }

        let total = date_str.chars().count();
        let fillers = date_str.chars().filter(|c| *c == '<').count();
        if Self::ratio(fillers, total) > 0.3 {
            return false;
        }

        let digits = date_str.chars().filter(|c| c.is_ascii_digit()).count();
        if digits < 4 {
            return false;
        }

        let letters = date_str.chars().filter(|c| c.is_alphabetic()).count();
        letters <= 2
    }

    /// Rejects MRZ name readings dominated by the letters OCR produces from
    /// guilloche background (C, O, E, G, S), and given-name runs fused into
    /// one overlong token.
    pub fn is_plausible_mrz_name(name: &str) -> bool {
        if name.is_empty() {
            return true;
        }

        let total = name.chars().count();
        let garbage = name.chars().filter(|c| matches!(c, 'C' | 'O' | 'E' | 'G' | 'S')).count();
        if Self::ratio(garbage, total) > 0.5 {
            log::debug!("MRZ name '{}' rejected: {}/{} background letters", name, garbage, total);
            return false;
        }

        let compact = name.chars().filter(|c| *c != ' ' && *c != '<').count();
        if compact > 20 {
            log::debug!("MRZ name '{}' rejected: {} letters without separator", name, compact);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_number_filter() {
        assert!(FormatValidator::is_plausible_document_number("N12345678"));
        assert!(FormatValidator::is_plausible_document_number("FA1415473"));
        assert!(!FormatValidator::is_plausible_document_number("<<<<<6<<<"));
        assert!(!FormatValidator::is_plausible_document_number("N1"));
        assert!(!FormatValidator::is_plausible_document_number(""));
    }

    #[test]
    fn test_date_filter() {
        assert!(FormatValidator::is_plausible_date("06.09.2032"));
        assert!(FormatValidator::is_plausible_date("320906"));
        assert!(!FormatValidator::is_plausible_date("EVA<<K"));
        assert!(!FormatValidator::is_plausible_date("12<<<<"));
        assert!(!FormatValidator::is_plausible_date("AB12CD34"));
    }

    #[test]
    fn test_mrz_name_filter() {
        assert!(FormatValidator::is_plausible_mrz_name("NASSIPKHAN"));
        assert!(FormatValidator::is_plausible_mrz_name("RAYA ALTYBAEVNA"));
        assert!(!FormatValidator::is_plausible_mrz_name("SOOCCOCGCECCCOCG"));
        assert!(!FormatValidator::is_plausible_mrz_name("RAYAKXALTYBAEVNAKIZIKK"));
    }
}
