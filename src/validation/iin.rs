// Kazakhstan individual identification number (IIN).
//
// Layout: YYMMDD (birth date), one century/sex digit, four serial digits,
// one check digit.

use crate::models::Sex;
use chrono::NaiveDate;

const PRIMARY_WEIGHTS: [u32; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const SECONDARY_WEIGHTS: [u32; 11] = [3, 4, 5, 6, 7, 8, 9, 10, 11, 1, 2];

pub struct IinValidator;

impl IinValidator {
    fn digits(iin: &str) -> Option<Vec<u32>> {
        if iin.len() != 12 {
            return None;
        }
        iin.chars().map(|c| c.to_digit(10)).collect()
    }

    fn weighted_mod11(digits: &[u32], weights: &[u32; 11]) -> u32 {
        digits
            .iter()
            .zip(weights.iter())
            .map(|(d, w)| d * w)
            .sum::<u32>()
            % 11
    }

    /// Weighted mod-11 over the first eleven digits; when the primary weights
    /// give 10 the rotated weights are used instead. The result must equal
    /// the twelfth digit.
    pub fn validate_checksum(iin: &str) -> bool {
        let Some(digits) = Self::digits(iin) else {
            return false;
        };

        let mut checksum = Self::weighted_mod11(&digits[..11], &PRIMARY_WEIGHTS);
        if checksum == 10 {
            checksum = Self::weighted_mod11(&digits[..11], &SECONDARY_WEIGHTS);
        }

        checksum == digits[11]
    }

    /// Seventh digit: odd (1, 3, 5) is male, even (2, 4, 6) is female.
    pub fn get_gender_from_iin(iin: &str) -> Sex {
        match Self::digits(iin).map(|d| d[6]) {
            Some(1 | 3 | 5) => Sex::Male,
            Some(2 | 4 | 6) => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    /// Birth date from the leading YYMMDD, with the century taken from the
    /// seventh digit. Calendar-impossible dates yield `None`.
    pub fn extract_date_from_iin(iin: &str) -> Option<NaiveDate> {
        let digits = Self::digits(iin)?;

        let yy = (digits[0] * 10 + digits[1]) as i32;
        let month = digits[2] * 10 + digits[3];
        let day = digits[4] * 10 + digits[5];

        let century = match digits[6] {
            1 | 2 => 1800,
            3 | 4 => 1900,
            5 | 6 => 2000,
            _ => 1900,
        };

        NaiveDate::from_ymd_opt(century + yy, month, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_primary_weights() {
        assert!(IinValidator::validate_checksum("031214500014"));
        assert!(IinValidator::validate_checksum("661109450212"));
        assert!(!IinValidator::validate_checksum("031214500015"));
        assert!(!IinValidator::validate_checksum("661109450217"));
    }

    #[test]
    fn test_checksum_secondary_weights() {
        // Primary sum is 10 here, so the rotated weights decide
        assert!(IinValidator::validate_checksum("850101300603"));
        assert!(!IinValidator::validate_checksum("850101300600"));
    }

    #[test]
    fn test_checksum_both_weightings_ten_never_validates() {
        for last in 0..10 {
            let iin = format!("85010130069{}", last);
            assert!(!IinValidator::validate_checksum(&iin), "{}", iin);
        }
    }

    #[test]
    fn test_checksum_rejects_malformed() {
        assert!(!IinValidator::validate_checksum(""));
        assert!(!IinValidator::validate_checksum("03121450001"));
        assert!(!IinValidator::validate_checksum("0312145000A4"));
        assert!(!IinValidator::validate_checksum("0312145000144"));
    }

    #[test]
    fn test_checksum_matches_rule_exhaustively_over_last_digit() {
        // Exactly one final digit validates for this prefix
        let valid: Vec<u32> = (0..10)
            .filter(|d| IinValidator::validate_checksum(&format!("03121450001{}", d)))
            .collect();
        assert_eq!(valid, vec![4]);
    }

    #[test]
    fn test_gender_and_birth_date_2000s() {
        assert_eq!(IinValidator::get_gender_from_iin("031214500015"), Sex::Male);
        assert_eq!(
            IinValidator::extract_date_from_iin("031214500015"),
            NaiveDate::from_ymd_opt(2003, 12, 14)
        );
    }

    #[test]
    fn test_gender_and_birth_date_other_centuries() {
        assert_eq!(IinValidator::get_gender_from_iin("661109450217"), Sex::Female);
        assert_eq!(
            IinValidator::extract_date_from_iin("661109450217"),
            NaiveDate::from_ymd_opt(1966, 11, 9)
        );
        assert_eq!(
            IinValidator::extract_date_from_iin("990101100000"),
            NaiveDate::from_ymd_opt(1899, 1, 1)
        );
        assert_eq!(IinValidator::get_gender_from_iin("990101700000"), Sex::Unknown);
    }

    #[test]
    fn test_impossible_birth_date() {
        assert_eq!(IinValidator::extract_date_from_iin("031314500015"), None);
        assert_eq!(IinValidator::extract_date_from_iin("abc"), None);
    }
}
