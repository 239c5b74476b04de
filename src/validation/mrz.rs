// ICAO 9303 check digits.

const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Outcome of comparing a field against the check digit printed after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDigitStatus {
    Valid,
    /// No check digit position was available (line too short) or the
    /// position held a non-digit.
    Missing,
    Mismatch,
}

pub struct MrzValidator;

impl MrzValidator {
    /// Numeric value of one MRZ character: filler `<` is 0, digits are
    /// themselves, letters count from 10 for `A`.
    pub fn char_value(c: char) -> u32 {
        match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            _ => 0,
        }
    }

    /// Weighted modulo-10 with weights cycling 7, 3, 1.
    pub fn compute_check_digit(field: &str) -> u32 {
        field
            .chars()
            .enumerate()
            .map(|(i, c)| Self::char_value(c) * WEIGHTS[i % 3])
            .sum::<u32>()
            % 10
    }

    pub fn verify(field: &str, check: Option<char>) -> CheckDigitStatus {
        match check.and_then(|c| c.to_digit(10)) {
            None => CheckDigitStatus::Missing,
            Some(digit) if digit == Self::compute_check_digit(field) => CheckDigitStatus::Valid,
            Some(_) => CheckDigitStatus::Mismatch,
        }
    }
}
