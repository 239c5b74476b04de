// Character-level repair tables for OCR output.
//
// OCR run with a Cyrillic language pack happily reads Latin MRZ letters as
// their Cyrillic twins, and any engine confuses digits with letters of a
// similar shape. The tables here undo both, per field kind.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// Cyrillic capitals that are drawn exactly like a Latin capital. These
    /// win over phonetic transliteration: in an MRZ band a `Р` is a
    /// misread `P`, not an `R`.
    static ref CYRILLIC_LOOKALIKES: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('А', 'A');
        m.insert('В', 'B');
        m.insert('Е', 'E');
        m.insert('К', 'K');
        m.insert('М', 'M');
        m.insert('Н', 'H');
        m.insert('О', 'O');
        m.insert('Р', 'P');
        m.insert('С', 'C');
        m.insert('Т', 'T');
        m.insert('У', 'Y');
        m.insert('Х', 'X');
        m.insert('І', 'I');
        m
    };

    /// Phonetic transliteration for Russian and Kazakh capitals without a
    /// Latin twin.
    static ref CYRILLIC_TO_LATIN: HashMap<char, &'static str> = {
        let mut m = HashMap::new();
        m.insert('Б', "B");
        m.insert('Г', "G");
        m.insert('Д', "D");
        m.insert('Ё', "E");
        m.insert('Ж', "ZH");
        m.insert('З', "Z");
        m.insert('И', "I");
        m.insert('Й', "Y");
        m.insert('Л', "L");
        m.insert('П', "P");
        m.insert('Ф', "F");
        m.insert('Ц', "TS");
        m.insert('Ч', "CH");
        m.insert('Ш', "SH");
        m.insert('Щ', "SHCH");
        m.insert('Ъ', "");
        m.insert('Ы', "Y");
        m.insert('Ь', "");
        m.insert('Э', "E");
        m.insert('Ю', "YU");
        m.insert('Я', "YA");
        // Kazakh additions
        m.insert('Ә', "A");
        m.insert('Ғ', "G");
        m.insert('Қ', "K");
        m.insert('Ң', "N");
        m.insert('Ө', "O");
        m.insert('Ұ', "U");
        m.insert('Ү', "U");
        m.insert('Һ', "H");
        m
    };

    /// Digits OCR produces in place of letters inside name fields.
    static ref DIGIT_TO_LETTER: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('0', 'O');
        m.insert('1', 'I');
        m.insert('2', 'Z');
        m.insert('4', 'A');
        m.insert('5', 'S');
        m.insert('6', 'G');
        m.insert('8', 'B');
        m
    };

    /// Letters OCR produces in place of digits inside numeric MRZ fields.
    static ref LETTER_TO_DIGIT: HashMap<char, char> = {
        let mut m = HashMap::new();
        m.insert('O', '0');
        m.insert('Q', '0');
        m.insert('D', '0');
        m.insert('I', '1');
        m.insert('L', '1');
        m.insert('Z', '2');
        m.insert('S', '5');
        m.insert('G', '6');
        m.insert('B', '8');
        m
    };
}

pub fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

pub fn contains_cyrillic(text: &str) -> bool {
    text.chars().any(is_cyrillic)
}

pub fn count_cyrillic(text: &str) -> usize {
    text.chars().filter(|c| is_cyrillic(*c)).count()
}

pub fn count_latin(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_alphabetic()).count()
}

pub fn count_vowels(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c.to_ascii_uppercase(), 'A' | 'E' | 'I' | 'O' | 'U' | 'Y'))
        .count()
}

/// Map every Cyrillic letter to Latin, preferring the visual twin over the
/// phonetic spelling. Non-Cyrillic characters pass through uppercased.
pub fn to_latin(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(latin) = CYRILLIC_LOOKALIKES.get(&c) {
            out.push(*latin);
        } else if let Some(latin) = CYRILLIC_TO_LATIN.get(&c) {
            out.push_str(latin);
        } else {
            out.push(c);
        }
    }
    out
}

/// Clean a raw name token from the MRZ: transliterate, repair digits, keep
/// only `A-Z` and single spaces. The flag reports whether the raw token
/// needed transliteration or digit repair.
pub fn clean_name_token(raw: &str) -> (String, bool) {
    let had_issues = contains_cyrillic(raw) || raw.chars().any(|c| c.is_ascii_digit());

    let repaired: String = to_latin(raw)
        .chars()
        .map(|c| DIGIT_TO_LETTER.get(&c).copied().unwrap_or(c))
        .map(|c| if c.is_ascii_uppercase() { c } else { ' ' })
        .collect();

    let cleaned = repaired.split_whitespace().collect::<Vec<_>>().join(" ");
    (cleaned, had_issues)
}

/// Repair letters that stand in for digits in a numeric field
/// (dates, check digits).
pub fn to_digits(text: &str) -> String {
    to_latin(text)
        .chars()
        .map(|c| LETTER_TO_DIGIT.get(&c).copied().unwrap_or(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookalikes_win_over_phonetics() {
        assert_eq!(to_latin("РАSSPORT"), "PASSPORT");
        assert_eq!(to_latin("НЕС"), "HEC");
    }

    #[test]
    fn test_phonetic_transliteration() {
        assert_eq!(to_latin("ЖЫЛ"), "ZHYL");
        assert_eq!(to_latin("құл"), "KUL");
    }

    #[test]
    fn test_clean_name_token_flags_issues() {
        assert_eq!(clean_name_token("TOLEU"), ("TOLEU".to_string(), false));
        assert_eq!(clean_name_token("T0LEU"), ("TOLEU".to_string(), true));
        assert_eq!(clean_name_token("ТОLEU"), ("TOLEU".to_string(), true));
    }

    #[test]
    fn test_clean_name_token_strips_noise() {
        let (cleaned, issues) = clean_name_token(" RAYA<ALTYBAEVNA ");
        assert_eq!(cleaned, "RAYA ALTYBAEVNA");
        assert!(!issues);

        let (cleaned, _) = clean_name_token("KEN-ES!");
        assert_eq!(cleaned, "KEN ES");
    }

    #[test]
    fn test_to_digits() {
        assert_eq!(to_digits("32O9O6"), "320906");
        assert_eq!(to_digits("I2O4IS"), "120415");
    }

    #[test]
    fn test_script_counts() {
        assert_eq!(count_cyrillic("ИВАНОВ IVANOV"), 6);
        assert_eq!(count_latin("ИВАНОВ IVANOV"), 6);
        assert_eq!(count_vowels("IVANOV"), 3);
    }
}
