// Heuristic check of whole-page OCR output. Text that fails it is a sign the
// page was rendered from a born-digital PDF OCR could not read well, and the
// parser then tries the PDF text layer instead.

const MIN_LETTER_RATIO: f64 = 0.4;
const MIN_REAL_WORDS: usize = 3;
const MIN_KEYWORDS: usize = 2;

/// Vocabulary every passport data page carries in at least one language.
const PASSPORT_KEYWORDS: &[&str] = &[
    "PASSPORT", "ПАСПОРТ", "SURNAME", "ФАМИЛИЯ", "ТЕГІ", "GIVEN", "ИМЯ", "АТЫ", "BIRTH",
    "РОЖДЕНИЯ", "ТУҒАН", "SEX", "ПОЛ", "ЖЫНЫСЫ", "NATIONALITY", "ҰЛТЫ", "AUTHORITY", "EXPIRY",
    "ISSUE", "REPUBLIC", "KAZAKHSTAN", "ҚАЗАҚСТАН", "MINISTRY",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrQuality {
    /// Letters over non-whitespace characters.
    pub letter_ratio: f64,
    /// Alphabetic words of four letters or more.
    pub real_words: usize,
    pub keywords: usize,
}

impl OcrQuality {
    pub fn assess(text: &str) -> Self {
        let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        let letter_ratio = if non_ws == 0 {
            0.0
        } else {
            letters as f64 / non_ws as f64
        };

        let real_words = text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| w.chars().count() >= 4)
            .count();

        let upper = text.to_uppercase();
        let keywords = PASSPORT_KEYWORDS
            .iter()
            .filter(|k| upper.contains(*k))
            .count();

        Self {
            letter_ratio,
            real_words,
            keywords,
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.letter_ratio >= MIN_LETTER_RATIO
            && self.real_words >= MIN_REAL_WORDS
            && self.keywords >= MIN_KEYWORDS
    }
}
