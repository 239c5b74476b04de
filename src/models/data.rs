use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder written into the flat mapping for empty fields.
pub const EMPTY_FIELD: &str = "-";

/// Nationality assumed by downstream consumers when none was read.
pub const DEFAULT_NATIONALITY: &str = "KAZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl Sex {
    /// Read a sex marker in either Latin (M/F) or Cyrillic (М/Ж) script.
    pub fn from_marker(marker: char) -> Self {
        match marker.to_uppercase().next().unwrap_or(marker) {
            'M' | 'М' => Sex::Male,
            'F' | 'Ж' => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Sex::Unknown
    }
}

/// The structured identity record produced by one parse call.
///
/// Built once from the arbitrated candidates and handed to the caller whole;
/// the parser keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub last_name: String,
    pub first_name: String,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    /// 12-digit IIN, or empty
    pub national_id: String,
    pub document_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub nationality: Option<String>,
    /// Raw MRZ name candidates, kept for reviewers even when arbitration
    /// picked the free-text value.
    pub mrz_last_name: Option<String>,
    pub mrz_first_name: Option<String>,
}

impl DocumentRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name).trim().to_string()
    }

    pub fn has_valid_national_id(&self) -> bool {
        self.national_id.len() == 12 && self.national_id.chars().all(|c| c.is_ascii_digit())
    }

    /// A record is usable when it names someone and identifies a document.
    pub fn is_valid(&self) -> bool {
        let has_name = !self.last_name.is_empty() || !self.first_name.is_empty();
        has_name && (self.has_valid_national_id() || !self.document_number.is_empty())
    }

    /// Flatten into the string mapping consumed by the spreadsheet writer and
    /// the API layer. Every field appears under a snake_case key and under
    /// the header-style key those consumers already use.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        fn or_dash(value: &str) -> String {
            if value.is_empty() {
                EMPTY_FIELD.to_string()
            } else {
                value.to_string()
            }
        }

        let last_name = or_dash(&self.last_name);
        let first_name = or_dash(&self.first_name);
        let gender = if self.sex.is_known() { self.sex.code() } else { "M" }.to_string();
        let birth_date = self.birth_date.map(format_date).unwrap_or_else(|| EMPTY_FIELD.to_string());
        let expiry_date = self.expiry_date.map(format_date).unwrap_or_else(|| EMPTY_FIELD.to_string());
        let document_number = or_dash(&self.document_number);
        let national_id = or_dash(&self.national_id);
        let phone = or_dash(self.phone.as_deref().unwrap_or(""));
        let nationality = self
            .nationality
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_NATIONALITY.to_string());

        let pairs: [(&str, &str, &String); 7] = [
            ("last_name", "Last Name", &last_name),
            ("first_name", "First Name", &first_name),
            ("gender", "Gender", &gender),
            ("date_of_birth", "Date of Birth", &birth_date),
            ("passport_num", "Document Number", &document_number),
            ("passport_expiry", "Document Expiration", &expiry_date),
            ("iin", "IIN", &national_id),
        ];

        let mut map = BTreeMap::new();
        for (snake, header, value) in pairs {
            map.insert(snake.to_string(), value.clone());
            map.insert(header.to_string(), value.clone());
        }
        map.insert("phone".to_string(), phone);
        map.insert("nationality".to_string(), nationality);
        map.insert("MRZ_LAST".to_string(), self.mrz_last_name.clone().unwrap_or_default());
        map.insert("MRZ_FIRST".to_string(), self.mrz_first_name.clone().unwrap_or_default());
        map
    }
}

/// Dates are handed to downstream consumers as DD.MM.YYYY.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// A name value read from the MRZ, with a flag recording whether the raw
/// token needed Cyrillic transliteration or digit-to-letter repair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameCandidate {
    pub value: String,
    pub had_issues: bool,
}

impl NameCandidate {
    pub fn new(value: impl Into<String>, had_issues: bool) -> Self {
        Self {
            value: value.into(),
            had_issues,
        }
    }
}

/// Fields recovered from the Machine-Readable Zone. Absence is the only
/// failure signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MrzFields {
    pub last_name: Option<NameCandidate>,
    pub first_name: Option<NameCandidate>,
    pub document_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub nationality: Option<String>,
    /// Whether the printed check digit matched; unverified values are still
    /// reported but only fill gaps.
    pub document_number_verified: bool,
    pub expiry_verified: bool,
    pub birth_date_verified: bool,
}

impl MrzFields {
    pub fn is_empty(&self) -> bool {
        *self == MrzFields::default()
    }
}

/// Fields recovered from the free text of the whole page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextFields {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub national_id: Option<String>,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    /// Set when `birth_date` was decoded from a checksum-valid IIN.
    pub birth_date_from_id: bool,
    pub document_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub phone: Option<String>,
}

/// Both candidate sets for one document, collected before any field is
/// decided.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldCandidates {
    pub text: TextFields,
    pub mrz: MrzFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(last: &str, first: &str) -> DocumentRecord {
        DocumentRecord {
            last_name: last.to_string(),
            first_name: first.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_valid_requires_name_and_identifier() {
        assert!(!DocumentRecord::default().is_valid());

        let mut record = named("IVANOV", "");
        assert!(!record.is_valid());

        record.document_number = "N12345678".to_string();
        assert!(record.is_valid());

        let mut record = named("", "IVAN");
        record.national_id = "031214500015".to_string();
        assert!(record.is_valid());

        record.national_id = "03121450001".to_string();
        assert!(!record.is_valid());
    }

    #[test]
    fn test_is_valid_without_name_is_false() {
        let record = DocumentRecord {
            document_number: "N12345678".to_string(),
            national_id: "031214500015".to_string(),
            ..Default::default()
        };
        assert!(!record.is_valid());
    }

    #[test]
    fn test_flat_map_has_both_key_styles() {
        let mut record = named("NASSIPKHAN", "TOLEU");
        record.sex = Sex::Male;
        record.birth_date = NaiveDate::from_ymd_opt(2003, 12, 14);
        record.document_number = "N12345678".to_string();

        let map = record.to_flat_map();
        assert_eq!(map["last_name"], "NASSIPKHAN");
        assert_eq!(map["Last Name"], "NASSIPKHAN");
        assert_eq!(map["date_of_birth"], "14.12.2003");
        assert_eq!(map["Date of Birth"], "14.12.2003");
        assert_eq!(map["passport_num"], "N12345678");
        assert_eq!(map["Document Number"], "N12345678");
        assert_eq!(map["Document Expiration"], "-");
        assert_eq!(map["iin"], "-");
        assert_eq!(map["nationality"], "KAZ");
        assert_eq!(map["MRZ_LAST"], "");
    }

    #[test]
    fn test_flat_map_unknown_sex_defaults_to_m() {
        let map = named("A", "B").to_flat_map();
        assert_eq!(map["gender"], "M");
        assert_eq!(map["Gender"], "M");
    }

    #[test]
    fn test_sex_markers() {
        assert_eq!(Sex::from_marker('M'), Sex::Male);
        assert_eq!(Sex::from_marker('ж'), Sex::Female);
        assert_eq!(Sex::from_marker('М'), Sex::Male);
        assert_eq!(Sex::from_marker('<'), Sex::Unknown);
    }
}
