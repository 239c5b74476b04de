//! Parser configuration.
//!
//! Defaults are tuned for Kazakh, Uzbek and Kyrgyz passports photographed
//! on a phone or scanned at 300 dpi. A JSON file can override any subset of
//! the fields; the CLIs layer their flags on top.

use crate::utils::PassportError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Local contrast enhancement parameters (CLAHE).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheParams {
    pub clip_limit: f32,
    /// Tiles per side; the image is split into `tiles x tiles` regions.
    pub tiles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Tesseract languages for the full-document pass.
    pub text_languages: Vec<String>,
    /// Tesseract languages for the MRZ pass.
    pub mrz_languages: Vec<String>,
    pub pdf_dpi: u32,
    /// Share of the page height, from the bottom, treated as the MRZ band.
    pub mrz_strip_fraction: f32,
    pub standard_clahe: ClaheParams,
    pub aggressive_clahe: ClaheParams,
    pub adaptive_block_radius: u32,
    pub closing_radius: u8,
    pub tessdata_path: Option<PathBuf>,
    pub infer_sex_from_given_name: bool,
    pub workers: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            text_languages: vec!["rus".to_string(), "kaz".to_string(), "eng".to_string()],
            mrz_languages: vec!["eng".to_string()],
            pdf_dpi: 300,
            mrz_strip_fraction: 0.20,
            standard_clahe: ClaheParams {
                clip_limit: 2.0,
                tiles: 8,
            },
            aggressive_clahe: ClaheParams {
                clip_limit: 3.0,
                tiles: 4,
            },
            adaptive_block_radius: 15,
            closing_radius: 1,
            tessdata_path: None,
            infer_sex_from_given_name: false,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl ParserConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PassportError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: ParserConfig = serde_json::from_str(&raw).map_err(|e| {
            PassportError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PassportError> {
        if !(0.05..=0.6).contains(&self.mrz_strip_fraction) {
            return Err(PassportError::ConfigError(format!(
                "mrz_strip_fraction must be within 0.05..=0.6, got {}",
                self.mrz_strip_fraction
            )));
        }
        if self.text_languages.is_empty() || self.mrz_languages.is_empty() {
            return Err(PassportError::ConfigError(
                "at least one OCR language is required for each pass".to_string(),
            ));
        }
        for clahe in [self.standard_clahe, self.aggressive_clahe] {
            if clahe.tiles == 0 || clahe.clip_limit <= 0.0 {
                return Err(PassportError::ConfigError(format!(
                    "invalid CLAHE parameters: {:?}",
                    clahe
                )));
            }
        }
        if self.pdf_dpi < 72 {
            return Err(PassportError::ConfigError(format!(
                "pdf_dpi too low: {}",
                self.pdf_dpi
            )));
        }
        Ok(())
    }

    /// Tesseract expects languages joined with `+`.
    pub fn text_language_spec(&self) -> String {
        self.text_languages.join("+")
    }

    pub fn mrz_language_spec(&self) -> String {
        self.mrz_languages.join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ParserConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.text_language_spec(), "rus+kaz+eng");
        assert_eq!(config.mrz_language_spec(), "eng");
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pdf_dpi": 200, "infer_sex_from_given_name": true}}"#).unwrap();

        let config = ParserConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pdf_dpi, 200);
        assert!(config.infer_sex_from_given_name);
        assert_eq!(config.mrz_strip_fraction, 0.20);
        assert_eq!(config.standard_clahe.tiles, 8);
    }

    #[test]
    fn test_rejects_bad_strip_fraction() {
        let config = ParserConfig {
            mrz_strip_fraction: 0.9,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PassportError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ParserConfig::from_file(file.path()).is_err());
    }
}
