use crate::utils::PassportError;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tesseract::Tesseract;

/// Characters an MRZ line can legally contain.
pub const MRZ_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// Page layout the engine should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// A single uniform block of text.
    SingleBlock,
    /// As much text as possible, in no particular order.
    SparseText,
}

impl LayoutMode {
    /// Tesseract page segmentation mode number.
    pub fn psm(self) -> &'static str {
        match self {
            LayoutMode::SingleBlock => "6",
            LayoutMode::SparseText => "11",
        }
    }
}

/// Layouts tried on every MRZ image variant.
pub const MRZ_LAYOUTS: [LayoutMode; 2] = [LayoutMode::SingleBlock, LayoutMode::SparseText];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    /// Engine language codes, joined with `+` for tesseract.
    pub languages: String,
    pub layout: LayoutMode,
    pub whitelist: Option<String>,
}

impl OcrRequest {
    pub fn full_page(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            layout: LayoutMode::SingleBlock,
            whitelist: None,
        }
    }

    pub fn mrz(languages: impl Into<String>, layout: LayoutMode) -> Self {
        Self {
            languages: languages.into(),
            layout,
            whitelist: Some(MRZ_WHITELIST.to_string()),
        }
    }
}

/// An external character-recognition engine.
///
/// Implementations take an encoded PNG so that any engine able to read
/// image files can be plugged in. Everything downstream of the returned
/// text is engine independent.
pub trait OcrBackend {
    fn name(&self) -> &str;

    fn recognize(&self, image_png: &[u8], request: &OcrRequest) -> Result<String, PassportError>;
}

/// Tesseract through its C API. A fresh engine is created per call, so
/// one backend value can be shared by worker threads.
#[derive(Debug, Clone, Default)]
pub struct TesseractBackend {
    tessdata_path: Option<PathBuf>,
}

impl TesseractBackend {
    pub fn new(tessdata_path: Option<PathBuf>) -> Self {
        Self { tessdata_path }
    }

    fn datapath(&self) -> Option<String> {
        self.tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var("TESSDATA_PREFIX").ok())
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image_png: &[u8], request: &OcrRequest) -> Result<String, PassportError> {
        let mut temp_file = NamedTempFile::new()
            .map_err(|e| PassportError::OcrError(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(image_png)
            .map_err(|e| PassportError::OcrError(format!("Failed to write temp file: {}", e)))?;

        let image_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| PassportError::OcrError("Temp file path is not UTF-8".to_string()))?;

        let datapath = self.datapath();
        let mut engine = Tesseract::new(datapath.as_deref(), Some(request.languages.as_str()))
            .map_err(|e| PassportError::OcrError(format!("Tesseract init error: {}", e)))?
            .set_image(image_path)
            .map_err(|e| PassportError::OcrError(format!("Tesseract set image error: {}", e)))?
            .set_variable("tessedit_pageseg_mode", request.layout.psm())
            .map_err(|e| PassportError::OcrError(format!("Tesseract set variable error: {}", e)))?;

        if let Some(whitelist) = &request.whitelist {
            engine = engine
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| {
                    PassportError::OcrError(format!("Tesseract set variable error: {}", e))
                })?;
        }

        let text = engine
            .get_text()
            .map_err(|e| PassportError::OcrError(format!("Tesseract error: {}", e)))?;

        log::debug!(
            "tesseract [{} {:?}] returned {} chars",
            request.languages,
            request.layout,
            text.len()
        );
        Ok(text)
    }
}

/// How MRZ-like an OCR output looks: filler characters count double,
/// uppercase letters once.
pub fn mrz_text_score(text: &str) -> usize {
    let fillers = text.chars().filter(|&c| c == '<').count();
    let upper = text.chars().filter(|c| c.is_uppercase()).count();
    2 * fillers + upper
}

/// The highest scoring text. Ties keep the earliest attempt.
pub fn select_best_mrz_text<I>(texts: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut best: Option<(usize, String)> = None;
    for text in texts {
        let score = mrz_text_score(&text);
        match &best {
            Some((best_score, _)) if *best_score >= score => {}
            _ => best = Some((score, text)),
        }
    }
    best.map(|(_, text)| text)
}
