use crate::utils::PassportError;
use image::DynamicImage;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Renders the first page of a PDF to a raster image.
pub trait PdfRasterizer {
    fn render_first_page(&self, path: &Path, dpi: u32) -> Result<DynamicImage, PassportError>;
}

/// Reads the embedded text layer of a born-digital PDF.
pub trait TextLayerExtractor {
    /// `Ok(None)` when the document has no usable text layer.
    fn extract_text(&self, path: &Path) -> Result<Option<String>, PassportError>;
}

/// Rasterizes with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
        }
    }
}

impl PdftoppmRasterizer {
    /// Use a specific `pdftoppm` binary, e.g. from a poppler install that is
    /// not on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn render_first_page(&self, path: &Path, dpi: u32) -> Result<DynamicImage, PassportError> {
        let out_dir = tempfile::tempdir()?;
        let prefix = out_dir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .args(["-f", "1", "-l", "1", "-png", "-singlefile"])
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                PassportError::PdfError(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(PassportError::PdfError(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let rendered = prefix.with_extension("png");
        image::open(&rendered).map_err(|e| {
            PassportError::PdfError(format!("Failed to read rendered page: {}", e))
        })
    }
}

/// Text layer extraction with `lopdf`, first page only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTextExtractor;

impl TextLayerExtractor for LopdfTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<Option<String>, PassportError> {
        let doc = Document::load(path)
            .map_err(|e| PassportError::PdfError(format!("Failed to load PDF: {}", e)))?;

        let first_page = match doc.get_pages().keys().next() {
            Some(page) => *page,
            None => return Ok(None),
        };

        match doc.extract_text(&[first_page]) {
            Ok(text) if !text.trim().is_empty() => Ok(Some(text)),
            Ok(_) => Ok(None),
            Err(e) => {
                log::debug!("No text layer in {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}
